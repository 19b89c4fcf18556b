//! Stream lifecycle: what happens when the host selects an alternate setting.
//!
//! Each direction moves independently between three states:
//!
//! ```text
//!             alt N > 0                       alt 0, disable()
//! Inactive ──────────────> Negotiating ──> Active ──────────────> Negotiating ──> Inactive
//!                                          │    ^
//!                                          └────┘ alt M > 0, M != N
//! ```
//!
//! Becoming active allocates a fresh transfer pool, enables the endpoint and submits the
//! whole pool. Becoming inactive withdraws every transfer, disables the endpoint and, if
//! the audio subsystem has the stream open, stops it with a disconnected status. Both
//! schedule a (debounced) announcement of the stream's new state.

use crate::{
    Interface, UacFunction,
    error::{ConfigError, Error},
    pcm::PcmEvents,
    pump,
    stream::{PacketClock, Stream, StreamState},
    transport::{SlotId, Transfer, Transport},
};
use core::{sync::atomic::Ordering, time::Duration};
use uac2_proto::{
    Direction,
    format::{AltSetting, MAX_ALT_SETTING},
};

impl<T: Transport, P: PcmEvents> UacFunction<T, P> {
    /// Handles a `SET_INTERFACE` request.
    pub fn set_alt(&self, interface: u8, alt: u8) -> Result<(), Error> {
        match self.interface(interface)? {
            Interface::Control if alt == 0 => Ok(()),
            Interface::Control => {
                log::error!("control interface {interface} has no alternate setting {alt}");
                Err(Error::InvalidAltSetting { interface, alt })
            }
            Interface::Streaming(direction) => {
                if alt > MAX_ALT_SETTING {
                    log::error!("{direction}: no alternate setting {alt} on interface {interface}");
                    return Err(Error::InvalidAltSetting { interface, alt });
                }

                self.select_alt(direction, alt)
            }
        }
    }

    /// Handles a `GET_INTERFACE` request.
    pub fn get_alt(&self, interface: u8) -> Result<u8, Error> {
        Ok(match self.interface(interface)? {
            Interface::Control => 0,
            Interface::Streaming(direction) => *self.stream(direction).lifecycle(),
        })
    }

    /// Returns the lifecycle state of a direction.
    pub fn state(&self, direction: Direction) -> StreamState {
        self.stream(direction).state()
    }

    /// Tears both directions down, e.g. because the cable was unplugged or the
    /// configuration changed.
    pub fn disable(&self) {
        for direction in Direction::ALL {
            let stream = self.stream(direction);
            let mut alt = stream.lifecycle();
            self.deactivate(stream);
            *alt = 0;
        }

        self.notifier.cable_disconnected();
    }

    fn select_alt(&self, direction: Direction, alt: u8) -> Result<(), Error> {
        let stream = self.stream(direction);
        let mut current = stream.lifecycle();

        if *current == alt {
            log::debug!("{direction}: alternate setting {alt} already selected");
            return Ok(());
        }

        log::debug!("{direction}: alternate setting {} -> {alt}", *current);

        match AltSetting::lookup(alt) {
            None => {
                self.deactivate(stream);
                *current = 0;
                self.notifier.schedule(direction, Duration::ZERO);
            }
            Some(format) if *current == 0 => {
                self.activate(stream, format)?;
                *current = alt;
                self.notifier.schedule(direction, self.config.event_delay());
            }
            Some(format) => {
                // the pool and the endpoint stay as they are
                stream.set_state(StreamState::Negotiating);
                let params = stream.params().with_alt_setting(format);
                *stream.params.lock() = params;
                stream.rebuild_sizer();
                stream.set_state(StreamState::Active);

                *current = alt;
                self.notifier.schedule(direction, self.config.event_delay());
            }
        }

        Ok(())
    }

    fn activate(&self, stream: &Stream, format: AltSetting) -> Result<(), Error> {
        stream.set_state(StreamState::Negotiating);

        let res = self.try_activate(stream, format);

        if let Err(e) = &res {
            log::error!("{}: failed to start streaming: {e}", stream.direction);
            stream.set_state(StreamState::Inactive);
        }

        res
    }

    fn try_activate(&self, stream: &Stream, format: AltSetting) -> Result<(), Error> {
        let direction = stream.direction;
        let speed = self.transport.speed();
        let descriptor = self.config.endpoint(speed);

        let clock = PacketClock::new(speed, &descriptor)
            .ok_or(ConfigError::Interval(descriptor.interval))?;

        let max_packet_size = usize::from(descriptor.max_packet_size);
        // enabling the direction, further down, moves on to this generation
        let generation = stream.generation.load(Ordering::Acquire).wrapping_add(1);

        let pool = allocate_pool(direction, generation, self.config.transfers, max_packet_size)?;

        let mut idle = Vec::new();
        idle.try_reserve_exact(pool.len())
            .map_err(|_| Error::OutOfMemory)?;

        self.transport.enable(direction, &descriptor)?;

        let params = stream.params().with_alt_setting(format);
        *stream.params.lock() = params;
        stream.rate_match.lock().clock = Some(clock);
        stream.rebuild_sizer();

        stream.max_packet_size.store(max_packet_size, Ordering::Relaxed);
        *stream.idle.lock() = idle;
        stream.counters.in_flight.store(0, Ordering::Release);
        stream.set_enabled(true);

        for transfer in pool {
            pump::prime(stream, &self.transport, transfer);
        }

        stream.set_state(StreamState::Active);

        log::debug!(
            "{direction}: streaming {} channels of {:?} at {} Hz, {} transfers of {max_packet_size} bytes",
            params.channel_mask.count(),
            params.format,
            params.sample_rate.get(),
            self.config.transfers,
        );

        Ok(())
    }

    /// Stops streaming in a direction. Does nothing if it is already inactive.
    pub(crate) fn deactivate(&self, stream: &Stream) {
        if stream.state() == StreamState::Inactive {
            return;
        }

        let direction = stream.direction;
        stream.set_state(StreamState::Negotiating);

        // completions racing with this are dropped from now on
        stream.set_enabled(false);

        for slot in 0..self.config.transfers {
            self.transport.withdraw(direction, SlotId(slot as u8));
        }

        self.transport.disable(direction);

        stream.idle.lock().clear();
        stream.counters.in_flight.store(0, Ordering::Release);

        {
            let mut rate_match = stream.rate_match.lock();
            rate_match.clock = None;
            rate_match.sizer = None;
        }

        if stream.open.load(Ordering::Acquire) {
            stream.running.store(false, Ordering::Release);
            self.pcm.stop_disconnected(direction);
        }

        stream.set_state(StreamState::Inactive);

        log::debug!("{direction}: stopped streaming");
    }
}

/// Allocates `n` transfers of `max_packet_size` bytes, failing instead of aborting if
/// memory runs out.
fn allocate_pool(
    direction: Direction,
    generation: u32,
    n: usize,
    max_packet_size: usize,
) -> Result<Vec<Transfer>, Error> {
    let mut pool = Vec::new();
    pool.try_reserve_exact(n).map_err(|_| Error::OutOfMemory)?;

    for slot in 0..n {
        let mut buf = Vec::new();
        buf.try_reserve_exact(max_packet_size)
            .map_err(|_| Error::OutOfMemory)?;
        buf.resize(max_packet_size, 0);

        pool.push(Transfer::new(
            direction,
            SlotId(slot as u8),
            generation,
            buf.into_boxed_slice(),
        ));
    }

    Ok(pool)
}
