//! Per-direction state, shared between the lifecycle, the pump, the control handler and
//! the audio subsystem.

use crate::transport::{EndpointDescriptor, Speed, Transfer};
use core::{
    num,
    sync::atomic::{AtomicBool, AtomicU8, AtomicU32, AtomicU64, AtomicUsize, Ordering},
};
use std::sync::{Mutex, MutexGuard, PoisonError};
use uac2_proto::{Direction, format::StreamParams};
use uac2_utils::{PacketSizer, RingChannel};

/// Lifecycle state of a direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum StreamState {
    /// Alternate setting 0: the host isn't streaming.
    Inactive = 0,
    /// An alternate setting change is in progress.
    Negotiating = 1,
    /// A streaming alternate setting is selected, the endpoint is enabled and the
    /// transfer pool is in flight.
    Active = 2,
}

impl StreamState {
    #[inline(always)]
    const fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Inactive,
            1 => Self::Negotiating,
            _ => Self::Active,
        }
    }
}

/// A snapshot of a direction's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct StreamStats {
    /// Completions handled while the direction was enabled.
    pub completions: u64,
    /// Completions whose payload was lost or corrupted.
    pub transient_errors: u64,
    /// Transfers the transport refused to take back.
    pub resubmit_failures: u64,
    /// Completions dropped because the direction was disabled, or because they belonged
    /// to a previous activation.
    pub dropped: u64,
    /// "Period elapsed" notifications sent to the audio subsystem.
    pub periods_elapsed: u64,
    /// Transfers currently submitted to the transport.
    pub in_flight: usize,
    /// Transfers left unsubmitted after a failed resubmission.
    pub idle: usize,
}

#[derive(Debug, Default)]
pub(crate) struct StreamCounters {
    pub completions: AtomicU64,
    pub transient_errors: AtomicU64,
    pub resubmit_failures: AtomicU64,
    pub dropped: AtomicU64,
    pub periods_elapsed: AtomicU64,
    pub in_flight: AtomicUsize,
}

impl StreamCounters {
    #[inline(always)]
    pub fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// What the packet sizer is derived from, besides the stream parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PacketClock {
    /// Transport clock ticks per second.
    pub tick_rate: num::NonZeroU32,
    pub ticks_per_packet: num::NonZeroU32,
    pub max_packet_size: u16,
}

impl PacketClock {
    #[inline(always)]
    pub fn new(speed: Speed, descriptor: &EndpointDescriptor) -> Option<Self> {
        Some(Self {
            tick_rate: speed.frames_per_second(),
            ticks_per_packet: descriptor.frames_per_packet()?,
            max_packet_size: descriptor.max_packet_size,
        })
    }

    #[inline(always)]
    pub fn sizer(&self, params: &StreamParams) -> Option<PacketSizer> {
        Some(PacketSizer::new(
            params.sample_rate.get(),
            num::NonZeroU32::new(params.frame_size())?,
            self.tick_rate,
            self.ticks_per_packet,
            u32::from(self.max_packet_size),
        ))
    }
}

#[derive(Debug, Default)]
pub(crate) struct RateMatch {
    pub clock: Option<PacketClock>,
    pub sizer: Option<PacketSizer>,
}

pub(crate) struct Stream {
    pub direction: Direction,
    state: AtomicU8,
    /// Bumped every time the direction is enabled or disabled, completions of older
    /// transfers are dropped.
    pub generation: AtomicU32,
    pub enabled: AtomicBool,
    /// Read-locked by completions from their generation check until their resubmission,
    /// write-locked while `enabled` and `generation` change.
    pub gate: spin::RwLock<()>,
    /// The audio subsystem has the stream open.
    pub open: AtomicBool,
    /// The audio subsystem has triggered the stream.
    pub running: AtomicBool,
    pub max_packet_size: AtomicUsize,
    /// Serializes lifecycle transitions and opening the stream. Holds the current
    /// alternate setting.
    alt: Mutex<u8>,
    pub params: spin::Mutex<StreamParams>,
    pub rate_match: spin::Mutex<RateMatch>,
    pub ring: RingChannel,
    /// Transfers owned by the function but not submitted. Never grows past the pool size.
    pub idle: spin::Mutex<Vec<Transfer>>,
    pub counters: StreamCounters,
}

impl Stream {
    pub fn new(direction: Direction, params: StreamParams) -> Self {
        Self {
            direction,
            state: AtomicU8::new(StreamState::Inactive as u8),
            generation: AtomicU32::new(0),
            enabled: AtomicBool::new(false),
            gate: spin::RwLock::new(()),
            open: AtomicBool::new(false),
            running: AtomicBool::new(false),
            max_packet_size: AtomicUsize::new(0),
            alt: Mutex::new(0),
            params: spin::Mutex::new(params),
            rate_match: spin::Mutex::new(RateMatch::default()),
            ring: RingChannel::new(),
            idle: spin::Mutex::new(Vec::new()),
            counters: StreamCounters::default(),
        }
    }

    /// Takes the lifecycle lock. A panic while holding it leaves the state consistent
    /// enough to go on.
    #[inline]
    pub fn lifecycle(&self) -> MutexGuard<'_, u8> {
        self.alt.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Switches completions on or off, moving on to a new generation.
    ///
    /// Waits for completions that passed their generation check to resubmit.
    pub fn set_enabled(&self, enabled: bool) {
        let _gate = self.gate.write();
        self.enabled.store(enabled, Ordering::Release);
        self.generation.fetch_add(1, Ordering::AcqRel);
    }

    #[inline(always)]
    pub fn state(&self) -> StreamState {
        StreamState::from_u8(self.state.load(Ordering::Acquire))
    }

    #[inline(always)]
    pub fn set_state(&self, state: StreamState) {
        self.state.store(state as u8, Ordering::Release);
    }

    #[inline(always)]
    pub fn is_active(&self) -> bool {
        self.state() == StreamState::Active
    }

    #[inline(always)]
    pub fn params(&self) -> StreamParams {
        *self.params.lock()
    }

    /// Rebuilds the packet sizer from the current parameters, dropping its residue.
    ///
    /// Does nothing for capture, or while no endpoint is configured.
    pub fn rebuild_sizer(&self) {
        if self.direction != Direction::Playback {
            return;
        }

        let params = self.params();
        let mut rate_match = self.rate_match.lock();

        rate_match.sizer = rate_match.clock.and_then(|clock| clock.sizer(&params));

        if let Some(sizer) = &rate_match.sizer {
            log::debug!(
                "{}: {} Hz, {} bytes/frame: {} bytes/packet, residue {}/{} per packet",
                self.direction,
                params.sample_rate.get(),
                params.frame_size(),
                sizer.base_pktsize(),
                sizer.pktsize_residue(),
                u64::from(sizer.tick_rate().get()) * u64::from(sizer.frame_size().get()),
            );
        }
    }

    /// Drops the packet sizer's residue.
    #[inline]
    pub fn reset_residue(&self) {
        if let Some(sizer) = self.rate_match.lock().sizer.as_mut() {
            sizer.reset();
        }
    }

    pub fn stats(&self) -> StreamStats {
        let c = &self.counters;
        StreamStats {
            completions: c.completions.load(Ordering::Relaxed),
            transient_errors: c.transient_errors.load(Ordering::Relaxed),
            resubmit_failures: c.resubmit_failures.load(Ordering::Relaxed),
            dropped: c.dropped.load(Ordering::Relaxed),
            periods_elapsed: c.periods_elapsed.load(Ordering::Relaxed),
            in_flight: c.in_flight.load(Ordering::Relaxed),
            idle: self.idle.lock().len(),
        }
    }
}
