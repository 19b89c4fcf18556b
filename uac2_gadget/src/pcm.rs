//! The audio subsystem side of the function.
//!
//! Each direction is exposed to the audio subsystem as one PCM stream. The audio subsystem
//! negotiates a buffer (the ring's area) and a period size, then triggers the stream. From
//! then on, the [pump](crate::pump) moves the ring's cursor and notifies the audio
//! subsystem every time a period has been transferred.

use crate::{UacFunction, error::Error, transport::Transport};
use core::sync::atomic::Ordering;
use uac2_proto::{Direction, format::SampleFormat};
use uac2_utils::Geometry;

/// Largest ring area, in bytes.
pub const BUFFER_BYTES_MAX: usize = 64 * 1024;
/// Largest period, in bytes.
pub const PERIOD_BYTES_MAX: usize = 4096;
/// Fewest periods in a ring.
pub const PERIODS_MIN: usize = 4;

/// Notifications from the function to the audio subsystem.
///
/// Called from completion context: implementations must not block.
pub trait PcmEvents: Send + Sync {
    /// A period's worth of bytes has been transferred.
    fn period_elapsed(&self, direction: Direction);

    /// The stream was torn down under the audio subsystem's feet (the host stopped
    /// streaming, or the cable was unplugged). Blocked readers and writers should return.
    ///
    /// Called with the direction's lifecycle lock held: must not wait on
    /// [`UacFunction::pcm_open`].
    fn stop_disconnected(&self, direction: Direction);
}

/// Trigger commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Trigger {
    Start,
    Resume,
    Stop,
    Suspend,
}

/// What the audio subsystem may configure a stream with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HardwareConstraints {
    /// The only supported rate, in Hz.
    pub rate: u32,
    /// The only supported channel count.
    pub channels: u32,
    pub format: SampleFormat,
    pub buffer_bytes_max: usize,
    pub period_bytes_min: usize,
    pub period_bytes_max: usize,
    pub periods_min: usize,
    pub periods_max: usize,
}

impl HardwareConstraints {
    /// Checks a buffer geometry against these constraints.
    ///
    /// The buffer must hold a whole number of periods.
    pub fn check(&self, buffer_bytes: usize, period_bytes: usize) -> Result<Geometry, Error> {
        let geometry = Geometry::new(buffer_bytes, period_bytes)?;

        let in_bounds = buffer_bytes <= self.buffer_bytes_max
            && (self.period_bytes_min..=self.period_bytes_max).contains(&period_bytes)
            && (self.periods_min..=self.periods_max).contains(&geometry.periods());

        if !in_bounds {
            return Err(Error::BufferBounds {
                buffer_bytes,
                period_bytes,
            });
        }

        Ok(geometry)
    }
}

impl<T: Transport, P: PcmEvents> UacFunction<T, P> {
    /// Returns the constraints a stream must be configured with.
    pub fn pcm_hardware(&self, direction: Direction) -> HardwareConstraints {
        let params = self.stream(direction).params();
        let max_packet_size = self.config.endpoint(self.transport.speed()).max_packet_size;

        let period_bytes_min = 2 * usize::from(max_packet_size) / PERIODS_MIN;

        HardwareConstraints {
            rate: params.sample_rate.get(),
            channels: params.channel_mask.count(),
            format: params.format,
            buffer_bytes_max: BUFFER_BYTES_MAX,
            period_bytes_min,
            period_bytes_max: PERIOD_BYTES_MAX,
            periods_min: PERIODS_MIN,
            periods_max: BUFFER_BYTES_MAX / period_bytes_min.max(1),
        }
    }

    /// Opens a direction's stream.
    ///
    /// Fails with [`Error::NotReady`] unless the host is streaming in this direction.
    /// Waits for an alternate setting change in progress to finish: once this returns,
    /// tearing the direction down stops the stream.
    pub fn pcm_open(&self, direction: Direction) -> Result<HardwareConstraints, Error> {
        let stream = self.stream(direction);
        let _lifecycle = stream.lifecycle();

        if !stream.is_active() {
            log::debug!("{direction}: can't open, the host isn't streaming");
            return Err(Error::NotReady(direction));
        }

        stream.running.store(false, Ordering::Release);
        stream.open.store(true, Ordering::Release);
        stream.reset_residue();

        Ok(self.pcm_hardware(direction))
    }

    pub fn pcm_close(&self, direction: Direction) {
        let stream = self.stream(direction);
        stream.running.store(false, Ordering::Release);
        stream.open.store(false, Ordering::Release);
    }

    /// Allocates the ring's area.
    pub fn pcm_hw_params(
        &self,
        direction: Direction,
        buffer_bytes: usize,
        period_bytes: usize,
    ) -> Result<(), Error> {
        self.pcm_hardware(direction)
            .check(buffer_bytes, period_bytes)?;

        let mut area = Vec::new();
        area.try_reserve_exact(buffer_bytes)
            .map_err(|_| Error::OutOfMemory)?;
        area.resize(buffer_bytes, 0);

        self.stream(direction)
            .ring
            .configure(area.into_boxed_slice(), period_bytes)?;

        log::debug!("{direction}: {buffer_bytes} byte buffer, {period_bytes} byte periods");

        Ok(())
    }

    /// Frees the ring's area.
    pub fn pcm_hw_free(&self, direction: Direction) {
        self.stream(direction).ring.release();
    }

    pub fn pcm_trigger(&self, direction: Direction, trigger: Trigger) {
        let stream = self.stream(direction);

        stream.ring.reset();

        let running = matches!(trigger, Trigger::Start | Trigger::Resume);
        stream.running.store(running, Ordering::Release);
    }

    /// Returns the ring cursor's position, in frames.
    pub fn pcm_pointer(&self, direction: Direction) -> usize {
        let stream = self.stream(direction);
        let frame_size = stream.params().frame_size() as usize;

        stream.ring.position() / frame_size.max(1)
    }

    /// Writes into a direction's ring area, at `offset` bytes, wrapping around its end.
    ///
    /// Returns `false` if no area is allocated.
    pub fn pcm_write(&self, direction: Direction, offset: usize, bytes: &[u8]) -> bool {
        self.stream(direction).ring.write_at(offset, bytes)
    }

    /// Reads from a direction's ring area, at `offset` bytes, wrapping around its end.
    ///
    /// Returns `false` if no area is allocated.
    pub fn pcm_read(&self, direction: Direction, offset: usize, bytes: &mut [u8]) -> bool {
        self.stream(direction).ring.read_at(offset, bytes)
    }
}
