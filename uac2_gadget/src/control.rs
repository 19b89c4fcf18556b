//! Clock control requests on the audio control interface.
//!
//! `GET` requests are answered directly from the setup stage. `SET CUR` on the sampling
//! frequency is a two-step operation: the setup stage only grants a data stage, and the
//! new rate is validated and applied once the data stage completes, through
//! [`UacFunction::complete_control`].

use crate::{UacFunction, error::ControlError, pcm::PcmEvents, transport::Transport};
use arrayvec::ArrayVec;
use uac2_proto::{
    Direction,
    control::{ClockRequest, Layout3Cur, Layout3Range},
    format::SampleRate,
    request::SetupPacket,
};

/// Largest response the function sends on the control endpoint.
pub const MAX_RESPONSE_SIZE: usize = 16;

/// How the setup stage of an accepted request should proceed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetupOutcome {
    /// Send `data` to the host.
    DataIn {
        data: ArrayVec<u8, MAX_RESPONSE_SIZE>,
        /// The response is shorter than `wLength`, so it must be terminated with a zero
        /// length packet if it ends on a packet boundary.
        zero: bool,
    },
    /// Receive `length` bytes from the host, then hand them to
    /// [`UacFunction::complete_control`] along with `pending`.
    DataOut { length: u16, pending: PendingSet },
}

/// A `SET CUR` request waiting for its data stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PendingSet {
    direction: Direction,
}

impl PendingSet {
    #[inline(always)]
    pub fn direction(&self) -> Direction {
        self.direction
    }
}

impl<T: Transport, P: PcmEvents> UacFunction<T, P> {
    /// Handles the setup stage of a control request addressed to this function.
    ///
    /// Any error must be answered with a stall.
    pub fn setup(&self, setup: &SetupPacket) -> Result<SetupOutcome, ControlError> {
        let request = ClockRequest::classify(setup, self.control_interface()).map_err(|e| {
            log::error!("refusing control request {setup:?}: {e}");
            ControlError::Unsupported(e)
        })?;

        let rate = self.stream(request.direction()).params().sample_rate.get();

        let mut data = ArrayVec::new();

        match request {
            ClockRequest::GetRate(_) => data.extend(Layout3Cur(rate).to_bytes()),
            ClockRequest::GetRateRange(_) => {
                data.extend(Layout3Range::discrete(rate).to_single_block())
            }
            ClockRequest::GetClockValid(_) => data.push(1),
            ClockRequest::SetRate(direction) => {
                return Ok(SetupOutcome::DataOut {
                    length: setup.w_length,
                    pending: PendingSet { direction },
                });
            }
        }

        let w_length = usize::from(setup.w_length);
        let zero = data.len() < w_length;
        data.truncate(w_length);

        Ok(SetupOutcome::DataIn { data, zero })
    }

    /// Handles the data stage of a `SET CUR` sampling frequency request.
    ///
    /// The rate only changes if it is one of the supported ones.
    pub fn complete_control(
        &self,
        pending: PendingSet,
        data: &[u8],
    ) -> Result<SampleRate, ControlError> {
        let direction = pending.direction;

        let Some(Layout3Cur(hz)) = Layout3Cur::from_bytes(data) else {
            log::error!("{direction}: sampling frequency data stage too short ({} bytes)", data.len());
            return Err(ControlError::ShortDataStage(data.len()));
        };

        let Some(rate) = SampleRate::new(hz) else {
            log::error!("{direction}: refusing unsupported sampling frequency {hz} Hz");
            return Err(ControlError::UnsupportedRate(hz));
        };

        let stream = self.stream(direction);
        stream.params.lock().sample_rate = rate;
        stream.rebuild_sizer();

        log::debug!("{direction}: sampling frequency set to {hz} Hz");

        Ok(rate)
    }

    /// Returns the current sample rate of a direction.
    pub fn sample_rate(&self, direction: Direction) -> SampleRate {
        self.stream(direction).params().sample_rate
    }

    /// Returns the name of a direction's clock source, e.g. `"48000Hz"`.
    pub fn clock_label(&self, direction: Direction) -> String {
        format!("{}Hz", self.sample_rate(direction).get())
    }
}
