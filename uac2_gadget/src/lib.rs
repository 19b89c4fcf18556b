//! A USB Audio Class 2.0 gadget function.
//!
//! This crate implements the data path and the protocol negotiation of a two-way audio
//! function, independently of the USB device controller and of the audio subsystem it
//! sits between:
//!
//! - the [transfer pump](pump) keeps a pool of isochronous transfers in flight in each
//!   direction and moves their payloads in and out of [ring buffers](uac2_utils::ring),
//!   sizing outgoing packets so that they track the audio clock exactly,
//! - the [stream lifecycle](lifecycle) starts and stops each direction when the host
//!   selects an alternate setting,
//! - the [clock control handler](control) answers the host's sampling frequency requests,
//! - the [notifier](notify) announces, debounced, when the host opens or closes a stream.
//!
//! The collaborators are abstracted by three traits: [`Transport`] (the endpoints),
//! [`PcmEvents`] (the audio subsystem) and [`EventSink`] (userspace announcements).
//!
//! ## Interfaces
//!
//! A function owns three consecutive interfaces, starting from the one it is created
//! with: the audio control interface, the capture (OUT) streaming interface and the
//! playback (IN) streaming interface.

pub mod config;
pub mod control;
pub mod error;
pub mod lifecycle;
pub mod notify;
pub mod pcm;
pub mod pump;
pub mod stream;
pub mod transport;

pub use config::GadgetConfig;
pub use control::{PendingSet, SetupOutcome};
pub use error::{ConfigError, ControlError, Error, TransportError};
pub use notify::{EventSink, PostcardEventSink};
pub use pcm::{HardwareConstraints, PcmEvents, Trigger};
pub use stream::{StreamState, StreamStats};
pub use transport::{
    EndpointDescriptor, Rejected, SlotId, Speed, Transfer, TransferStatus, Transport,
};
pub use uac2_proto;

use std::sync::Arc;
use stream::Stream;
use uac2_proto::Direction;

/// The role of one of the function's interfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Interface {
    Control,
    Streaming(Direction),
}

/// One instance of the audio function.
///
/// All methods take `&self`: a function is meant to be shared (e.g. in an [`Arc`])
/// between the transport's completion context, the control request handler and the audio
/// subsystem.
pub struct UacFunction<T, P> {
    config: GadgetConfig,
    first_interface: u8,
    transport: T,
    pcm: P,
    streams: Arc<[Stream; 2]>,
    notifier: notify::Notifier,
}

impl<T: Transport, P: PcmEvents> UacFunction<T, P> {
    /// Creates a function owning interfaces `first_interface..first_interface + 3`.
    ///
    /// Both directions start inactive. Announcements are sent to `sink`, from a worker
    /// thread spawned here.
    pub fn new(
        config: GadgetConfig,
        first_interface: u8,
        transport: T,
        pcm: P,
        sink: impl EventSink,
    ) -> Result<Self, Error> {
        config.validate()?;

        if first_interface.checked_add(2).is_none() {
            return Err(Error::InvalidInterface(first_interface));
        }

        let [playback, capture] =
            Direction::ALL.map(|direction| config.direction(direction).stream_params(direction));

        let streams = Arc::new([
            Stream::new(Direction::Playback, playback?),
            Stream::new(Direction::Capture, capture?),
        ]);

        let notifier = {
            let streams = Arc::clone(&streams);
            notify::Notifier::spawn(sink, config.event_spacing(), move |direction| {
                streams[direction.index()].is_active()
            })?
        };

        log::debug!(
            "audio function on interfaces {first_interface}..={}",
            first_interface + 2
        );

        Ok(Self {
            config,
            first_interface,
            transport,
            pcm,
            streams,
            notifier,
        })
    }

    #[inline(always)]
    pub fn config(&self) -> &GadgetConfig {
        &self.config
    }

    #[inline(always)]
    pub fn transport(&self) -> &T {
        &self.transport
    }

    #[inline(always)]
    pub fn pcm(&self) -> &P {
        &self.pcm
    }

    /// The audio control interface number.
    #[inline(always)]
    pub fn control_interface(&self) -> u8 {
        self.first_interface
    }

    /// The streaming interface number of a direction.
    #[inline(always)]
    pub fn streaming_interface(&self, direction: Direction) -> u8 {
        match direction {
            Direction::Capture => self.first_interface + 1,
            Direction::Playback => self.first_interface + 2,
        }
    }

    /// Returns a snapshot of a direction's counters.
    pub fn stats(&self, direction: Direction) -> StreamStats {
        self.stream(direction).stats()
    }

    #[inline(always)]
    pub(crate) fn stream(&self, direction: Direction) -> &Stream {
        &self.streams[direction.index()]
    }

    pub(crate) fn interface(&self, interface: u8) -> Result<Interface, Error> {
        match interface.checked_sub(self.first_interface) {
            Some(0) => Ok(Interface::Control),
            Some(1) => Ok(Interface::Streaming(Direction::Capture)),
            Some(2) => Ok(Interface::Streaming(Direction::Playback)),
            _ => Err(Error::InvalidInterface(interface)),
        }
    }
}
