//! Error types.

use uac2_proto::{Direction, control::RequestError};
use uac2_utils::GeometryError;

/// Errors returned by the function's non-real-time operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The host hasn't selected a streaming alternate setting in this direction.
    #[error("{0} stream is not active on the host")]
    NotReady(Direction),
    #[error("interface {0} doesn't belong to this function")]
    InvalidInterface(u8),
    #[error("alternate setting {alt} doesn't exist on interface {interface}")]
    InvalidAltSetting { interface: u8, alt: u8 },
    #[error("out of memory")]
    OutOfMemory,
    #[error("invalid buffer geometry: {0}")]
    InvalidGeometry(#[from] GeometryError),
    #[error("buffer of {buffer_bytes} bytes in periods of {period_bytes} bytes is out of bounds")]
    BufferBounds {
        buffer_bytes: usize,
        period_bytes: usize,
    },
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors reported by a transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The endpoint is disabled, or being disabled.
    #[error("endpoint is shut down")]
    Shutdown,
    /// The transport can't take more transfers right now.
    #[error("endpoint queue is full")]
    Busy,
    /// The endpoint can't be configured with the requested descriptor.
    #[error("endpoint configuration refused")]
    Refused,
    /// Any other, transport-specific failure.
    #[error("transport failure (code {0})")]
    Other(i32),
}

/// Outcomes of control requests the function doesn't honor.
///
/// At the setup stage, any of these must be answered with a stall.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ControlError {
    #[error("unsupported request: {0}")]
    Unsupported(RequestError),
    #[error("unsupported sample rate {0} Hz")]
    UnsupportedRate(u32),
    #[error("data stage too short ({0} bytes)")]
    ShortDataStage(usize),
}

/// Errors found while loading or validating a [`GadgetConfig`](crate::GadgetConfig).
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("{direction}: unsupported sample rate {rate} Hz")]
    UnsupportedRate { direction: Direction, rate: u32 },
    #[error("{0}: channel mask is empty")]
    EmptyChannelMask(Direction),
    #[error("{direction}: no sample format has {subslot_size}-byte subslots of {bit_resolution} bits")]
    UnknownFormat {
        direction: Direction,
        subslot_size: u8,
        bit_resolution: u8,
    },
    #[error("bInterval {0} is out of range")]
    Interval(u8),
    #[error("max packet size {max_packet_size} can't hold a frame of {frame_size} bytes")]
    MaxPacketSize { max_packet_size: u16, frame_size: u32 },
    #[error("{0} transfers per direction is out of range 1..=32")]
    Transfers(usize),
}
