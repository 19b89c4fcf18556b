//! The isochronous transport the function streams over.
//!
//! The function never talks to hardware. A [`Transport`] implementation (a UDC driver
//! binding, a FunctionFS endpoint pair, an emulator...) owns the endpoints, and hands every
//! finished [`Transfer`] back to the function through
//! [`UacFunction::complete`](crate::UacFunction::complete).

use crate::error::TransportError;
use core::num;
use serde::{Deserialize, Serialize};
use uac2_proto::Direction;

/// Bus speed the device was enumerated at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Speed {
    Full,
    High,
    Super,
}

impl Speed {
    /// Number of (micro)frames per second: the rate of the clock isochronous polling
    /// intervals are expressed in.
    #[inline(always)]
    pub const fn frames_per_second(self) -> num::NonZeroU32 {
        let fps = match self {
            Self::Full => 1000,
            Self::High | Self::Super => 8000,
        };

        num::NonZeroU32::new(fps).unwrap()
    }
}

/// The negotiable part of an isochronous endpoint descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EndpointDescriptor {
    /// `wMaxPacketSize`, in bytes.
    pub max_packet_size: u16,
    /// `bInterval`: the endpoint is polled every `2^(bInterval - 1)` (micro)frames.
    pub interval: u8,
}

impl EndpointDescriptor {
    /// Default full speed descriptor: polled every frame.
    pub const FULL_SPEED: Self = Self {
        max_packet_size: 1023,
        interval: 1,
    };

    /// Default high speed descriptor: polled every 8 microframes.
    pub const HIGH_SPEED: Self = Self {
        max_packet_size: 1024,
        interval: 4,
    };

    /// Returns the number of (micro)frames between two packets, or `None` if `bInterval`
    /// is out of the `1..=16` range.
    #[inline(always)]
    pub const fn frames_per_packet(&self) -> Option<num::NonZeroU32> {
        match self.interval {
            1..=16 => num::NonZeroU32::new(1 << (self.interval - 1)),
            _ => None,
        }
    }
}

/// Identifies one of a direction's in-flight transfers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SlotId(pub u8);

/// Final status of a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransferStatus {
    /// The transfer went through.
    Complete,
    /// The payload was lost or corrupted. Isochronous transfers are never retried, so
    /// this only affects one packet.
    Error,
    /// The endpoint was disabled, or the transfer withdrawn, before it went through.
    Shutdown,
}

/// A transfer buffer, together with what the transport needs to move it.
///
/// Whoever holds a `Transfer` owns it: it is either submitted to the transport or
/// waiting to be refilled, never both.
#[derive(Debug)]
pub struct Transfer {
    direction: Direction,
    slot: SlotId,
    generation: u32,
    buf: Box<[u8]>,
    /// Number of bytes to send (IN), or the most that may be received (OUT).
    pub length: usize,
    /// Number of bytes actually transferred, set by the transport on completion.
    pub actual: usize,
    /// Set by the transport on completion.
    pub status: TransferStatus,
}

impl Transfer {
    #[inline(always)]
    pub(crate) fn new(direction: Direction, slot: SlotId, generation: u32, buf: Box<[u8]>) -> Self {
        Self {
            direction,
            slot,
            generation,
            length: buf.len(),
            buf,
            actual: 0,
            status: TransferStatus::Complete,
        }
    }

    #[inline(always)]
    pub fn direction(&self) -> Direction {
        self.direction
    }

    #[inline(always)]
    pub fn slot(&self) -> SlotId {
        self.slot
    }

    #[inline(always)]
    pub(crate) fn generation(&self) -> u32 {
        self.generation
    }

    /// Size of the underlying buffer.
    #[inline(always)]
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// The bytes to send, for IN transfers.
    #[inline(always)]
    pub fn payload(&self) -> &[u8] {
        &self.buf[..self.length.min(self.buf.len())]
    }

    /// The bytes received, for OUT transfers.
    #[inline(always)]
    pub fn received(&self) -> &[u8] {
        &self.buf[..self.actual.min(self.length).min(self.buf.len())]
    }

    /// The whole underlying buffer, for the transport to receive into.
    #[inline(always)]
    pub fn buf_mut(&mut self) -> &mut [u8] {
        &mut self.buf
    }
}

/// A submission the transport refused, handed back to its owner.
#[derive(Debug)]
pub struct Rejected {
    pub transfer: Transfer,
    pub error: TransportError,
}

/// The transport side of the function.
///
/// All methods may be called from any thread, including from within
/// [`UacFunction::complete`](crate::UacFunction::complete). `submit` must not complete the
/// transfer synchronously: completions are delivered later, through `complete`.
pub trait Transport: Send + Sync {
    /// Speed the device is connected at.
    fn speed(&self) -> Speed;

    /// Configures and enables the isochronous endpoint of `direction`.
    fn enable(
        &self,
        direction: Direction,
        descriptor: &EndpointDescriptor,
    ) -> Result<(), TransportError>;

    /// Disables the isochronous endpoint of `direction`.
    fn disable(&self, direction: Direction);

    /// Queues `transfer` on its direction's endpoint.
    fn submit(&self, transfer: Transfer) -> Result<(), Rejected>;

    /// Asks for a submitted transfer to be cancelled. Best effort: the transfer is still
    /// handed back through a completion, usually with [`TransferStatus::Shutdown`].
    fn withdraw(&self, direction: Direction, slot: SlotId);
}
