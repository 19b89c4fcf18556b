#![no_std]
//! Protocol vocabulary for a USB Audio Class 2.0 gadget function.
//!
//! This crate defines everything that crosses a boundary of the function, independently
//! of how the function is driven:
//!
//! - stream [formats](format), the enumerated set of supported sample rates and the table
//!   of alternate settings the streaming interfaces expose,
//! - USB [setup packets](request) and the class-specific [clock control](control) requests
//!   a host uses to query and set each direction's sample rate,
//! - the [events](event) announced to userspace when the host opens or closes a stream.
//!
//! ## Directions
//!
//! A function streams in both directions at once:
//!
//! - **Playback** flows from the local audio subsystem to the host, over the isochronous
//!   IN endpoint.
//! - **Capture** flows from the host to the local audio subsystem, over the isochronous
//!   OUT endpoint.
//!
//! Only the playback direction needs rate matching: the device decides how many bytes it
//! puts in every IN packet, whereas on the OUT side the host decides.
//!
//! ## Wire format
//!
//! All multi-byte integers on the control channel are little-endian and fixed-width.
//! The types in this crate implement `serde`'s `Serialize` and `Deserialize` traits, so
//! they can be plugged into configuration files or other `serde` backends.

extern crate alloc;

pub mod control;
pub mod event;
pub mod format;
pub mod request;

pub use postcard;

use serde::{Deserialize, Serialize};

/// One of the two streaming directions of the function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// Audio subsystem to host, over the isochronous IN endpoint.
    Playback,
    /// Host to audio subsystem, over the isochronous OUT endpoint.
    Capture,
}

impl Direction {
    /// Both directions, playback first.
    pub const ALL: [Direction; 2] = [Direction::Playback, Direction::Capture];

    /// Returns a dense index (`0` for playback, `1` for capture), suitable for
    /// indexing per-direction arrays.
    #[inline(always)]
    pub const fn index(self) -> usize {
        match self {
            Self::Playback => 0,
            Self::Capture => 1,
        }
    }

    /// Returns whether data in this direction travels device-to-host.
    #[inline(always)]
    pub const fn is_device_to_host(self) -> bool {
        matches!(self, Self::Playback)
    }

    /// Returns a short lowercase name, used in log messages.
    #[inline(always)]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Playback => "playback",
            Self::Capture => "capture",
        }
    }
}

impl core::fmt::Display for Direction {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}
