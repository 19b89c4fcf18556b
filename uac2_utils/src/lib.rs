#![no_std]
//! Hot-path primitives for moving audio between an isochronous transport and an audio
//! subsystem.
//!
//! Everything here is allocation-free once constructed and never blocks for longer than a
//! short, bounded critical section, so it can be driven from transfer completion callbacks.
//!
//! - [`queue`]: period counting and `rtrb` helpers.
//! - [`ring`]: the byte ring shared by a transfer pump and an audio subsystem.
//! - [`sizer`]: per-packet byte lengths that track an arbitrary sample rate exactly.

extern crate alloc;

pub mod queue;
pub mod ring;
pub mod sizer;

pub use queue::PeriodicCounter;
pub use ring::{Advance, Geometry, GeometryError, RingChannel};
pub use sizer::PacketSizer;
