//! Class-specific clock control requests.
//!
//! Each direction has its own clock source entity. A host reads the current sampling
//! frequency, the range of valid frequencies and the clock validity flag with `GET`
//! requests, and changes the sampling frequency with a `SET CUR` request whose data
//! stage carries the new rate.
//!
//! Parameter blocks use layout 3 (32-bit values): `CUR` is a single `u32`, `RANGE` is a
//! `u16` sub-range count followed by `(MIN, MAX, RES)` triplets of `u32`.

use crate::{
    Direction,
    request::{Recipient, RequestType, SetupPacket},
};
use core::fmt;

/// `CUR` request code.
pub const CUR: u8 = 0x01;
/// `RANGE` request code.
pub const RANGE: u8 = 0x02;

/// Clock source sampling frequency control selector.
pub const CS_SAM_FREQ_CONTROL: u8 = 0x01;
/// Clock source validity control selector.
pub const CS_CLOCK_VALID_CONTROL: u8 = 0x02;

/// Clock source feeding the OUT (capture) terminal.
pub const USB_OUT_CLOCK_ID: u8 = 9;
/// Clock source feeding the IN (playback) terminal.
pub const USB_IN_CLOCK_ID: u8 = 10;

/// Returns the clock source entity of a direction.
#[inline(always)]
pub const fn clock_id(direction: Direction) -> u8 {
    match direction {
        Direction::Playback => USB_IN_CLOCK_ID,
        Direction::Capture => USB_OUT_CLOCK_ID,
    }
}

/// Returns the direction a clock source entity belongs to.
#[inline(always)]
pub const fn clock_direction(entity_id: u8) -> Option<Direction> {
    match entity_id {
        USB_IN_CLOCK_ID => Some(Direction::Playback),
        USB_OUT_CLOCK_ID => Some(Direction::Capture),
        _ => None,
    }
}

/// A validated clock control request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClockRequest {
    /// `GET CUR` on the sampling frequency control.
    GetRate(Direction),
    /// `GET RANGE` on the sampling frequency control.
    GetRateRange(Direction),
    /// `GET CUR` on the clock validity control.
    GetClockValid(Direction),
    /// `SET CUR` on the sampling frequency control.
    SetRate(Direction),
}

/// Reasons a setup packet is not a clock control request this function serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestError {
    /// Not a class-specific request.
    NotClass,
    /// Not addressed to an interface.
    NotInterface,
    /// Addressed to an interface other than the audio control interface.
    WrongInterface(u8),
    /// Unknown request code for this direction of transfer.
    UnknownRequest(u8),
    /// Unknown control selector for this request.
    UnknownSelector(u8),
    /// Not a clock source entity of this function.
    UnknownEntity(u8),
}

impl fmt::Display for RequestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotClass => write!(f, "not a class-specific request"),
            Self::NotInterface => write!(f, "recipient is not an interface"),
            Self::WrongInterface(i) => write!(f, "interface {i} is not the control interface"),
            Self::UnknownRequest(r) => write!(f, "unsupported request code {r:#04x}"),
            Self::UnknownSelector(s) => write!(f, "unsupported control selector {s}"),
            Self::UnknownEntity(e) => write!(f, "entity {e} is not a clock source"),
        }
    }
}

impl core::error::Error for RequestError {}

impl ClockRequest {
    /// Classifies a setup packet addressed to this function.
    ///
    /// Only class-specific, interface-recipient requests directed at
    /// `control_interface` are accepted; anything else is refused before a data stage
    /// is ever granted.
    pub fn classify(setup: &SetupPacket, control_interface: u8) -> Result<Self, RequestError> {
        if setup.request_type() != RequestType::Class {
            return Err(RequestError::NotClass);
        }

        if setup.recipient() != Recipient::Interface {
            return Err(RequestError::NotInterface);
        }

        if setup.interface() != control_interface {
            return Err(RequestError::WrongInterface(setup.interface()));
        }

        let selector = setup.control_selector();

        let direction = clock_direction(setup.entity_id())
            .ok_or(RequestError::UnknownEntity(setup.entity_id()))?;

        match (setup.is_device_to_host(), setup.b_request, selector) {
            (true, CUR, CS_SAM_FREQ_CONTROL) => Ok(Self::GetRate(direction)),
            (true, CUR, CS_CLOCK_VALID_CONTROL) => Ok(Self::GetClockValid(direction)),
            (true, RANGE, CS_SAM_FREQ_CONTROL) => Ok(Self::GetRateRange(direction)),
            (false, CUR, CS_SAM_FREQ_CONTROL) => Ok(Self::SetRate(direction)),
            (true, CUR | RANGE, s) | (false, CUR, s) => Err(RequestError::UnknownSelector(s)),
            (_, r, _) => Err(RequestError::UnknownRequest(r)),
        }
    }

    /// Returns the direction whose clock this request addresses.
    #[inline(always)]
    pub const fn direction(self) -> Direction {
        match self {
            Self::GetRate(d) | Self::GetRateRange(d) | Self::GetClockValid(d) | Self::SetRate(d) => d,
        }
    }
}

/// Layout 3 `CUR` parameter block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Layout3Cur(pub u32);

impl Layout3Cur {
    pub const SIZE: usize = 4;

    #[inline(always)]
    pub const fn to_bytes(self) -> [u8; Self::SIZE] {
        self.0.to_le_bytes()
    }

    /// Decodes a `CUR` block from the data stage of a `SET` request.
    ///
    /// Returns `None` if fewer than [`Self::SIZE`] bytes were received. Extra bytes
    /// are ignored.
    #[inline(always)]
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let (value, _) = bytes.split_first_chunk::<{ Layout3Cur::SIZE }>()?;
        Some(Self(u32::from_le_bytes(*value)))
    }
}

/// A single layout 3 sub-range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Layout3Range {
    pub min: u32,
    pub max: u32,
    pub res: u32,
}

impl Layout3Range {
    /// Size of a `RANGE` parameter block holding exactly one sub-range.
    pub const SINGLE_SIZE: usize = 2 + 3 * 4;

    /// A range that only contains `value`.
    #[inline(always)]
    pub const fn discrete(value: u32) -> Self {
        Self {
            min: value,
            max: value,
            res: 0,
        }
    }

    /// Encodes a `RANGE` parameter block with this as its only sub-range.
    pub fn to_single_block(self) -> [u8; Self::SINGLE_SIZE] {
        let mut block = [0; Self::SINGLE_SIZE];
        let (count, triplet) = block.split_at_mut(2);
        count.copy_from_slice(&1u16.to_le_bytes());

        for (dest, value) in triplet.chunks_exact_mut(4).zip([self.min, self.max, self.res]) {
            dest.copy_from_slice(&value.to_le_bytes());
        }

        block
    }
}
