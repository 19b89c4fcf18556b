//! Events announced to userspace when the host's use of the function changes.

use crate::Direction;
use serde::{Deserialize, Serialize};

// Flat: every (kind, direction) pair is its own variant, encoded as a single discriminant.

/// A notification carrying nothing but its kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Event {
    /// The host selected a streaming alternate setting on the IN interface, or changed
    /// its parameters.
    PlaybackStreamOpened,
    /// The host stopped streaming on the IN interface.
    PlaybackStreamClosed,
    /// The host selected a streaming alternate setting on the OUT interface, or changed
    /// its parameters.
    CaptureStreamOpened,
    /// The host stopped streaming on the OUT interface.
    CaptureStreamClosed,
    /// The function was disabled, typically because the cable was unplugged.
    CableDisconnected,
}

impl Event {
    /// All event kinds.
    pub const ALL: [Event; 5] = [
        Event::PlaybackStreamOpened,
        Event::PlaybackStreamClosed,
        Event::CaptureStreamOpened,
        Event::CaptureStreamClosed,
        Event::CableDisconnected,
    ];

    /// Upper bound on the size of an encoded event.
    pub const MAX_ENCODED_SIZE: usize = 1;

    #[inline(always)]
    pub const fn opened(direction: Direction) -> Self {
        match direction {
            Direction::Playback => Self::PlaybackStreamOpened,
            Direction::Capture => Self::CaptureStreamOpened,
        }
    }

    #[inline(always)]
    pub const fn closed(direction: Direction) -> Self {
        match direction {
            Direction::Playback => Self::PlaybackStreamClosed,
            Direction::Capture => Self::CaptureStreamClosed,
        }
    }

    /// Returns the direction this event is about, if any.
    #[inline(always)]
    pub const fn direction(self) -> Option<Direction> {
        match self {
            Self::PlaybackStreamOpened | Self::PlaybackStreamClosed => Some(Direction::Playback),
            Self::CaptureStreamOpened | Self::CaptureStreamClosed => Some(Direction::Capture),
            Self::CableDisconnected => None,
        }
    }

    /// Returns the conventional `KEY` string used for kobject-style change events.
    #[inline(always)]
    pub const fn uevent(self) -> &'static str {
        match self {
            Self::PlaybackStreamOpened => "HOST_PLAYBACK_STREAM_PARAMS_CHANGED",
            Self::PlaybackStreamClosed => "HOST_PLAYBACK_STREAM_CLOSED",
            Self::CaptureStreamOpened => "HOST_CAPTURE_STREAM_PARAMS_CHANGED",
            Self::CaptureStreamClosed => "HOST_CAPTURE_STREAM_CLOSED",
            Self::CableDisconnected => "HOST_CABLE_DISCONNECTED",
        }
    }

    /// Encodes this event with [`postcard`], returning the used part of `buf`.
    #[inline(always)]
    pub fn encode(self, buf: &mut [u8]) -> postcard::Result<&mut [u8]> {
        postcard::to_slice(&self, buf)
    }

    /// Decodes an event previously encoded with [`Event::encode`].
    #[inline(always)]
    pub fn decode(bytes: &[u8]) -> postcard::Result<Self> {
        postcard::from_bytes(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directions_map_to_distinct_kinds() {
        for d in Direction::ALL {
            assert_eq!(Event::opened(d).direction(), Some(d));
            assert_eq!(Event::closed(d).direction(), Some(d));
            assert_ne!(Event::opened(d), Event::closed(d));
        }
        assert_eq!(Event::CableDisconnected.direction(), None);
    }

    #[test]
    fn encoded_events_fit_in_a_single_byte() {
        let mut buf = [0; Event::MAX_ENCODED_SIZE];

        for event in Event::ALL {
            let encoded = event.encode(&mut buf).unwrap();
            assert_eq!(Event::decode(encoded).unwrap(), event);
        }
    }
}
