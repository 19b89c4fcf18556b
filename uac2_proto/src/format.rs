//! Audio stream format definitions.

use core::{fmt, num};
use serde::{Deserialize, Serialize};

/// Sample rates a clock source accepts, in Hz.
///
/// The function only supports discrete rates, never a continuous range.
pub const SUPPORTED_RATES: [u32; 2] = [44_100, 48_000];

/// Supported sample formats.
///
/// All samples are signed, little-endian, interleaved and uncompressed. A format is
/// fully determined by its container (subslot) size and its bit resolution.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub enum SampleFormat {
    /// 16 bits in a 2-byte container.
    S16Le,
    /// 24 bits in a packed 3-byte container.
    S24_3Le,
    /// 24 bits in a 4-byte container.
    S24Le,
    /// 32 bits in a 4-byte container.
    S32Le,
}

impl SampleFormat {
    /// Returns the format described by a subslot size (in bytes) and a bit resolution,
    /// if it is one of the supported ones.
    #[inline(always)]
    pub const fn from_slot(subslot_size: u8, bit_resolution: u8) -> Option<Self> {
        use SampleFormat::*;
        match (subslot_size, bit_resolution) {
            (2, 16) => Some(S16Le),
            (3, 24) => Some(S24_3Le),
            (4, 24) => Some(S24Le),
            (4, 32) => Some(S32Le),
            _ => None,
        }
    }

    /// Returns the size of a single sample container in bytes.
    #[inline(always)]
    pub const fn container_size(self) -> num::NonZeroU8 {
        use SampleFormat::*;
        let res = match self {
            S16Le => 2,
            S24_3Le => 3,
            S24Le | S32Le => 4,
        };

        num::NonZeroU8::new(res).unwrap()
    }

    /// Returns the number of significant bits in each sample.
    #[inline(always)]
    pub const fn bit_resolution(self) -> u8 {
        use SampleFormat::*;
        match self {
            S16Le => 16,
            S24_3Le | S24Le => 24,
            S32Le => 32,
        }
    }
}

/// A sample rate from the [supported set](SUPPORTED_RATES).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct SampleRate(num::NonZeroU32);

impl SampleRate {
    /// 48 kHz, the default rate of both directions.
    pub const DEFAULT: Self = Self(num::NonZeroU32::new(48_000).unwrap());

    /// Creates a new sample rate if `hz` is one of the supported rates.
    #[inline(always)]
    pub const fn new(hz: u32) -> Option<Self> {
        let mut i = 0;
        while i < SUPPORTED_RATES.len() {
            if SUPPORTED_RATES[i] == hz {
                return match num::NonZeroU32::new(hz) {
                    Some(hz) => Some(Self(hz)),
                    None => None,
                };
            }
            i += 1;
        }
        None
    }

    /// Returns the rate in Hz.
    #[inline(always)]
    pub const fn get(self) -> u32 {
        self.0.get()
    }
}

impl Default for SampleRate {
    #[inline(always)]
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Error returned when creating a [`SampleRate`] outside of the supported set.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub struct UnsupportedRate(pub u32);

impl fmt::Display for UnsupportedRate {
    #[inline(always)]
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "unsupported sample rate {} Hz", self.0)
    }
}

impl core::error::Error for UnsupportedRate {}

impl TryFrom<u32> for SampleRate {
    type Error = UnsupportedRate;

    #[inline(always)]
    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value).ok_or(UnsupportedRate(value))
    }
}

impl From<SampleRate> for u32 {
    #[inline(always)]
    fn from(value: SampleRate) -> Self {
        value.get()
    }
}

/// A bitset of spatial channel positions. The channel count is its popcount.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub struct ChannelMask(pub u32);

impl ChannelMask {
    /// Front center only.
    pub const MONO: Self = Self(0x1);
    /// Front left and front right.
    pub const STEREO: Self = Self(0x3);

    /// Returns the number of channels in the mask.
    #[inline(always)]
    pub const fn count(self) -> u32 {
        self.0.count_ones()
    }

    #[inline(always)]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl Default for ChannelMask {
    #[inline(always)]
    fn default() -> Self {
        Self::STEREO
    }
}

/// The parameters of one direction's stream.
///
/// Owned by the function's configuration. They change only when the host sets a new
/// rate through the clock control protocol, or selects a new alternate setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StreamParams {
    pub sample_rate: SampleRate,
    pub format: SampleFormat,
    pub channel_mask: ChannelMask,
}

impl Default for StreamParams {
    /// Returns the default stream parameters:
    ///
    /// S16LE, 48 kHz, stereo.
    #[inline(always)]
    fn default() -> Self {
        Self {
            sample_rate: SampleRate::DEFAULT,
            format: SampleFormat::S16Le,
            channel_mask: ChannelMask::STEREO,
        }
    }
}

impl StreamParams {
    /// Returns the number of bytes in one frame (one container per channel).
    #[inline(always)]
    pub const fn frame_size(&self) -> u32 {
        self.format.container_size().get() as u32 * self.channel_mask.count()
    }

    /// Returns the number of bytes a second of audio occupies.
    #[inline(always)]
    pub const fn byte_rate(&self) -> u64 {
        self.sample_rate.get() as u64 * self.frame_size() as u64
    }

    /// Replaces the channel layout and format with those of an alternate setting,
    /// keeping the rate.
    #[inline(always)]
    pub const fn with_alt_setting(self, alt: AltSetting) -> Self {
        Self {
            sample_rate: self.sample_rate,
            format: alt.format,
            channel_mask: alt.channel_mask,
        }
    }
}

/// The format advertised by one non-zero alternate setting of a streaming interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AltSetting {
    pub channel_mask: ChannelMask,
    pub format: SampleFormat,
}

/// Highest alternate setting of either streaming interface.
pub const MAX_ALT_SETTING: u8 = 6;

/// The non-zero alternate settings of both streaming interfaces, in order:
/// (mono, stereo) × (16 bits in 2 bytes, 24 bits in 3 bytes, 24 bits in 4 bytes).
pub const ALT_SETTINGS: [AltSetting; MAX_ALT_SETTING as usize] = [
    AltSetting { channel_mask: ChannelMask::MONO, format: SampleFormat::S16Le },
    AltSetting { channel_mask: ChannelMask::STEREO, format: SampleFormat::S16Le },
    AltSetting { channel_mask: ChannelMask::MONO, format: SampleFormat::S24_3Le },
    AltSetting { channel_mask: ChannelMask::STEREO, format: SampleFormat::S24_3Le },
    AltSetting { channel_mask: ChannelMask::MONO, format: SampleFormat::S24Le },
    AltSetting { channel_mask: ChannelMask::STEREO, format: SampleFormat::S24Le },
];

/// Largest frame any alternate setting carries, in bytes.
pub const MAX_FRAME_SIZE: u32 = {
    let mut max = 0;
    let mut i = 0;
    while i < ALT_SETTINGS.len() {
        let size = ALT_SETTINGS[i].frame_size();
        if size > max {
            max = size;
        }
        i += 1;
    }
    max
};

impl AltSetting {
    #[inline(always)]
    pub const fn frame_size(self) -> u32 {
        self.format.container_size().get() as u32 * self.channel_mask.count()
    }

    /// Returns the format selected by alternate setting `alt`.
    ///
    /// Alternate setting `0` is the zero-bandwidth setting and carries no format.
    #[inline(always)]
    pub const fn lookup(alt: u8) -> Option<Self> {
        match alt {
            1..=MAX_ALT_SETTING => Some(ALT_SETTINGS[alt as usize - 1]),
            _ => None,
        }
    }
}
