//! Per-instance configuration.
//!
//! Every instance of the function owns its configuration: stream formats, endpoint
//! descriptors, and tuning of the transfer pool and of the event notifier. Nothing is
//! shared between instances.
//!
//! ```toml
//! transfers = 8
//!
//! [playback]
//! channel_mask = 3
//! sample_rate = 44100
//!
//! [high_speed]
//! max_packet_size = 1024
//! interval = 4
//! ```

use crate::{
    error::ConfigError,
    transport::{EndpointDescriptor, Speed},
};
use core::time::Duration;
use serde::{Deserialize, Serialize};
use uac2_proto::{
    Direction,
    format::{ChannelMask, MAX_FRAME_SIZE, SampleFormat, SampleRate, StreamParams},
};

/// Default number of in-flight transfers per direction.
pub const DEFAULT_TRANSFERS: usize = 8;
/// Most in-flight transfers per direction.
pub const MAX_TRANSFERS: usize = 32;

/// Stream format of one direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectionConfig {
    pub channel_mask: u32,
    pub sample_rate: u32,
    /// Sample container size, in bytes.
    pub subslot_size: u8,
    pub bit_resolution: u8,
}

impl Default for DirectionConfig {
    fn default() -> Self {
        Self {
            channel_mask: ChannelMask::STEREO.0,
            sample_rate: SampleRate::DEFAULT.get(),
            subslot_size: 2,
            bit_resolution: 16,
        }
    }
}

impl DirectionConfig {
    /// Validates this configuration and converts it into stream parameters.
    pub fn stream_params(&self, direction: Direction) -> Result<StreamParams, ConfigError> {
        let sample_rate =
            SampleRate::new(self.sample_rate).ok_or(ConfigError::UnsupportedRate {
                direction,
                rate: self.sample_rate,
            })?;

        let channel_mask = ChannelMask(self.channel_mask);
        if channel_mask.is_empty() {
            return Err(ConfigError::EmptyChannelMask(direction));
        }

        let format = SampleFormat::from_slot(self.subslot_size, self.bit_resolution).ok_or(
            ConfigError::UnknownFormat {
                direction,
                subslot_size: self.subslot_size,
                bit_resolution: self.bit_resolution,
            },
        )?;

        Ok(StreamParams {
            sample_rate,
            format,
            channel_mask,
        })
    }
}

/// Configuration of a function instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GadgetConfig {
    /// In-flight transfers per direction.
    pub transfers: usize,
    /// How long a stream has to stay opened before it is announced, in milliseconds.
    pub event_delay_ms: u64,
    /// Minimum time between announcing that a stream closed and that it reopened,
    /// in milliseconds.
    pub event_spacing_ms: u64,
    /// Device to host.
    pub playback: DirectionConfig,
    /// Host to device.
    pub capture: DirectionConfig,
    pub full_speed: EndpointDescriptor,
    /// Also used at super speed.
    pub high_speed: EndpointDescriptor,
}

impl Default for GadgetConfig {
    fn default() -> Self {
        Self {
            transfers: DEFAULT_TRANSFERS,
            event_delay_ms: 30,
            event_spacing_ms: 20,
            playback: DirectionConfig::default(),
            capture: DirectionConfig::default(),
            full_speed: EndpointDescriptor::FULL_SPEED,
            high_speed: EndpointDescriptor::HIGH_SPEED,
        }
    }
}

impl GadgetConfig {
    /// Parses and validates a TOML configuration. Missing keys take their default value.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for direction in Direction::ALL {
            self.direction(direction).stream_params(direction)?;
        }

        for (speed, descriptor) in [
            (Speed::Full, self.full_speed),
            (Speed::High, self.high_speed),
        ] {
            // every alternate setting needs at least a frame a packet
            if u32::from(descriptor.max_packet_size) < MAX_FRAME_SIZE {
                return Err(ConfigError::MaxPacketSize {
                    max_packet_size: descriptor.max_packet_size,
                    frame_size: MAX_FRAME_SIZE,
                });
            }

            let Some(frames) = descriptor.frames_per_packet() else {
                return Err(ConfigError::Interval(descriptor.interval));
            };

            // a packet must go out at least once a second
            if frames.get() > speed.frames_per_second().get() {
                return Err(ConfigError::Interval(descriptor.interval));
            }
        }

        if !(1..=MAX_TRANSFERS).contains(&self.transfers) {
            return Err(ConfigError::Transfers(self.transfers));
        }

        Ok(())
    }

    #[inline(always)]
    pub fn direction(&self, direction: Direction) -> &DirectionConfig {
        match direction {
            Direction::Playback => &self.playback,
            Direction::Capture => &self.capture,
        }
    }

    /// Returns the endpoint descriptor used at `speed`.
    #[inline(always)]
    pub fn endpoint(&self, speed: Speed) -> EndpointDescriptor {
        match speed {
            Speed::Full => self.full_speed,
            Speed::High | Speed::Super => self.high_speed,
        }
    }

    #[inline(always)]
    pub fn event_delay(&self) -> Duration {
        Duration::from_millis(self.event_delay_ms)
    }

    #[inline(always)]
    pub fn event_spacing(&self) -> Duration {
        Duration::from_millis(self.event_spacing_ms)
    }
}
