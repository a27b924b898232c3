//! Configuration types for the engine.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::pipeline::{ParameterSet, MAX_DELAY_MS};
use crate::SplitAudioError;

/// Default capture/render sample rate in Hz.
pub const DEFAULT_SAMPLE_RATE: u32 = 44_100;

/// Default number of frames per block.
pub const DEFAULT_BLOCK_SIZE: usize = 1024;

/// Highest sample rate accepted by [`EngineConfig::validate`].
pub const MAX_SAMPLE_RATE: u32 = 384_000;

/// Largest block size, in frames, accepted by [`EngineConfig::validate`].
pub const MAX_BLOCK_SIZE: usize = 65_536;

/// Backend-specific device identifier.
///
/// For the CPAL backend this is the device's index in the host's device list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(pub usize);

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl From<usize> for DeviceId {
    fn from(index: usize) -> Self {
        Self(index)
    }
}

/// One of the two render destinations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Destination {
    /// Destination 1 (`out1`).
    First,
    /// Destination 2 (`out2`).
    Second,
}

impl Destination {
    /// Both destinations, in index order.
    pub const ALL: [Destination; 2] = [Destination::First, Destination::Second];

    /// Zero-based index, used for the per-destination arrays.
    #[must_use]
    pub fn index(self) -> usize {
        match self {
            Self::First => 0,
            Self::Second => 1,
        }
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "destination {}", self.index() + 1)
    }
}

/// Assignment of the captured left/right channels to the two destinations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ChannelMapping {
    /// Left to destination 1, right to destination 2.
    #[default]
    #[serde(alias = "L1R2")]
    Normal,
    /// Right to destination 1, left to destination 2.
    #[serde(alias = "R1L2")]
    Swapped,
}

/// Sample rate and block size shared by all three streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockTiming {
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Frames per block.
    pub block_size: usize,
}

impl BlockTiming {
    /// Returns the duration of one block.
    ///
    /// Returns zero for a zero sample rate.
    #[must_use]
    pub fn block_period(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.block_size as f64 / f64::from(self.sample_rate))
    }

    /// Returns the output latency of a delay line holding `depth` blocks.
    #[must_use]
    pub fn latency_for_depth(&self, depth: usize) -> Duration {
        self.block_period() * depth as u32
    }
}

impl Default for BlockTiming {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            block_size: DEFAULT_BLOCK_SIZE,
        }
    }
}

/// Everything needed to start the engine.
///
/// # Example
///
/// ```
/// use split_audio::{DeviceId, EngineConfig};
///
/// let config = EngineConfig {
///     input: DeviceId(3),
///     outputs: [DeviceId(5), DeviceId(6)],
///     ..Default::default()
/// };
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngineConfig {
    /// Capture device.
    pub input: DeviceId,
    /// Render devices for destination 1 and 2.
    pub outputs: [DeviceId; 2],
    /// Sample rate and block size.
    pub timing: BlockTiming,
    /// Initial live parameters.
    pub parameters: ParameterSet,
}

impl EngineConfig {
    /// Returns the render device for `destination`.
    #[must_use]
    pub fn output(&self, destination: Destination) -> DeviceId {
        self.outputs[destination.index()]
    }

    /// Checks the configuration before any stream is opened.
    ///
    /// # Errors
    ///
    /// Returns [`SplitAudioError::InvalidConfig`] for a sample rate outside
    /// `1..=MAX_SAMPLE_RATE`, a block size outside `1..=MAX_BLOCK_SIZE`, a
    /// delay outside `0..=MAX_DELAY_MS`, or a non-finite gain. These are the
    /// values [`AudioEngine::update`](crate::AudioEngine::update) would clamp.
    pub fn validate(&self) -> Result<(), SplitAudioError> {
        let BlockTiming {
            sample_rate,
            block_size,
        } = self.timing;
        if !(1..=MAX_SAMPLE_RATE).contains(&sample_rate) {
            return Err(SplitAudioError::invalid_config(format!(
                "sample rate must be 1..={MAX_SAMPLE_RATE} Hz (got {sample_rate})"
            )));
        }
        if !(1..=MAX_BLOCK_SIZE).contains(&block_size) {
            return Err(SplitAudioError::invalid_config(format!(
                "block size must be 1..={MAX_BLOCK_SIZE} frames (got {block_size})"
            )));
        }
        for destination in Destination::ALL {
            let delay = self.parameters.delay_ms(destination);
            if !(0.0..=MAX_DELAY_MS).contains(&delay) {
                return Err(SplitAudioError::invalid_config(format!(
                    "{destination} delay must be 0..={MAX_DELAY_MS} ms (got {delay})"
                )));
            }
            let gain = self.parameters.gain(destination);
            if !gain.is_finite() {
                return Err(SplitAudioError::invalid_config(format!(
                    "{destination} gain must be finite (got {gain})"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_timing_defaults() {
        let timing = BlockTiming::default();
        assert_eq!(timing.sample_rate, 44_100);
        assert_eq!(timing.block_size, 1024);
    }

    #[test]
    fn test_block_period() {
        let timing = BlockTiming {
            sample_rate: 48_000,
            block_size: 480,
        };
        assert_eq!(timing.block_period(), Duration::from_millis(10));
        assert_eq!(timing.latency_for_depth(3), Duration::from_millis(30));
    }

    #[test]
    fn test_block_period_zero_rate() {
        let timing = BlockTiming {
            sample_rate: 0,
            block_size: 1024,
        };
        assert_eq!(timing.block_period(), Duration::ZERO);
    }

    #[test]
    fn test_destination_index_and_display() {
        assert_eq!(Destination::First.index(), 0);
        assert_eq!(Destination::Second.index(), 1);
        assert_eq!(Destination::Second.to_string(), "destination 2");
    }

    #[test]
    fn test_mapping_accepts_legacy_codes() {
        let normal: ChannelMapping = serde_json::from_str("\"L1R2\"").unwrap();
        let swapped: ChannelMapping = serde_json::from_str("\"R1L2\"").unwrap();
        assert_eq!(normal, ChannelMapping::Normal);
        assert_eq!(swapped, ChannelMapping::Swapped);
        assert_eq!(
            serde_json::to_string(&ChannelMapping::Swapped).unwrap(),
            "\"Swapped\""
        );
    }

    #[test]
    fn test_validate_default_config() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_block_size() {
        let mut config = EngineConfig::default();
        config.timing.block_size = 0;
        assert!(matches!(
            config.validate(),
            Err(SplitAudioError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_negative_delay() {
        let mut config = EngineConfig::default();
        config.parameters.set_delay_ms(Destination::Second, -5.0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_delay_above_max() {
        let mut config = EngineConfig::default();
        config.parameters.set_delay_ms(Destination::First, MAX_DELAY_MS);
        assert!(config.validate().is_ok());

        config.parameters.set_delay_ms(Destination::First, 1.0e13);
        assert!(config.validate().is_err());
        config.parameters.set_delay_ms(Destination::First, f64::INFINITY);
        assert!(config.validate().is_err());
        config.parameters.set_delay_ms(Destination::First, f64::NAN);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_oversized_timing() {
        let mut config = EngineConfig::default();
        config.timing.sample_rate = u32::MAX;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.timing.block_size = usize::MAX;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_accepts_negative_gain() {
        let mut config = EngineConfig::default();
        config.parameters.set_gain(Destination::Second, -1.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_nan_gain() {
        let mut config = EngineConfig::default();
        config.parameters.set_gain(Destination::First, f32::NAN);
        assert!(config.validate().is_err());
    }
}
