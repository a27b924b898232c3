//! Persisted splitter settings.
//!
//! A flat JSON record of the last-used devices and parameters. Missing keys
//! take their defaults and unknown keys are ignored, so files written by older
//! versions (including the `L1R2`/`R1L2` mapping codes) still load.

use std::io::ErrorKind;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config::{BlockTiming, ChannelMapping, Destination, DeviceId, EngineConfig};
use crate::pipeline::{ParameterSet, DEFAULT_DELAY_MS, DEFAULT_GAIN};
use crate::SettingsError;

/// Default settings file name, relative to the working directory.
pub const DEFAULT_SETTINGS_FILE: &str = "audio_splitter_config.json";

/// Saved devices and parameters.
///
/// # Example
///
/// ```
/// use split_audio::{ChannelMapping, Settings};
///
/// let settings: Settings = serde_json::from_str(r#"{"delay2": 120, "mapping": "R1L2"}"#)?;
/// assert_eq!(settings.delay2, 120.0);
/// assert_eq!(settings.vol1, 1.0);
/// assert_eq!(settings.mapping, ChannelMapping::Swapped);
/// # Ok::<(), serde_json::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Capture device.
    pub input: DeviceId,
    /// Render device for destination 1.
    pub out1: DeviceId,
    /// Render device for destination 2.
    pub out2: DeviceId,
    /// Destination 1 delay in milliseconds.
    pub delay1: f64,
    /// Destination 2 delay in milliseconds.
    pub delay2: f64,
    /// Destination 1 linear gain.
    pub vol1: f32,
    /// Destination 2 linear gain.
    pub vol2: f32,
    /// Left/right mapping.
    pub mapping: ChannelMapping,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            input: DeviceId(0),
            out1: DeviceId(0),
            out2: DeviceId(0),
            delay1: DEFAULT_DELAY_MS[0],
            delay2: DEFAULT_DELAY_MS[1],
            vol1: DEFAULT_GAIN[0],
            vol2: DEFAULT_GAIN[1],
            mapping: ChannelMapping::Normal,
        }
    }
}

impl Settings {
    /// Loads settings from `path`, falling back to defaults if the file is
    /// missing or cannot be parsed.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match Self::try_load(path) {
            Ok(settings) => settings,
            Err(SettingsError::Io { ref source, .. }) if source.kind() == ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "No settings file, using defaults");
                Self::default()
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to load settings, using defaults");
                Self::default()
            }
        }
    }

    /// Loads settings from `path`.
    pub fn try_load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&contents).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Writes settings to `path` as pretty-printed JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), SettingsError> {
        let path = path.as_ref();
        let json =
            serde_json::to_string_pretty(self).map_err(|source| SettingsError::Serialize {
                path: path.to_path_buf(),
                source,
            })?;
        std::fs::write(path, json).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "Settings saved");
        Ok(())
    }

    /// Builds an engine configuration at the given timing.
    pub fn to_engine_config(&self, timing: BlockTiming) -> EngineConfig {
        EngineConfig {
            input: self.input,
            outputs: [self.out1, self.out2],
            timing,
            parameters: ParameterSet::new(
                [self.delay1, self.delay2],
                [self.vol1, self.vol2],
                self.mapping,
            ),
        }
    }

    /// Captures the devices and parameters of `config`.
    pub fn from_engine_config(config: &EngineConfig) -> Self {
        let params = &config.parameters;
        Self {
            input: config.input,
            out1: config.output(Destination::First),
            out2: config.output(Destination::Second),
            delay1: params.delay_ms(Destination::First),
            delay2: params.delay_ms(Destination::Second),
            vol1: params.gain(Destination::First),
            vol2: params.gain(Destination::Second),
            mapping: params.mapping(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.input, DeviceId(0));
        assert_eq!(settings.delay1, 0.0);
        assert_eq!(settings.delay2, 50.0);
        assert_eq!(settings.vol2, 1.0);
        assert_eq!(settings.mapping, ChannelMapping::Normal);
    }

    #[test]
    fn test_missing_keys_take_defaults_and_unknown_keys_are_ignored() {
        let settings: Settings =
            serde_json::from_str(r#"{"out2": 3, "vol1": 0.5, "window": "800x600"}"#).unwrap();
        assert_eq!(settings.out2, DeviceId(3));
        assert_eq!(settings.vol1, 0.5);
        assert_eq!(settings.delay2, 50.0);
    }

    #[test]
    fn test_legacy_mapping_codes() {
        let settings: Settings = serde_json::from_str(r#"{"mapping": "L1R2"}"#).unwrap();
        assert_eq!(settings.mapping, ChannelMapping::Normal);
        let settings: Settings = serde_json::from_str(r#"{"mapping": "R1L2"}"#).unwrap();
        assert_eq!(settings.mapping, ChannelMapping::Swapped);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let settings = Settings {
            input: DeviceId(4),
            out1: DeviceId(5),
            out2: DeviceId(6),
            delay1: 10.0,
            delay2: 250.0,
            vol1: 0.75,
            vol2: 0.5,
            mapping: ChannelMapping::Swapped,
        };

        settings.save(&path).unwrap();
        assert_eq!(Settings::try_load(&path).unwrap(), settings);

        let json = std::fs::read_to_string(&path).unwrap();
        assert!(json.contains("\"mapping\": \"Swapped\""));
    }

    #[test]
    fn test_load_missing_file_returns_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load(dir.path().join("absent.json"));
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_load_corrupt_file_returns_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{ not json").unwrap();

        assert!(matches!(
            Settings::try_load(&path),
            Err(SettingsError::Parse { .. })
        ));
        assert_eq!(Settings::load(&path), Settings::default());
    }

    #[test]
    fn test_engine_config_conversion() {
        let settings = Settings {
            out1: DeviceId(1),
            out2: DeviceId(2),
            delay2: 120.0,
            vol1: 0.8,
            ..Default::default()
        };
        let config = settings.to_engine_config(BlockTiming::default());

        assert_eq!(config.outputs, [DeviceId(1), DeviceId(2)]);
        assert_eq!(config.parameters.delay_ms(Destination::Second), 120.0);
        assert_eq!(config.parameters.gain(Destination::First), 0.8);
        assert_eq!(Settings::from_engine_config(&config), settings);
    }
}
