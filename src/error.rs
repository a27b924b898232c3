//! Error types for split-audio.
//!
//! Errors are split into two categories:
//! - **Fatal errors** ([`SplitAudioError`]): Prevent the engine from starting
//! - **Stream errors** ([`StreamError`]): Per-stream failures while running or
//!   stopping. These never stop the engine; they are counted, reported through
//!   the [`EventCallback`](crate::EventCallback), or returned from `stop()`.

use std::fmt;
use std::path::PathBuf;

use crate::config::{Destination, DeviceId};

/// Which of the engine's three streams an error or event refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamRole {
    /// The capture (input) stream.
    Capture,
    /// One of the two render (output) streams.
    Render(Destination),
}

impl fmt::Display for StreamRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Capture => f.write_str("capture"),
            Self::Render(destination) => write!(f, "render {destination}"),
        }
    }
}

/// Fatal errors that prevent the engine from starting.
///
/// These are returned from [`AudioEngine::start()`]. When one is returned the
/// engine is stopped and every stream opened during the attempt has already
/// been closed.
///
/// [`AudioEngine::start()`]: crate::AudioEngine::start
#[derive(Debug, thiserror::Error)]
pub enum SplitAudioError {
    /// A requested device id could not be opened (invalid, missing, or busy).
    #[error("{role} device {device} unavailable: {reason}")]
    DeviceUnavailable {
        /// Stream the device was requested for.
        role: StreamRole,
        /// The device id that failed to open.
        device: DeviceId,
        /// Backend description of the failure.
        reason: String,
    },

    /// A stream was opened but could not be started.
    #[error("{role} stream failed to start: {reason}")]
    OpenFailed {
        /// Stream that failed.
        role: StreamRole,
        /// Backend description of the failure.
        reason: String,
    },

    /// The engine configuration is unusable.
    #[error("invalid configuration: {reason}")]
    InvalidConfig {
        /// What is wrong with it.
        reason: String,
    },

    /// An error from the underlying audio library.
    #[error("audio backend error: {0}")]
    BackendError(String),
}

impl SplitAudioError {
    /// Creates an invalid-configuration error.
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }
}

/// Recoverable failure of a single stream operation.
///
/// A [`StreamError::WriteFailed`] loses one block for one destination; a
/// failure from `stop`/`close` is reported and the remaining streams are
/// still torn down.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StreamError {
    /// The device could not be opened with the requested format.
    #[error("open failed: {0}")]
    OpenFailed(String),

    /// The stream could not accept a block (underrun, queue full, device gone).
    #[error("write failed: {reason}")]
    WriteFailed {
        /// Description of what went wrong.
        reason: String,
    },

    /// The stream refused to start.
    #[error("start failed: {0}")]
    StartFailed(String),

    /// The stream did not stop cleanly.
    #[error("stop failed: {0}")]
    StopFailed(String),

    /// The stream did not close cleanly.
    #[error("close failed: {0}")]
    CloseFailed(String),

    /// The stream has already been closed.
    #[error("stream closed")]
    Closed,
}

impl StreamError {
    /// Creates a write failed error with the given reason.
    pub fn write_failed(reason: impl Into<String>) -> Self {
        Self::WriteFailed {
            reason: reason.into(),
        }
    }
}

/// A stream that failed to stop or close during [`AudioEngine::stop()`].
///
/// [`AudioEngine::stop()`]: crate::AudioEngine::stop
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StopFailure {
    /// Stream that failed.
    pub role: StreamRole,
    /// What went wrong.
    pub error: StreamError,
}

/// Errors reading or writing the persisted [`Settings`](crate::Settings).
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    /// File I/O error.
    #[error("settings file error: {path}: {source}")]
    Io {
        /// Path to the file.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The file contents are not a valid settings record.
    #[error("settings parse error: {path}: {source}")]
    Parse {
        /// Path to the file.
        path: PathBuf,
        /// The underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// The settings could not be encoded for saving.
    #[error("settings encode error: {path}: {source}")]
    Serialize {
        /// Path the settings were being saved to.
        path: PathBuf,
        /// The underlying JSON error.
        #[source]
        source: serde_json::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_unavailable_display() {
        let err = SplitAudioError::DeviceUnavailable {
            role: StreamRole::Render(Destination::Second),
            device: DeviceId(7),
            reason: "busy".to_string(),
        };
        assert_eq!(err.to_string(), "render destination 2 device #7 unavailable: busy");
    }

    #[test]
    fn test_invalid_config_helper() {
        let err = SplitAudioError::invalid_config("block size must be > 0");
        assert_eq!(
            err.to_string(),
            "invalid configuration: block size must be > 0"
        );
    }

    #[test]
    fn test_stream_error_write_failed() {
        let err = StreamError::write_failed("queue full");
        assert_eq!(err.to_string(), "write failed: queue full");
    }

    #[test]
    fn test_stream_role_display() {
        assert_eq!(StreamRole::Capture.to_string(), "capture");
        assert_eq!(
            StreamRole::Render(Destination::First).to_string(),
            "render destination 1"
        );
    }

    #[test]
    fn test_settings_serialize_error_is_not_a_parse_error() {
        let source = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = SettingsError::Serialize {
            path: PathBuf::from("out.json"),
            source,
        };
        assert!(err
            .to_string()
            .starts_with("settings encode error: out.json: "));
    }

    #[test]
    fn test_settings_error_io_mentions_path() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = SettingsError::Io {
            path: PathBuf::from("/tmp/settings.json"),
            source: io_err,
        };
        assert!(err.to_string().contains("/tmp/settings.json"));
    }
}
