//! # split-audio
//!
//! **Note:** This crate is under active development. The API may change before 1.0.
//!
//! Real-time audio splitting: one stereo capture stream routed to two render
//! devices, each with its own delay, gain, and left/right assignment.
//!
//! A typical use is feeding a virtual-cable capture device into two sets of
//! speakers at different distances from the listener, delaying the nearer set
//! so both arrive together.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use split_audio::backend::CpalBackend;
//! use split_audio::{AudioEngine, ChannelMapping, DeviceId, EngineConfig};
//!
//! let mut engine = AudioEngine::new(CpalBackend::new())
//!     .on_event(|e| tracing::warn!(?e, "engine event"));
//!
//! engine.start(&EngineConfig {
//!     input: DeviceId(3),
//!     outputs: [DeviceId(5), DeviceId(6)],
//!     ..Default::default()
//! })?;
//!
//! // Adjust while running: 0 ms / 120 ms, second pair at 80%
//! engine.update(0.0, 120.0, 1.0, 0.8);
//! engine.update_mapping(ChannelMapping::Swapped);
//!
//! engine.stop();
//! # Ok::<(), split_audio::SplitAudioError>(())
//! ```
//!
//! ## Architecture
//!
//! ```text
//! Capture callback → split L/R + gain → Delay line 1 → Render stream 1
//!                                     → Delay line 2 → Render stream 2
//! ```
//!
//! - **Capture callback**: Runs on the backend's audio thread once per block
//! - **Delay lines**: Fixed-depth ring buffers of whole blocks, one per destination
//! - **Routing lock**: A short `parking_lot` mutex shared with [`AudioEngine::update`]
//!
//! Delay is quantized to whole blocks and is never less than one block.
//! See [`delay_depth`].

#![warn(missing_docs)]
// Audio code requires intentional numeric casts between sample formats
#![allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_possible_wrap,
    clippy::cast_lossless
)]
// unwrap/expect allowed in tests only
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]
// These doc lints are too strict for internal implementation details
#![allow(clippy::missing_panics_doc, clippy::missing_errors_doc)]

pub mod backend;
mod block;
mod config;
mod engine;
mod error;
mod event;
mod pipeline;
mod settings;
mod stats;

pub use block::AudioBlock;
pub use config::{
    BlockTiming, ChannelMapping, Destination, DeviceId, EngineConfig, DEFAULT_BLOCK_SIZE,
    DEFAULT_SAMPLE_RATE, MAX_BLOCK_SIZE, MAX_SAMPLE_RATE,
};
pub use engine::{AudioEngine, EngineStatus};
pub use error::{SettingsError, SplitAudioError, StopFailure, StreamError, StreamRole};
pub use event::{event_callback, EngineEvent, EventCallback};
pub use pipeline::{
    clamp_delay_ms, delay_depth, sanitize_gain, DelayLine, ParameterSet, DEFAULT_DELAY_MS,
    DEFAULT_GAIN, MAX_DELAY_MS,
};
pub use settings::{Settings, DEFAULT_SETTINGS_FILE};
pub use stats::EngineStats;
