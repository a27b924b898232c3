//! Audio stream backends.
//!
//! The engine only talks to audio hardware through [`StreamBackend`]. Two
//! implementations ship with the crate:
//!
//! - [`CpalBackend`]: real devices via CPAL (feature `cpal-backend`)
//! - [`MockBackend`]: in-memory streams for tests and CI
//!
//! # Contract
//!
//! - `open_*` fails with [`StreamError`] if the device cannot be opened.
//! - The capture [`BlockCallback`] is invoked once per block period on the
//!   backend's audio thread, never concurrently with itself, and never again
//!   once the capture stream's [`StreamControl::close`] has returned.
//! - [`BlockWriter::write`] must not block for longer than a bounded time; a
//!   block it cannot take is reported as [`StreamError::WriteFailed`].

#[cfg(feature = "cpal-backend")]
mod cpal_backend;
mod mock;

#[cfg(feature = "cpal-backend")]
pub use cpal_backend::{BlockFramer, CpalBackend};
pub use mock::{MockBackend, MockCall, MockStreamKind};

use crate::config::{BlockTiming, DeviceId};
use crate::StreamError;

/// Channel count requested for every stream.
pub const STEREO: u16 = 2;

/// Receives one captured block: interleaved frames and the number of channels
/// actually delivered (1 for a mono device).
///
/// The slice is owned by the backend and only valid for the duration of the
/// call.
pub type BlockCallback = Box<dyn FnMut(&[f32], u16) + Send + 'static>;

/// Format requested when opening a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamSpec {
    /// Requested channel count.
    pub channels: u16,
    /// Sample rate and frames per block.
    pub timing: BlockTiming,
}

impl StreamSpec {
    /// A two-channel stream at `timing`.
    pub fn stereo(timing: BlockTiming) -> Self {
        Self {
            channels: STEREO,
            timing,
        }
    }
}

/// Lifecycle of an opened stream.
pub trait StreamControl {
    /// Starts the stream.
    fn start(&mut self) -> Result<(), StreamError>;

    /// Stops the stream. It may be restarted.
    fn stop(&mut self) -> Result<(), StreamError>;

    /// Releases the stream. No callbacks run after this returns.
    fn close(&mut self) -> Result<(), StreamError>;
}

/// Accepts interleaved stereo blocks for a render stream.
///
/// Owned by the capture handler and called from the audio thread.
pub trait BlockWriter: Send {
    /// Queues one block of interleaved frames for playback.
    fn write(&mut self, frames: &[f32]) -> Result<(), StreamError>;
}

/// An opened render stream: its lifecycle handle and its writer.
pub struct RenderStream {
    /// Start/stop/close handle, kept by the engine.
    pub control: Box<dyn StreamControl>,
    /// Block sink, moved into the capture handler.
    pub writer: Box<dyn BlockWriter>,
}

/// Opens capture and render streams on audio devices.
pub trait StreamBackend {
    /// Opens a capture stream on `device`. `on_block` receives every captured
    /// block once the stream is started.
    fn open_input(
        &self,
        device: DeviceId,
        spec: StreamSpec,
        on_block: BlockCallback,
    ) -> Result<Box<dyn StreamControl>, StreamError>;

    /// Opens a render stream on `device`.
    fn open_output(&self, device: DeviceId, spec: StreamSpec)
        -> Result<RenderStream, StreamError>;
}

/// Description of one audio device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Identifier to pass to [`EngineConfig`](crate::EngineConfig).
    pub id: DeviceId,
    /// Human-readable device name.
    pub name: String,
    /// Maximum capture channels (0 if the device cannot capture).
    pub max_input_channels: u16,
    /// Maximum render channels (0 if the device cannot render).
    pub max_output_channels: u16,
}

impl DeviceInfo {
    /// Returns `true` if the device can capture.
    pub fn is_input(&self) -> bool {
        self.max_input_channels > 0
    }

    /// Returns `true` if the device can render.
    pub fn is_output(&self) -> bool {
        self.max_output_channels > 0
    }
}

/// Name fragment marking a virtual-cable capture device.
const PREFERRED_INPUT_HINT: &str = "cable";
/// Name fragment marking a speaker output.
const PREFERRED_OUTPUT_HINT: &str = "speakers";

/// Capture devices whose name mentions a virtual cable, or every capture
/// device if none does.
pub fn preferred_inputs(devices: &[DeviceInfo]) -> Vec<&DeviceInfo> {
    preferred(devices, DeviceInfo::is_input, PREFERRED_INPUT_HINT)
}

/// Render devices whose name mentions speakers, or every render device if
/// none does.
pub fn preferred_outputs(devices: &[DeviceInfo]) -> Vec<&DeviceInfo> {
    preferred(devices, DeviceInfo::is_output, PREFERRED_OUTPUT_HINT)
}

fn preferred<'a>(
    devices: &'a [DeviceInfo],
    capable: fn(&DeviceInfo) -> bool,
    hint: &str,
) -> Vec<&'a DeviceInfo> {
    let capable: Vec<&DeviceInfo> = devices.iter().filter(|d| capable(d)).collect();
    let matching: Vec<&DeviceInfo> = capable
        .iter()
        .copied()
        .filter(|d| d.name.to_lowercase().contains(hint))
        .collect();
    if matching.is_empty() {
        capable
    } else {
        matching
    }
}
