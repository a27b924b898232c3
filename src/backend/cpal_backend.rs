//! CPAL stream backend.
//!
//! Capture: CPAL delivers buffers of whatever size the host chooses, so a
//! [`BlockFramer`] re-frames them into exact `block_size` blocks before the
//! engine's handler runs.
//!
//! Render: CPAL pulls output from its own thread. [`BlockWriter::write`] pushes
//! into a lock-free SPSC ring that the output callback drains, filling with
//! silence on underrun. A full ring rejects the block instead of blocking the
//! capture thread.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{
    BufferSize, Device, Host, SampleFormat, SampleRate, Stream, StreamConfig as CpalStreamConfig,
    SupportedBufferSize,
};
use ringbuf::traits::{Consumer, Observer, Producer, Split};
use ringbuf::HeapRb;

use super::{
    BlockCallback, BlockWriter, DeviceInfo, RenderStream, StreamBackend, StreamControl, StreamSpec,
};
use crate::config::{BlockTiming, DeviceId};
use crate::{SplitAudioError, StreamError};

/// Blocks of headroom in each render queue.
const OUTPUT_QUEUE_BLOCKS: usize = 4;

/// Symmetric i16 scale for sample conversion.
const I16_SCALE: f32 = i16::MAX as f32;
/// Minimum i16 as f32 for clamping.
const I16_MIN_F32: f32 = i16::MIN as f32;

/// [`StreamBackend`] for real audio devices.
///
/// Device ids are indices into the host's full device list (inputs and
/// outputs together), as returned by [`list_devices`](Self::list_devices).
pub struct CpalBackend {
    host: Host,
}

impl CpalBackend {
    /// Uses the platform's default audio host.
    pub fn new() -> Self {
        Self::with_host(cpal::default_host())
    }

    /// Uses a specific audio host.
    pub fn with_host(host: Host) -> Self {
        Self { host }
    }

    /// Lists every device the host exposes.
    ///
    /// # Errors
    ///
    /// Returns an error if the audio host cannot be queried.
    pub fn list_devices(&self) -> Result<Vec<DeviceInfo>, SplitAudioError> {
        let devices = self
            .host
            .devices()
            .map_err(|e| SplitAudioError::BackendError(e.to_string()))?;

        Ok(devices
            .enumerate()
            .map(|(index, device)| DeviceInfo {
                id: DeviceId(index),
                name: device.name().unwrap_or_else(|_| "unknown".to_string()),
                max_input_channels: max_channels(device.supported_input_configs()),
                max_output_channels: max_channels(device.supported_output_configs()),
            })
            .collect())
    }

    fn device(&self, id: DeviceId) -> Result<Device, StreamError> {
        self.host
            .devices()
            .map_err(|e| StreamError::OpenFailed(e.to_string()))?
            .nth(id.0)
            .ok_or_else(|| StreamError::OpenFailed(format!("no device with index {}", id.0)))
    }
}

impl Default for CpalBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamBackend for CpalBackend {
    fn open_input(
        &self,
        device: DeviceId,
        spec: StreamSpec,
        mut on_block: BlockCallback,
    ) -> Result<Box<dyn StreamControl>, StreamError> {
        let device = self.device(device)?;
        let supported = device
            .default_input_config()
            .map_err(|e| StreamError::OpenFailed(e.to_string()))?;

        // Mono capture devices are opened as mono; the engine duplicates them.
        let channels = spec.channels.min(supported.channels()).max(1);
        let config = stream_config(channels, spec.timing, supported.buffer_size());
        let mut framer = BlockFramer::new(spec.timing.block_size, channels);

        let stream = match supported.sample_format() {
            SampleFormat::F32 => device.build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    framer.push(data, &mut on_block);
                },
                log_capture_error,
                None,
            ),
            SampleFormat::I16 => {
                let mut scratch = Vec::with_capacity(framer.block_len());
                device.build_input_stream(
                    &config,
                    move |data: &[i16], _: &cpal::InputCallbackInfo| {
                        scratch.clear();
                        scratch.extend(data.iter().map(|&s| f32::from(s) / I16_SCALE));
                        framer.push(&scratch, &mut on_block);
                    },
                    log_capture_error,
                    None,
                )
            }
            format => {
                return Err(StreamError::OpenFailed(format!(
                    "unsupported sample format: {format:?}"
                )));
            }
        }
        .map_err(|e| StreamError::OpenFailed(e.to_string()))?;

        Ok(Box::new(CpalStream::new(stream)))
    }

    fn open_output(
        &self,
        device: DeviceId,
        spec: StreamSpec,
    ) -> Result<RenderStream, StreamError> {
        let device = self.device(device)?;
        let supported = device
            .default_output_config()
            .map_err(|e| StreamError::OpenFailed(e.to_string()))?;

        let config = stream_config(spec.channels, spec.timing, supported.buffer_size());
        let capacity =
            spec.timing.block_size.max(1) * usize::from(spec.channels) * OUTPUT_QUEUE_BLOCKS;
        let (producer, mut consumer) = HeapRb::<f32>::new(capacity).split();

        let stream = match supported.sample_format() {
            SampleFormat::F32 => device.build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    let filled = consumer.pop_slice(data);
                    data[filled..].fill(0.0);
                },
                log_render_error,
                None,
            ),
            SampleFormat::I16 => device.build_output_stream(
                &config,
                move |data: &mut [i16], _: &cpal::OutputCallbackInfo| {
                    for sample in data.iter_mut() {
                        *sample = consumer.try_pop().map_or(0, |s| {
                            (s * I16_SCALE).clamp(I16_MIN_F32, I16_SCALE) as i16
                        });
                    }
                },
                log_render_error,
                None,
            ),
            format => {
                return Err(StreamError::OpenFailed(format!(
                    "unsupported sample format: {format:?}"
                )));
            }
        }
        .map_err(|e| StreamError::OpenFailed(e.to_string()))?;

        Ok(RenderStream {
            control: Box::new(CpalStream::new(stream)),
            writer: Box::new(CpalWriter { producer }),
        })
    }
}

fn stream_config(
    channels: u16,
    timing: BlockTiming,
    supported: &SupportedBufferSize,
) -> CpalStreamConfig {
    let frames = u32::try_from(timing.block_size).unwrap_or(u32::MAX);
    let buffer_size = match supported {
        SupportedBufferSize::Range { min, max } if (*min..=*max).contains(&frames) => {
            BufferSize::Fixed(frames)
        }
        _ => BufferSize::Default,
    };
    CpalStreamConfig {
        channels,
        sample_rate: SampleRate(timing.sample_rate),
        buffer_size,
    }
}

fn max_channels<I, E>(configs: Result<I, E>) -> u16
where
    I: Iterator<Item = cpal::SupportedStreamConfigRange>,
{
    configs
        .map(|ranges| ranges.map(|range| range.channels()).max().unwrap_or(0))
        .unwrap_or(0)
}

fn log_capture_error(err: cpal::StreamError) {
    tracing::error!("Capture stream error: {}", err);
}

fn log_render_error(err: cpal::StreamError) {
    tracing::error!("Render stream error: {}", err);
}

/// Lifecycle handle around a CPAL stream.
///
/// Closing drops the stream, which stops its callback thread.
struct CpalStream {
    stream: Option<Stream>,
}

impl CpalStream {
    fn new(stream: Stream) -> Self {
        Self {
            stream: Some(stream),
        }
    }

    fn stream(&self) -> Result<&Stream, StreamError> {
        self.stream.as_ref().ok_or(StreamError::Closed)
    }
}

impl StreamControl for CpalStream {
    fn start(&mut self) -> Result<(), StreamError> {
        self.stream()?
            .play()
            .map_err(|e| StreamError::StartFailed(e.to_string()))
    }

    fn stop(&mut self) -> Result<(), StreamError> {
        self.stream()?
            .pause()
            .map_err(|e| StreamError::StopFailed(e.to_string()))
    }

    fn close(&mut self) -> Result<(), StreamError> {
        drop(self.stream.take());
        Ok(())
    }
}

struct CpalWriter {
    producer: ringbuf::HeapProd<f32>,
}

impl BlockWriter for CpalWriter {
    fn write(&mut self, frames: &[f32]) -> Result<(), StreamError> {
        if self.producer.vacant_len() < frames.len() {
            return Err(StreamError::write_failed("render queue full"));
        }
        let _ = self.producer.push_slice(frames);
        Ok(())
    }
}

/// Re-frames arbitrarily sized interleaved buffers into fixed-size blocks.
///
/// The internal buffer is allocated once; pushing never allocates.
#[derive(Debug)]
pub struct BlockFramer {
    buffer: Vec<f32>,
    block_len: usize,
    channels: u16,
}

impl BlockFramer {
    /// Creates a framer emitting blocks of `block_size` frames of `channels`
    /// interleaved samples.
    pub fn new(block_size: usize, channels: u16) -> Self {
        let channels = channels.max(1);
        let block_len = block_size.max(1) * usize::from(channels);
        Self {
            buffer: Vec::with_capacity(block_len),
            block_len,
            channels,
        }
    }

    /// Samples per emitted block (frames times channels).
    pub fn block_len(&self) -> usize {
        self.block_len
    }

    /// Frames buffered towards the next block.
    pub fn pending_frames(&self) -> usize {
        self.buffer.len() / usize::from(self.channels)
    }

    /// Appends `data`, calling `on_block` for every block completed.
    pub fn push<F>(&mut self, mut data: &[f32], mut on_block: F)
    where
        F: FnMut(&[f32], u16),
    {
        while !data.is_empty() {
            let take = (self.block_len - self.buffer.len()).min(data.len());
            self.buffer.extend_from_slice(&data[..take]);
            data = &data[take..];
            if self.buffer.len() == self.block_len {
                on_block(&self.buffer, self.channels);
                self.buffer.clear();
            }
        }
    }
}
