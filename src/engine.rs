//! The audio engine: one capture stream feeding two delayed render streams.

use std::sync::Arc;

use crate::backend::{BlockWriter, RenderStream, StreamBackend, StreamControl, StreamSpec};
use crate::config::{BlockTiming, ChannelMapping, Destination, EngineConfig};
use crate::pipeline::{clamp_delay_ms, sanitize_gain, ParameterSet, Router};
use crate::stats::EngineCounters;
use crate::{
    event_callback, EngineEvent, EngineStats, EventCallback, SplitAudioError, StopFailure,
    StreamError, StreamRole,
};

/// Whether the engine's streams are live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EngineStatus {
    /// No streams are open.
    #[default]
    Stopped,
    /// Capture and both render streams are open and started.
    Running,
}

/// The three streams of a running engine.
struct ActiveStreams {
    capture: Box<dyn StreamControl>,
    renders: [Box<dyn StreamControl>; 2],
}

/// Routes one captured stereo input to two render devices, each with its own
/// delay and gain, with an optional left/right swap.
///
/// # Threads
///
/// The backend calls the capture handler on its audio thread once per block.
/// [`update`](Self::update) and [`update_mapping`](Self::update_mapping) may
/// be called from any thread at any time; they only hold the routing lock long
/// enough to assign fields or swap in a pre-built delay line.
///
/// # Lifecycle
///
/// `Stopped → Running` on a successful [`start`](Self::start);
/// `Running → Stopped` on [`stop`](Self::stop), on drop, or when `start`
/// fails. A failed `start` closes every stream it opened before returning.
///
/// # Example
///
/// ```
/// use split_audio::backend::MockBackend;
/// use split_audio::{AudioEngine, ChannelMapping, DeviceId, EngineConfig, EngineStatus};
///
/// let mut engine = AudioEngine::new(MockBackend::new())
///     .on_event(|event| println!("{event:?}"));
///
/// engine.start(&EngineConfig {
///     input: DeviceId(0),
///     outputs: [DeviceId(1), DeviceId(2)],
///     ..Default::default()
/// })?;
/// assert_eq!(engine.status(), EngineStatus::Running);
///
/// engine.update(0.0, 120.0, 1.0, 0.8);
/// engine.update_mapping(ChannelMapping::Swapped);
///
/// engine.stop();
/// assert_eq!(engine.status(), EngineStatus::Stopped);
/// # Ok::<(), split_audio::SplitAudioError>(())
/// ```
pub struct AudioEngine<B: StreamBackend> {
    backend: B,
    router: Arc<Router>,
    counters: Arc<EngineCounters>,
    event_callback: Option<EventCallback>,
    streams: Option<ActiveStreams>,
}

impl<B: StreamBackend> AudioEngine<B> {
    /// Creates a stopped engine with default timing and parameters.
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            router: Arc::new(Router::new(ParameterSet::default(), BlockTiming::default())),
            counters: Arc::new(EngineCounters::new()),
            event_callback: None,
            streams: None,
        }
    }

    /// Sets a callback to receive runtime events.
    ///
    /// [`EngineEvent::BlockDropped`] is raised on the audio thread.
    #[must_use]
    pub fn on_event<F>(mut self, callback: F) -> Self
    where
        F: Fn(EngineEvent) + Send + Sync + 'static,
    {
        self.event_callback = Some(event_callback(callback));
        self
    }

    /// Returns the backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Returns whether the engine is running.
    pub fn status(&self) -> EngineStatus {
        if self.streams.is_some() {
            EngineStatus::Running
        } else {
            EngineStatus::Stopped
        }
    }

    /// Returns a copy of the live parameters.
    pub fn parameters(&self) -> ParameterSet {
        self.router.parameters()
    }

    /// Returns the current delay-line depth of each destination, in blocks.
    pub fn delay_depths(&self) -> [usize; 2] {
        self.router.depths()
    }

    /// Returns the timing of the current (or last) run.
    pub fn timing(&self) -> BlockTiming {
        self.router.timing()
    }

    /// Returns counters for the current (or last) run.
    pub fn stats(&self) -> EngineStats {
        self.counters.snapshot()
    }

    /// Opens and starts render stream 1, render stream 2, then the capture
    /// stream, so both outputs are ready before input flows.
    ///
    /// A running engine is stopped first. Delay lines start empty (silent);
    /// nothing queued by a previous run is carried over.
    ///
    /// # Errors
    ///
    /// - [`SplitAudioError::InvalidConfig`] if `config` fails validation
    /// - [`SplitAudioError::DeviceUnavailable`] if a device cannot be opened
    /// - [`SplitAudioError::OpenFailed`] if an opened stream cannot start
    ///
    /// On error every stream opened by this attempt has been closed and the
    /// engine is [`EngineStatus::Stopped`].
    pub fn start(&mut self, config: &EngineConfig) -> Result<(), SplitAudioError> {
        if self.streams.is_some() {
            self.stop();
        }
        config.validate()?;

        self.router.reset(config.parameters, config.timing);
        self.counters.reset();
        let spec = StreamSpec::stereo(config.timing);

        let mut opened: Vec<(StreamRole, Box<dyn StreamControl>)> = Vec::with_capacity(3);
        let mut writers: Vec<Box<dyn BlockWriter>> = Vec::with_capacity(2);

        for destination in Destination::ALL {
            let role = StreamRole::Render(destination);
            let device = config.output(destination);
            match self.backend.open_output(device, spec) {
                Ok(RenderStream { control, writer }) => {
                    opened.push((role, control));
                    writers.push(writer);
                }
                Err(e) => {
                    abandon(opened);
                    return Err(SplitAudioError::DeviceUnavailable {
                        role,
                        device,
                        reason: e.to_string(),
                    });
                }
            }
        }

        let Ok([first, second]) = <[Box<dyn BlockWriter>; 2]>::try_from(writers) else {
            abandon(opened);
            return Err(SplitAudioError::BackendError(
                "render streams did not yield two writers".to_string(),
            ));
        };
        let mut handler = CaptureHandler::new(
            Arc::clone(&self.router),
            [first, second],
            Arc::clone(&self.counters),
            self.event_callback.clone(),
            config.timing,
        );
        match self.backend.open_input(
            config.input,
            spec,
            Box::new(move |frames: &[f32], channels: u16| handler.on_block(frames, channels)),
        ) {
            Ok(control) => opened.push((StreamRole::Capture, control)),
            Err(e) => {
                abandon(opened);
                return Err(SplitAudioError::DeviceUnavailable {
                    role: StreamRole::Capture,
                    device: config.input,
                    reason: e.to_string(),
                });
            }
        }

        let mut start_failure = None;
        for (role, control) in &mut opened {
            if let Err(e) = control.start() {
                start_failure = Some((*role, e));
                break;
            }
        }
        if let Some((role, e)) = start_failure {
            abandon(opened);
            return Err(SplitAudioError::OpenFailed {
                role,
                reason: e.to_string(),
            });
        }

        let mut opened = opened.into_iter().map(|(_, control)| control);
        let (Some(first), Some(second), Some(capture)) =
            (opened.next(), opened.next(), opened.next())
        else {
            return Err(SplitAudioError::BackendError(
                "engine did not open three streams".to_string(),
            ));
        };
        self.streams = Some(ActiveStreams {
            capture,
            renders: [first, second],
        });

        let depths = self.router.depths();
        tracing::info!(
            input = %config.input,
            out1 = %config.outputs[0],
            out2 = %config.outputs[1],
            sample_rate = config.timing.sample_rate,
            block_size = config.timing.block_size,
            depth1 = depths[0],
            depth2 = depths[1],
            "Audio engine started"
        );
        self.emit_event(EngineEvent::Started);
        Ok(())
    }

    /// Stops and closes the capture stream, then both render streams.
    ///
    /// Every stream is stopped and closed even if an earlier one fails. The
    /// failures are logged, reported as [`EngineEvent::StopFailed`] and
    /// returned. Calling `stop` on a stopped engine does nothing.
    pub fn stop(&mut self) -> Vec<StopFailure> {
        let Some(streams) = self.streams.take() else {
            return Vec::new();
        };
        let ActiveStreams {
            capture,
            renders: [first, second],
        } = streams;

        let mut failures = Vec::new();
        for (role, mut control) in [
            (StreamRole::Capture, capture),
            (StreamRole::Render(Destination::First), first),
            (StreamRole::Render(Destination::Second), second),
        ] {
            if let Err(error) = control.stop() {
                failures.push(StopFailure { role, error });
            }
            if let Err(error) = control.close() {
                failures.push(StopFailure { role, error });
            }
        }

        for failure in &failures {
            tracing::warn!(role = %failure.role, error = %failure.error, "Stream did not shut down cleanly");
            self.emit_event(EngineEvent::StopFailed {
                role: failure.role,
                error: failure.error.clone(),
            });
        }

        let stats = self.counters.snapshot();
        tracing::info!(
            blocks = stats.blocks_processed,
            dropped1 = stats.blocks_dropped[0],
            dropped2 = stats.blocks_dropped[1],
            "Audio engine stopped"
        );
        self.emit_event(EngineEvent::Stopped);
        failures
    }

    /// Sets both delays (ms) and gains (linear).
    ///
    /// A delay line is rebuilt, silent, only if its depth in blocks changes.
    /// Gains apply to blocks captured after this call; blocks already queued
    /// keep the gain they were captured with. Safe to call while running.
    ///
    /// Values [`EngineConfig::validate`] would reject are clamped instead:
    /// delays into `0..=MAX_DELAY_MS` (NaN as 0) and non-finite gains to 0.
    pub fn update(&self, delay_ms1: f64, delay_ms2: f64, gain1: f32, gain2: f32) {
        let requested_delay = [delay_ms1, delay_ms2];
        let requested_gain = [gain1, gain2];
        let delay_ms = requested_delay.map(clamp_delay_ms);
        let gain = requested_gain.map(sanitize_gain);
        if delay_ms != requested_delay || gain != requested_gain {
            tracing::warn!(
                ?requested_delay,
                ?requested_gain,
                ?delay_ms,
                ?gain,
                "Out-of-range parameters clamped"
            );
        }

        let resizes = self.router.update(delay_ms, gain);
        for resize in resizes {
            tracing::debug!(
                destination = %resize.destination,
                from = resize.from_blocks,
                to = resize.to_blocks,
                "Delay line resized"
            );
            self.emit_event(EngineEvent::DelayResized {
                destination: resize.destination,
                from_blocks: resize.from_blocks,
                to_blocks: resize.to_blocks,
            });
        }
    }

    /// Sets the left/right channel mapping.
    pub fn update_mapping(&self, mapping: ChannelMapping) {
        tracing::debug!(?mapping, "Channel mapping changed");
        self.router.update_mapping(mapping);
    }

    fn emit_event(&self, event: EngineEvent) {
        if let Some(ref callback) = self.event_callback {
            callback(event);
        }
    }
}

impl<B: StreamBackend> Drop for AudioEngine<B> {
    fn drop(&mut self) {
        if self.streams.is_some() {
            // Dropped without explicit stop()
            self.stop();
        }
    }
}

/// Best-effort teardown of streams opened by a failed `start`.
fn abandon(opened: Vec<(StreamRole, Box<dyn StreamControl>)>) {
    for (role, mut control) in opened {
        if let Err(e) = control.stop() {
            tracing::debug!(%role, error = %e, "Stop during rollback failed");
        }
        if let Err(e) = control.close() {
            tracing::warn!(%role, error = %e, "Close during rollback failed");
        }
    }
}

/// Runs on the backend's audio thread, once per captured block.
struct CaptureHandler {
    router: Arc<Router>,
    writers: [Box<dyn BlockWriter>; 2],
    counters: Arc<EngineCounters>,
    event_callback: Option<EventCallback>,
    stereo: Vec<f32>,
}

impl CaptureHandler {
    fn new(
        router: Arc<Router>,
        writers: [Box<dyn BlockWriter>; 2],
        counters: Arc<EngineCounters>,
        event_callback: Option<EventCallback>,
        timing: BlockTiming,
    ) -> Self {
        Self {
            router,
            writers,
            counters,
            event_callback,
            stereo: Vec::with_capacity(timing.block_size * 2),
        }
    }

    fn on_block(&mut self, frames: &[f32], channels: u16) {
        let Some(outputs) = self.router.process(frames, channels) else {
            return;
        };
        self.counters.record_processed();

        for (destination, block) in Destination::ALL.into_iter().zip(outputs) {
            block.write_stereo(&mut self.stereo);
            match self.writers[destination.index()].write(&self.stereo) {
                Ok(()) => self.counters.record_written(destination),
                Err(error) => self.drop_block(destination, error),
            }
        }
    }

    fn drop_block(&self, destination: Destination, error: StreamError) {
        self.counters.record_dropped(destination);
        if let Some(ref callback) = self.event_callback {
            callback(EngineEvent::BlockDropped { destination, error });
        }
    }
}
