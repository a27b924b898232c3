//! In-memory stream backend for testing without hardware.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;

use super::{BlockCallback, BlockWriter, RenderStream, StreamBackend, StreamControl, StreamSpec};
use crate::config::DeviceId;
use crate::StreamError;

/// Direction of a mock stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockStreamKind {
    /// Capture stream.
    Input,
    /// Render stream.
    Output,
}

/// A lifecycle call recorded by [`MockBackend`], in call order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockCall {
    /// `open_input` / `open_output` succeeded.
    Open(MockStreamKind, DeviceId),
    /// `start` was called.
    Start(MockStreamKind, DeviceId),
    /// `stop` was called.
    Stop(MockStreamKind, DeviceId),
    /// `close` was called.
    Close(MockStreamKind, DeviceId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Op {
    Open,
    Start,
    Stop,
    Close,
}

struct StreamEntry {
    started: bool,
    closed: bool,
}

struct CaptureSlot {
    stream_id: u64,
    callback: Option<BlockCallback>,
}

#[derive(Default)]
struct MockState {
    calls: Vec<MockCall>,
    failures: HashSet<(Op, MockStreamKind, DeviceId)>,
    failing_writes: HashSet<DeviceId>,
    streams: HashMap<u64, StreamEntry>,
    next_id: u64,
    capture: Option<CaptureSlot>,
    last_input_spec: Option<StreamSpec>,
    written: HashMap<DeviceId, Vec<Vec<f32>>>,
}

impl MockState {
    fn fails(&self, op: Op, kind: MockStreamKind, device: DeviceId) -> bool {
        self.failures.contains(&(op, kind, device))
    }

    fn register(&mut self, kind: MockStreamKind, device: DeviceId) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.streams.insert(
            id,
            StreamEntry {
                started: false,
                closed: false,
            },
        );
        self.calls.push(MockCall::Open(kind, device));
        id
    }
}

/// A [`StreamBackend`] that keeps everything in memory.
///
/// Clones share state, so a test can hand one clone to the
/// [`AudioEngine`](crate::AudioEngine) and keep another to drive the capture
/// callback and inspect what each render device received.
///
/// Output device ids should be distinct within a test; written blocks are
/// collected per device id.
///
/// # Example
///
/// ```
/// use split_audio::backend::MockBackend;
/// use split_audio::{AudioEngine, DeviceId, EngineConfig};
///
/// let backend = MockBackend::new();
/// let mut engine = AudioEngine::new(backend.clone());
/// engine
///     .start(&EngineConfig {
///         input: DeviceId(0),
///         outputs: [DeviceId(1), DeviceId(2)],
///         ..Default::default()
///     })
///     .unwrap();
///
/// // One block of interleaved stereo silence
/// assert!(backend.feed(&[0.0; 2048], 2));
/// assert_eq!(backend.written(DeviceId(1)).len(), 1);
/// ```
#[derive(Clone, Default)]
pub struct MockBackend {
    state: Arc<Mutex<MockState>>,
}

impl MockBackend {
    /// Creates a backend where every operation succeeds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes opening `device` as `kind` fail.
    pub fn fail_open(&self, kind: MockStreamKind, device: DeviceId) {
        self.state.lock().failures.insert((Op::Open, kind, device));
    }

    /// Makes starting `device` as `kind` fail.
    pub fn fail_start(&self, kind: MockStreamKind, device: DeviceId) {
        self.state.lock().failures.insert((Op::Start, kind, device));
    }

    /// Makes stopping `device` as `kind` fail.
    pub fn fail_stop(&self, kind: MockStreamKind, device: DeviceId) {
        self.state.lock().failures.insert((Op::Stop, kind, device));
    }

    /// Makes closing `device` as `kind` fail. The stream is still released.
    pub fn fail_close(&self, kind: MockStreamKind, device: DeviceId) {
        self.state.lock().failures.insert((Op::Close, kind, device));
    }

    /// Makes every write to `device` fail (`true`) or succeed (`false`).
    pub fn set_write_failure(&self, device: DeviceId, failing: bool) {
        let mut state = self.state.lock();
        if failing {
            state.failing_writes.insert(device);
        } else {
            state.failing_writes.remove(&device);
        }
    }

    /// Delivers one captured block to the capture callback, as the backend's
    /// audio thread would.
    ///
    /// Returns `false` if there is no started capture stream.
    pub fn feed(&self, frames: &[f32], channels: u16) -> bool {
        let (stream_id, mut callback) = {
            let mut state = self.state.lock();
            let Some(slot) = state.capture.as_ref() else {
                return false;
            };
            let stream_id = slot.stream_id;
            let running = state
                .streams
                .get(&stream_id)
                .is_some_and(|s| s.started && !s.closed);
            if !running {
                return false;
            }
            match state.capture.as_mut().and_then(|slot| slot.callback.take()) {
                Some(callback) => (stream_id, callback),
                None => return false,
            }
        };

        // Run without the lock: the handler writes to mock render streams.
        callback(frames, channels);

        let mut state = self.state.lock();
        if let Some(slot) = state.capture.as_mut() {
            if slot.stream_id == stream_id {
                slot.callback = Some(callback);
            }
        }
        true
    }

    /// Every lifecycle call so far, in order.
    pub fn calls(&self) -> Vec<MockCall> {
        self.state.lock().calls.clone()
    }

    /// Number of streams opened and not yet closed.
    pub fn open_stream_count(&self) -> usize {
        self.state
            .lock()
            .streams
            .values()
            .filter(|s| !s.closed)
            .count()
    }

    /// Blocks written to `device`, oldest first, as interleaved frames.
    pub fn written(&self, device: DeviceId) -> Vec<Vec<f32>> {
        self.state
            .lock()
            .written
            .get(&device)
            .cloned()
            .unwrap_or_default()
    }

    /// Format requested by the most recent `open_input`.
    pub fn last_input_spec(&self) -> Option<StreamSpec> {
        self.state.lock().last_input_spec
    }
}

impl StreamBackend for MockBackend {
    fn open_input(
        &self,
        device: DeviceId,
        spec: StreamSpec,
        on_block: BlockCallback,
    ) -> Result<Box<dyn StreamControl>, StreamError> {
        let mut state = self.state.lock();
        if state.fails(Op::Open, MockStreamKind::Input, device) {
            return Err(StreamError::OpenFailed(format!(
                "mock input device {device} unavailable"
            )));
        }
        let id = state.register(MockStreamKind::Input, device);
        state.capture = Some(CaptureSlot {
            stream_id: id,
            callback: Some(on_block),
        });
        state.last_input_spec = Some(spec);

        Ok(Box::new(MockStream {
            id,
            kind: MockStreamKind::Input,
            device,
            state: Arc::clone(&self.state),
        }))
    }

    fn open_output(
        &self,
        device: DeviceId,
        _spec: StreamSpec,
    ) -> Result<RenderStream, StreamError> {
        let mut state = self.state.lock();
        if state.fails(Op::Open, MockStreamKind::Output, device) {
            return Err(StreamError::OpenFailed(format!(
                "mock output device {device} unavailable"
            )));
        }
        let id = state.register(MockStreamKind::Output, device);

        Ok(RenderStream {
            control: Box::new(MockStream {
                id,
                kind: MockStreamKind::Output,
                device,
                state: Arc::clone(&self.state),
            }),
            writer: Box::new(MockWriter {
                id,
                device,
                state: Arc::clone(&self.state),
            }),
        })
    }
}

struct MockStream {
    id: u64,
    kind: MockStreamKind,
    device: DeviceId,
    state: Arc<Mutex<MockState>>,
}

impl StreamControl for MockStream {
    fn start(&mut self) -> Result<(), StreamError> {
        let mut state = self.state.lock();
        state.calls.push(MockCall::Start(self.kind, self.device));
        if state.fails(Op::Start, self.kind, self.device) {
            return Err(StreamError::StartFailed("injected failure".to_string()));
        }
        match state.streams.get_mut(&self.id) {
            Some(entry) if !entry.closed => {
                entry.started = true;
                Ok(())
            }
            _ => Err(StreamError::Closed),
        }
    }

    fn stop(&mut self) -> Result<(), StreamError> {
        let mut state = self.state.lock();
        state.calls.push(MockCall::Stop(self.kind, self.device));
        if state.fails(Op::Stop, self.kind, self.device) {
            return Err(StreamError::StopFailed("injected failure".to_string()));
        }
        if let Some(entry) = state.streams.get_mut(&self.id) {
            entry.started = false;
        }
        Ok(())
    }

    fn close(&mut self) -> Result<(), StreamError> {
        let mut state = self.state.lock();
        state.calls.push(MockCall::Close(self.kind, self.device));
        if let Some(entry) = state.streams.get_mut(&self.id) {
            entry.started = false;
            entry.closed = true;
        }
        let is_capture = state
            .capture
            .as_ref()
            .is_some_and(|slot| slot.stream_id == self.id);
        if is_capture {
            state.capture = None;
        }
        if state.fails(Op::Close, self.kind, self.device) {
            return Err(StreamError::CloseFailed("injected failure".to_string()));
        }
        Ok(())
    }
}

struct MockWriter {
    id: u64,
    device: DeviceId,
    state: Arc<Mutex<MockState>>,
}

impl BlockWriter for MockWriter {
    fn write(&mut self, frames: &[f32]) -> Result<(), StreamError> {
        let mut state = self.state.lock();
        if state.failing_writes.contains(&self.device) {
            return Err(StreamError::write_failed("injected failure"));
        }
        let started = state
            .streams
            .get(&self.id)
            .is_some_and(|s| s.started && !s.closed);
        if !started {
            return Err(StreamError::write_failed("stream not started"));
        }
        state
            .written
            .entry(self.device)
            .or_default()
            .push(frames.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BlockTiming;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn spec() -> StreamSpec {
        StreamSpec::stereo(BlockTiming::default())
    }

    #[test]
    fn test_feed_requires_started_capture() {
        let backend = MockBackend::new();
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = Arc::clone(&count);

        assert!(!backend.feed(&[0.0; 4], 2));

        let mut input = backend
            .open_input(
                DeviceId(0),
                spec(),
                Box::new(move |_: &[f32], _: u16| {
                    count_clone.fetch_add(1, Ordering::SeqCst);
                }),
            )
            .unwrap();
        assert!(!backend.feed(&[0.0; 4], 2));

        input.start().unwrap();
        assert!(backend.feed(&[0.0; 4], 2));
        assert!(backend.feed(&[0.0; 4], 2));
        assert_eq!(count.load(Ordering::SeqCst), 2);

        input.close().unwrap();
        assert!(!backend.feed(&[0.0; 4], 2));
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_writer_records_blocks() {
        let backend = MockBackend::new();
        let mut output = backend.open_output(DeviceId(3), spec()).unwrap();

        assert!(output.writer.write(&[1.0, 1.0]).is_err());

        output.control.start().unwrap();
        output.writer.write(&[1.0, 1.0]).unwrap();
        output.writer.write(&[2.0, 2.0]).unwrap();

        assert_eq!(
            backend.written(DeviceId(3)),
            vec![vec![1.0, 1.0], vec![2.0, 2.0]]
        );
    }

    #[test]
    fn test_injected_write_failure() {
        let backend = MockBackend::new();
        let mut output = backend.open_output(DeviceId(1), spec()).unwrap();
        output.control.start().unwrap();

        backend.set_write_failure(DeviceId(1), true);
        assert!(matches!(
            output.writer.write(&[0.0, 0.0]),
            Err(StreamError::WriteFailed { .. })
        ));

        backend.set_write_failure(DeviceId(1), false);
        assert!(output.writer.write(&[0.0, 0.0]).is_ok());
    }

    #[test]
    fn test_injected_open_failure() {
        let backend = MockBackend::new();
        backend.fail_open(MockStreamKind::Output, DeviceId(9));
        assert!(backend.open_output(DeviceId(9), spec()).is_err());
        assert!(backend.open_output(DeviceId(8), spec()).is_ok());
        assert_eq!(backend.open_stream_count(), 1);
    }

    #[test]
    fn test_calls_are_recorded_in_order() {
        let backend = MockBackend::new();
        let mut output = backend.open_output(DeviceId(1), spec()).unwrap();
        output.control.start().unwrap();
        output.control.stop().unwrap();
        output.control.close().unwrap();

        use MockStreamKind::Output;
        assert_eq!(
            backend.calls(),
            vec![
                MockCall::Open(Output, DeviceId(1)),
                MockCall::Start(Output, DeviceId(1)),
                MockCall::Stop(Output, DeviceId(1)),
                MockCall::Close(Output, DeviceId(1)),
            ]
        );
        assert_eq!(backend.open_stream_count(), 0);
    }

    #[test]
    fn test_failed_close_still_releases() {
        let backend = MockBackend::new();
        backend.fail_close(MockStreamKind::Output, DeviceId(1));
        let mut output = backend.open_output(DeviceId(1), spec()).unwrap();
        assert!(output.control.close().is_err());
        assert_eq!(backend.open_stream_count(), 0);
    }
}
