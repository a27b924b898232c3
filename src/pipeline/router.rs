//! Routing state shared between the control thread and the audio thread.

use parking_lot::Mutex;

use crate::config::{BlockTiming, ChannelMapping, Destination};
use crate::pipeline::{DelayLine, ParameterSet};
use crate::AudioBlock;

/// A delay line whose depth changed during an update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Resize {
    pub destination: Destination,
    pub from_blocks: usize,
    pub to_blocks: usize,
}

struct RoutingState {
    parameters: ParameterSet,
    timing: BlockTiming,
    lines: [DelayLine; 2],
}

impl RoutingState {
    fn new(parameters: ParameterSet, timing: BlockTiming) -> Self {
        let lines = Destination::ALL.map(|destination| {
            DelayLine::new(parameters.depth(destination, timing), timing.block_size)
        });
        Self {
            parameters,
            timing,
            lines,
        }
    }
}

/// Splits captured frames into the two destinations and runs their delay
/// lines.
///
/// Every lock is held only for a field copy, a line swap, or one
/// push/pop pair. New delay lines are allocated and old ones dropped outside
/// the lock, and render-stream writes never happen under it.
pub(crate) struct Router {
    state: Mutex<RoutingState>,
}

impl Router {
    pub fn new(parameters: ParameterSet, timing: BlockTiming) -> Self {
        Self {
            state: Mutex::new(RoutingState::new(parameters, timing)),
        }
    }

    /// Replaces parameters, timing and both delay lines, e.g. on engine start.
    pub fn reset(&self, parameters: ParameterSet, timing: BlockTiming) {
        let fresh = RoutingState::new(parameters, timing);
        let _previous = std::mem::replace(&mut *self.state.lock(), fresh);
    }

    pub fn parameters(&self) -> ParameterSet {
        self.state.lock().parameters
    }

    pub fn timing(&self) -> BlockTiming {
        self.state.lock().timing
    }

    pub fn depths(&self) -> [usize; 2] {
        let state = self.state.lock();
        [state.lines[0].depth(), state.lines[1].depth()]
    }

    /// Overwrites delays and gains, rebuilding only the delay lines whose
    /// depth changes. Returns the lines that were rebuilt.
    pub fn update(&self, delay_ms: [f64; 2], gain: [f32; 2]) -> Vec<Resize> {
        let (timing, current) = {
            let state = self.state.lock();
            (state.timing, [state.lines[0].depth(), state.lines[1].depth()])
        };

        let mut replacements: [Option<DelayLine>; 2] = [None, None];
        let mut resizes = Vec::new();
        for destination in Destination::ALL {
            let i = destination.index();
            let depth = super::delay_depth(delay_ms[i], timing);
            if depth != current[i] {
                replacements[i] = Some(DelayLine::new(depth, timing.block_size));
                resizes.push(Resize {
                    destination,
                    from_blocks: current[i],
                    to_blocks: depth,
                });
            }
        }

        let mut retired: [Option<DelayLine>; 2] = [None, None];
        {
            let mut state = self.state.lock();
            for destination in Destination::ALL {
                let i = destination.index();
                state.parameters.set_delay_ms(destination, delay_ms[i]);
                state.parameters.set_gain(destination, gain[i]);
                if let Some(line) = replacements[i].take() {
                    retired[i] = Some(std::mem::replace(&mut state.lines[i], line));
                }
            }
        }
        drop(retired);

        resizes
    }

    pub fn update_mapping(&self, mapping: ChannelMapping) {
        self.state.lock().parameters.set_mapping(mapping);
    }

    /// Routes one captured block and returns the delayed block for each
    /// destination, or `None` if there is nothing to route.
    ///
    /// `frames` is interleaved with `channels` samples per frame.
    pub fn process(&self, frames: &[f32], channels: u16) -> Option<[AudioBlock; 2]> {
        if channels == 0 || frames.is_empty() {
            return None;
        }
        let parameters = self.parameters();
        let [first, second] = split_channels(frames, channels, &parameters);

        let mut state = self.state.lock();
        let first = state.lines[0].advance(first);
        let second = state.lines[1].advance(second);
        Some([first, second])
    }
}

/// Splits interleaved frames into the scaled mono block for each destination.
///
/// Mono input feeds the same signal to both destinations. Channels beyond the
/// second are ignored.
pub(crate) fn split_channels(
    frames: &[f32],
    channels: u16,
    parameters: &ParameterSet,
) -> [AudioBlock; 2] {
    let channels = usize::from(channels.max(1));
    let left = frames.chunks_exact(channels).map(|frame| frame[0]);
    let right = frames
        .chunks_exact(channels)
        .map(|frame| frame[frame.len().min(2) - 1]);

    let gain_first = parameters.gain(Destination::First);
    let gain_second = parameters.gain(Destination::Second);
    match parameters.mapping() {
        ChannelMapping::Normal => [
            AudioBlock::from_iter_scaled(left, gain_first),
            AudioBlock::from_iter_scaled(right, gain_second),
        ],
        ChannelMapping::Swapped => [
            AudioBlock::from_iter_scaled(right, gain_first),
            AudioBlock::from_iter_scaled(left, gain_second),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TIMING: BlockTiming = BlockTiming {
        sample_rate: 44_100,
        block_size: 4,
    };

    fn stereo(left: f32, right: f32, frames: usize) -> Vec<f32> {
        std::iter::repeat([left, right])
            .take(frames)
            .flatten()
            .collect()
    }

    #[test]
    fn test_split_normal_mapping() {
        let params = ParameterSet::new([0.0, 0.0], [0.5, 2.0], ChannelMapping::Normal);
        let [first, second] = split_channels(&stereo(1.0, -1.0, 4), 2, &params);
        assert_eq!(first.samples(), &[0.5; 4]);
        assert_eq!(second.samples(), &[-2.0; 4]);
    }

    #[test]
    fn test_split_swapped_mapping() {
        let params = ParameterSet::new([0.0, 0.0], [0.5, 2.0], ChannelMapping::Swapped);
        let [first, second] = split_channels(&stereo(1.0, -1.0, 4), 2, &params);
        assert_eq!(first.samples(), &[-0.5; 4]);
        assert_eq!(second.samples(), &[2.0; 4]);
    }

    #[test]
    fn test_split_mono_feeds_both() {
        let params = ParameterSet::new([0.0, 0.0], [1.0, 0.5], ChannelMapping::Swapped);
        let [first, second] = split_channels(&[0.2, 0.4, 0.6], 1, &params);
        assert_eq!(first.samples(), &[0.2, 0.4, 0.6]);
        assert_eq!(second.samples(), &[0.1, 0.2, 0.3]);
    }

    #[test]
    fn test_split_ignores_extra_channels() {
        let params = ParameterSet::new([0.0, 0.0], [1.0, 1.0], ChannelMapping::Normal);
        let [first, second] = split_channels(&[0.1, 0.2, 0.9, 0.3, 0.4, 0.9], 3, &params);
        assert_eq!(first.samples(), &[0.1, 0.3]);
        assert_eq!(second.samples(), &[0.2, 0.4]);
    }

    #[test]
    fn test_process_delays_by_depth() {
        // 0ms -> 1 block, 1ms at 44.1kHz -> 44 samples -> 11 blocks of 4
        let router = Router::new(
            ParameterSet::new([0.0, 1.0], [1.0, 1.0], ChannelMapping::Normal),
            TIMING,
        );
        assert_eq!(router.depths(), [1, 11]);

        let [first, second] = router.process(&stereo(1.0, 1.0, 4), 2).unwrap();
        assert!(first.is_silent());
        assert!(second.is_silent());

        let [first, _] = router.process(&stereo(0.0, 0.0, 4), 2).unwrap();
        assert_eq!(first.samples(), &[1.0; 4]);
    }

    #[test]
    fn test_process_rejects_empty_input() {
        let router = Router::new(ParameterSet::default(), TIMING);
        assert!(router.process(&[], 2).is_none());
        assert!(router.process(&[0.0; 8], 0).is_none());
    }

    #[test]
    fn test_update_resizes_only_changed_lines() {
        let router = Router::new(ParameterSet::default(), TIMING);
        let before = router.depths();

        // Same depth for destination 1, deeper line for destination 2.
        let resizes = router.update([0.01, 2.0], [0.7, 0.8]);

        assert_eq!(resizes.len(), 1);
        assert_eq!(resizes[0].destination, Destination::Second);
        assert_eq!(resizes[0].from_blocks, before[1]);
        assert_eq!(resizes[0].to_blocks, 22);
        assert_eq!(router.depths(), [1, 22]);

        let params = router.parameters();
        assert_eq!(params.gain(Destination::First), 0.7);
        assert_eq!(params.gain(Destination::Second), 0.8);
        assert_eq!(params.delay_ms(Destination::Second), 2.0);
    }

    #[test]
    fn test_unchanged_depth_keeps_queued_audio() {
        let router = Router::new(ParameterSet::default(), TIMING);
        router.process(&stereo(1.0, 1.0, 4), 2);

        // Gain change only: the queued block keeps its original gain.
        assert!(router.update([0.0, 50.0], [0.5, 1.0]).is_empty());
        let [first, _] = router.process(&stereo(1.0, 1.0, 4), 2).unwrap();
        assert_eq!(first.samples(), &[1.0; 4]);
        let [first, _] = router.process(&stereo(0.0, 0.0, 4), 2).unwrap();
        assert_eq!(first.samples(), &[0.5; 4]);
    }

    #[test]
    fn test_update_mapping() {
        let router = Router::new(ParameterSet::default(), TIMING);
        router.update_mapping(ChannelMapping::Swapped);
        assert_eq!(router.parameters().mapping(), ChannelMapping::Swapped);
    }

    #[test]
    fn test_reset_replaces_timing_and_lines() {
        let router = Router::new(ParameterSet::default(), TIMING);
        router.process(&stereo(1.0, 1.0, 4), 2);

        let timing = BlockTiming {
            sample_rate: 48_000,
            block_size: 480,
        };
        router.reset(ParameterSet::default(), timing);

        assert_eq!(router.timing(), timing);
        // 50ms at 48kHz -> 2400 samples -> 5 blocks of 480
        assert_eq!(router.depths(), [1, 5]);
        let [first, _] = router.process(&stereo(0.0, 0.0, 480), 2).unwrap();
        assert_eq!(first.len(), 480);
        assert!(first.is_silent());
    }
}
