//! Fixed-depth block delay.

use ringbuf::traits::{Consumer, Observer, Producer, RingBuffer};
use ringbuf::HeapRb;

use crate::AudioBlock;

/// A FIFO of [`AudioBlock`]s that delays its input by exactly `depth` blocks.
///
/// The line starts with `depth` silent blocks and its ring holds exactly
/// `depth` entries. Once full, every [`push`](Self::push) evicts the oldest
/// block, so the length stays at `depth` and the output latency is
/// `depth * block_size / sample_rate`. The engine uses
/// [`advance`](Self::advance), which returns the evicted block as output.
pub struct DelayLine {
    queue: HeapRb<AudioBlock>,
    depth: usize,
    block_size: usize,
}

impl DelayLine {
    /// Creates a line pre-filled with `depth` silent blocks of `block_size`
    /// samples. A depth of zero is treated as one.
    pub fn new(depth: usize, block_size: usize) -> Self {
        let depth = depth.max(1);
        let mut queue = HeapRb::new(depth);
        for _ in 0..depth {
            let _ = queue.try_push(AudioBlock::silence(block_size));
        }
        Self {
            queue,
            depth,
            block_size,
        }
    }

    /// Number of blocks of delay.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Samples per silent block.
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Number of blocks currently queued.
    pub fn len(&self) -> usize {
        self.queue.occupied_len()
    }

    /// Returns `true` if no blocks are queued.
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Appends `block`. If the line already holds `depth` blocks the oldest is
    /// removed first and returned.
    pub fn push(&mut self, block: AudioBlock) -> Option<AudioBlock> {
        self.queue.push_overwrite(block)
    }

    /// Removes and returns the oldest block.
    ///
    /// An empty line yields silence rather than nothing, so a render stream
    /// always receives a full block.
    pub fn pop_oldest(&mut self) -> AudioBlock {
        self.queue
            .try_pop()
            .unwrap_or_else(|| AudioBlock::silence(self.block_size))
    }

    /// Pushes `block` and returns the block it evicted, which has been delayed
    /// by `depth` block periods.
    ///
    /// If the line is short (blocks were popped), nothing is evicted and the
    /// output is silence until the line refills to `depth`.
    pub fn advance(&mut self, block: AudioBlock) -> AudioBlock {
        let block_size = self.block_size;
        self.push(block)
            .unwrap_or_else(|| AudioBlock::silence(block_size))
    }

    /// Discards everything queued and refills with `new_depth` silent blocks.
    ///
    /// This is an audible discontinuity; queued audio is not carried over.
    pub fn resize(&mut self, new_depth: usize) {
        *self = Self::new(new_depth, self.block_size);
    }
}

impl std::fmt::Debug for DelayLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DelayLine")
            .field("depth", &self.depth)
            .field("block_size", &self.block_size)
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn marker(value: f32) -> AudioBlock {
        AudioBlock::from_slice(&[value; 4])
    }

    #[test]
    fn test_new_is_prefilled_with_silence() {
        let mut line = DelayLine::new(3, 4);
        assert_eq!(line.len(), 3);
        for _ in 0..3 {
            let block = line.pop_oldest();
            assert_eq!(block.len(), 4);
            assert!(block.is_silent());
        }
        assert!(line.is_empty());
    }

    #[test]
    fn test_zero_depth_clamped_to_one() {
        let line = DelayLine::new(0, 4);
        assert_eq!(line.depth(), 1);
        assert_eq!(line.len(), 1);
    }

    #[test]
    fn test_fifo_order_with_paired_push_pop() {
        let depth = 4;
        let mut line = DelayLine::new(depth, 4);
        let mut outputs = Vec::new();

        for i in 1..=depth {
            outputs.push(line.advance(marker(i as f32)));
            assert_eq!(line.len(), depth);
        }
        for _ in 0..depth {
            outputs.push(line.advance(AudioBlock::silence(4)));
        }

        assert!(outputs[..depth].iter().all(AudioBlock::is_silent));
        for i in 1..=depth {
            assert_eq!(outputs[depth + i - 1], marker(i as f32));
        }
    }

    #[test]
    fn test_push_keeps_length_at_depth() {
        let mut line = DelayLine::new(2, 4);

        let evicted = line.push(marker(1.0)).unwrap();
        assert!(evicted.is_silent());
        assert_eq!(line.len(), line.depth());

        assert!(line.push(marker(2.0)).unwrap().is_silent());
        assert_eq!(line.push(marker(3.0)), Some(marker(1.0)));
        assert_eq!(line.len(), 2);

        assert_eq!(line.pop_oldest(), marker(2.0));
        assert_eq!(line.pop_oldest(), marker(3.0));
    }

    #[test]
    fn test_push_into_short_line_evicts_nothing() {
        let mut line = DelayLine::new(2, 4);
        let _ = line.pop_oldest();

        assert_eq!(line.push(marker(1.0)), None);
        assert_eq!(line.len(), 2);
        assert!(line.advance(marker(2.0)).is_silent());
        assert_eq!(line.advance(marker(3.0)), marker(1.0));
    }

    #[test]
    fn test_pop_from_empty_line_is_silence() {
        let mut line = DelayLine::new(1, 8);
        let _ = line.pop_oldest();
        let block = line.pop_oldest();
        assert_eq!(block.len(), 8);
        assert!(block.is_silent());
    }

    #[test]
    fn test_resize_discards_contents() {
        let mut line = DelayLine::new(2, 4);
        line.advance(marker(1.0));
        line.advance(marker(2.0));

        line.resize(5);

        assert_eq!(line.depth(), 5);
        assert_eq!(line.len(), 5);
        for _ in 0..5 {
            assert!(line.advance(marker(3.0)).is_silent());
        }
        assert_eq!(line.advance(marker(4.0)), marker(3.0));
    }

    #[test]
    fn test_debug_output() {
        let line = DelayLine::new(2, 16);
        let debug = format!("{line:?}");
        assert!(debug.contains("depth: 2"));
        assert!(debug.contains("block_size: 16"));
    }
}
