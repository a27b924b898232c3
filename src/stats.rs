//! Engine counters shared with the audio thread.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::config::Destination;

/// Statistics about the current (or last) engine run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineStats {
    /// Capture blocks routed to the delay lines.
    pub blocks_processed: u64,
    /// Blocks written to each render stream.
    pub blocks_written: [u64; 2],
    /// Blocks lost to write failures, per destination.
    pub blocks_dropped: [u64; 2],
}

impl EngineStats {
    /// Total blocks lost across both destinations.
    pub fn total_dropped(&self) -> u64 {
        self.blocks_dropped.iter().sum()
    }
}

/// Lock-free counters updated from the capture handler.
#[derive(Debug, Default)]
pub(crate) struct EngineCounters {
    blocks_processed: AtomicU64,
    blocks_written: [AtomicU64; 2],
    blocks_dropped: [AtomicU64; 2],
}

impl EngineCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_processed(&self) {
        self.blocks_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_written(&self, destination: Destination) {
        self.blocks_written[destination.index()].fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped(&self, destination: Destination) {
        self.blocks_dropped[destination.index()].fetch_add(1, Ordering::Relaxed);
    }

    pub fn reset(&self) {
        self.blocks_processed.store(0, Ordering::Relaxed);
        for counter in self.blocks_written.iter().chain(&self.blocks_dropped) {
            counter.store(0, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> EngineStats {
        EngineStats {
            blocks_processed: self.blocks_processed.load(Ordering::Relaxed),
            blocks_written: [
                self.blocks_written[0].load(Ordering::Relaxed),
                self.blocks_written[1].load(Ordering::Relaxed),
            ],
            blocks_dropped: [
                self.blocks_dropped[0].load(Ordering::Relaxed),
                self.blocks_dropped[1].load(Ordering::Relaxed),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_start_at_zero() {
        let counters = EngineCounters::new();
        assert_eq!(counters.snapshot(), EngineStats::default());
    }

    #[test]
    fn test_record_and_reset() {
        let counters = EngineCounters::new();
        counters.record_processed();
        counters.record_written(Destination::First);
        counters.record_dropped(Destination::Second);
        counters.record_dropped(Destination::Second);

        let stats = counters.snapshot();
        assert_eq!(stats.blocks_processed, 1);
        assert_eq!(stats.blocks_written, [1, 0]);
        assert_eq!(stats.blocks_dropped, [0, 2]);
        assert_eq!(stats.total_dropped(), 2);

        counters.reset();
        assert_eq!(counters.snapshot(), EngineStats::default());
    }
}
