//! Live routing parameters and the delay-depth rule.

use crate::config::{BlockTiming, ChannelMapping, Destination};

/// Default per-destination delay in milliseconds (`delay1`, `delay2`).
pub const DEFAULT_DELAY_MS: [f64; 2] = [0.0, 50.0];

/// Default per-destination linear gain (`vol1`, `vol2`).
pub const DEFAULT_GAIN: [f32; 2] = [1.0, 1.0];

/// Longest supported per-destination delay in milliseconds.
pub const MAX_DELAY_MS: f64 = 2000.0;

/// Clamps a requested delay into `0..=MAX_DELAY_MS`. NaN becomes 0.
pub fn clamp_delay_ms(delay_ms: f64) -> f64 {
    if delay_ms.is_nan() {
        0.0
    } else {
        delay_ms.clamp(0.0, MAX_DELAY_MS)
    }
}

/// Replaces a non-finite gain with 0 (silence). Finite gains, including
/// negative ones, pass through.
pub fn sanitize_gain(gain: f32) -> f32 {
    if gain.is_finite() {
        gain
    } else {
        0.0
    }
}

/// Per-destination delay and gain plus the channel mapping.
///
/// The engine keeps one `ParameterSet` behind the routing lock and mutates it
/// field by field; the audio thread copies it out whole, so it never sees a
/// half-applied update.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParameterSet {
    delay_ms: [f64; 2],
    gain: [f32; 2],
    mapping: ChannelMapping,
}

impl ParameterSet {
    /// Creates a parameter set.
    pub fn new(delay_ms: [f64; 2], gain: [f32; 2], mapping: ChannelMapping) -> Self {
        Self {
            delay_ms,
            gain,
            mapping,
        }
    }

    /// Requested delay for `destination`, in milliseconds.
    pub fn delay_ms(&self, destination: Destination) -> f64 {
        self.delay_ms[destination.index()]
    }

    /// Linear gain for `destination`.
    pub fn gain(&self, destination: Destination) -> f32 {
        self.gain[destination.index()]
    }

    /// Channel mapping.
    pub fn mapping(&self) -> ChannelMapping {
        self.mapping
    }

    /// Sets the delay for `destination`.
    pub fn set_delay_ms(&mut self, destination: Destination, delay_ms: f64) {
        self.delay_ms[destination.index()] = delay_ms;
    }

    /// Sets the gain for `destination`.
    pub fn set_gain(&mut self, destination: Destination, gain: f32) {
        self.gain[destination.index()] = gain;
    }

    /// Sets the channel mapping.
    pub fn set_mapping(&mut self, mapping: ChannelMapping) {
        self.mapping = mapping;
    }

    /// Delay-line depth needed for `destination` at `timing`.
    pub fn depth(&self, destination: Destination, timing: BlockTiming) -> usize {
        delay_depth(self.delay_ms(destination), timing)
    }
}

impl Default for ParameterSet {
    fn default() -> Self {
        Self::new(DEFAULT_DELAY_MS, DEFAULT_GAIN, ChannelMapping::Normal)
    }
}

/// Number of whole blocks of delay for `delay_ms`.
///
/// The delay is floored to a sample count first, then floor-divided by the
/// block size, then clamped to at least one block. A 0 ms request therefore
/// still costs one block period of latency.
///
/// The delay is clamped with [`clamp_delay_ms`] first: negative or NaN delays
/// count as 0 ms and anything above [`MAX_DELAY_MS`] counts as the maximum.
///
/// # Example
///
/// ```
/// use split_audio::{delay_depth, BlockTiming};
///
/// let timing = BlockTiming { sample_rate: 44_100, block_size: 1024 };
/// assert_eq!(delay_depth(0.0, timing), 1);
/// assert_eq!(delay_depth(50.0, timing), 2);  // 2205 samples
/// assert_eq!(delay_depth(100.0, timing), 4); // 4410 samples
/// ```
pub fn delay_depth(delay_ms: f64, timing: BlockTiming) -> usize {
    let samples = ((clamp_delay_ms(delay_ms) / 1000.0) * f64::from(timing.sample_rate)).floor()
        as usize;
    samples
        .checked_div(timing.block_size)
        .unwrap_or(0)
        .max(1)
}
