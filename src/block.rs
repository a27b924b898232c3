//! One channel of audio for one block period.

/// An immutable buffer of mono `f32` samples covering one block period.
///
/// Blocks are always built from a copy of the captured data, so they never
/// alias a buffer owned by the audio backend.
///
/// # Example
///
/// ```
/// use split_audio::AudioBlock;
///
/// let block = AudioBlock::scaled(&[0.5, -0.5], 2.0);
/// assert_eq!(block.samples(), &[1.0, -1.0]);
///
/// let mut stereo = Vec::new();
/// block.write_stereo(&mut stereo);
/// assert_eq!(stereo, vec![1.0, 1.0, -1.0, -1.0]);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBlock {
    samples: Box<[f32]>,
}

impl AudioBlock {
    /// Creates a block of `len` zero samples.
    pub fn silence(len: usize) -> Self {
        Self {
            samples: vec![0.0; len].into_boxed_slice(),
        }
    }

    /// Creates a block holding a copy of `samples`.
    pub fn from_slice(samples: &[f32]) -> Self {
        Self {
            samples: samples.into(),
        }
    }

    /// Creates a block holding `samples` multiplied by `gain`.
    ///
    /// No clipping is applied; gains above 1.0 can produce samples outside
    /// `[-1.0, 1.0]`.
    pub fn scaled(samples: &[f32], gain: f32) -> Self {
        Self::from_iter_scaled(samples.iter().copied(), gain)
    }

    /// Collects an iterator of samples, multiplying each by `gain`.
    pub(crate) fn from_iter_scaled(samples: impl Iterator<Item = f32>, gain: f32) -> Self {
        Self {
            samples: samples.map(|s| s * gain).collect(),
        }
    }

    /// Returns the samples.
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Returns the number of samples (frames).
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Returns `true` if this block contains no samples.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Returns `true` if every sample is exactly zero.
    pub fn is_silent(&self) -> bool {
        self.samples.iter().all(|&s| s == 0.0)
    }

    /// Writes this mono block into `out` as interleaved stereo, the same
    /// signal on both channels.
    ///
    /// `out` is cleared first; its allocation is reused.
    pub fn write_stereo(&self, out: &mut Vec<f32>) {
        out.clear();
        out.reserve(self.samples.len() * 2);
        for &sample in self.samples.iter() {
            out.push(sample);
            out.push(sample);
        }
    }
}
