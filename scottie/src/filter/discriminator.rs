//! Block frequency estimator for short windows.
//!
//! A sampled sinusoid satisfies `x[n - 1] + x[n + 1] = 2 cos(ω) x[n]`, so `ω`
//! follows from a least-squares fit over the window. This resolves frequency
//! from a handful of samples, where a DFT bin would be far too wide.
//!
//! If the signal was multiplied by a known envelope `g` (a taper), the
//! envelope is divided out of the neighbours and the fit is weighted by `g²`,
//! which keeps the estimate unbiased on ramps.

use std::{
    f32::consts::TAU,
    ops::Range,
};

/// Samples with less envelope gain than this are skipped. Dividing by smaller
/// gains mostly amplifies noise.
const GAIN_FLOOR: f32 = 0.1;

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Moments {
    /// `Σ x[n] (x[n - 1] + x[n + 1])`
    pub correlation: f32,
    /// `Σ x[n]²`
    pub energy: f32,
}

impl Moments {
    #[inline]
    pub fn cosine(&self) -> Option<f32> {
        (self.energy > 0.0).then(|| (self.correlation / (2.0 * self.energy)).clamp(-1.0, 1.0))
    }

    #[inline]
    pub fn frequency(&self, sample_rate: f32) -> Option<f32> {
        self.cosine().map(|cosine| cosine.acos() * sample_rate / TAU)
    }
}

#[derive(Clone, Copy, Debug)]
pub struct FrequencyDiscriminator {
    sample_rate: f32,
}

impl FrequencyDiscriminator {
    pub fn new(sample_rate: f32) -> Self {
        Self { sample_rate }
    }

    #[inline]
    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    /// Estimates the frequency over the whole window.
    pub fn estimate(&self, samples: &[f32]) -> Option<f32> {
        self.moments(samples, None, 0..samples.len())
            .frequency(self.sample_rate)
    }

    /// Accumulates the fit over `range` within `samples`.
    ///
    /// The first and last sample of `samples` only serve as neighbours. If
    /// given, `envelope` must be as long as `samples`.
    pub fn moments(&self, samples: &[f32], envelope: Option<&[f32]>, range: Range<usize>) -> Moments {
        let start = range.start.max(1);
        let end = range.end.min(samples.len().saturating_sub(1));

        let mut moments = Moments::default();

        for n in start..end {
            let x0 = samples[n - 1];
            let x1 = samples[n];
            let x2 = samples[n + 1];

            if let Some(envelope) = envelope {
                let g0 = envelope[n - 1];
                let g1 = envelope[n];
                let g2 = envelope[n + 1];
                if g0.min(g1).min(g2) < GAIN_FLOOR {
                    continue;
                }
                moments.correlation += g1 * x1 * (x0 / g0 + x2 / g2);
            }
            else {
                moments.correlation += x1 * (x0 + x2);
            }

            moments.energy += x1 * x1;
        }

        moments
    }
}
