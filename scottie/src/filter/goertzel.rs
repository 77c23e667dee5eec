use std::f32::consts::TAU;

/// Single-bin DFT over a block of samples.
///
/// Unlike an FFT this only evaluates one frequency, which is all a tone
/// detector needs.
#[derive(Clone, Copy, Debug)]
pub struct Goertzel {
    frequency: f32,
    sample_rate: f32,
    coefficient: f32,
}

impl Goertzel {
    pub fn new(sample_rate: f32, frequency: f32) -> Self {
        Self {
            frequency,
            sample_rate,
            coefficient: 2.0 * (TAU * frequency / sample_rate).cos(),
        }
    }

    #[inline]
    pub fn frequency(&self) -> f32 {
        self.frequency
    }

    #[inline]
    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    #[inline]
    fn run(&self, samples: &[f32]) -> (f32, f32) {
        let mut s1 = 0.0;
        let mut s2 = 0.0;
        for &x in samples {
            let s = x + self.coefficient * s1 - s2;
            s2 = s1;
            s1 = s;
        }
        (s1, s2)
    }

    /// Squared magnitude of the DFT bin.
    pub fn power(&self, samples: &[f32]) -> f32 {
        let (s1, s2) = self.run(samples);
        (s1 * s1 + s2 * s2 - self.coefficient * s1 * s2).max(0.0)
    }

    /// Magnitude normalized to the block length, so that a full-scale sine
    /// on the bin frequency measures about 1.0 regardless of window size.
    pub fn magnitude(&self, samples: &[f32]) -> f32 {
        if samples.is_empty() {
            0.0
        }
        else {
            2.0 * self.power(samples).sqrt() / samples.len() as f32
        }
    }
}
