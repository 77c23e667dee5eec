//! Additive white noise, mostly used to simulate a noisy channel.

use rand::{
    Rng,
    SeedableRng,
    distributions::{
        Distribution,
        Uniform,
    },
    rngs::SmallRng,
};

use crate::sample::{
    FromSample,
    IntoSample,
};

#[derive(Clone, Debug)]
pub struct Noise<R, D> {
    rng: R,
    distribution: D,
}

impl<R, D> Noise<R, D> {
    #[inline]
    pub fn new(rng: R, distribution: D) -> Self {
        Self { rng, distribution }
    }
}

impl<R, D> Noise<R, D>
where
    R: Rng,
    D: Distribution<f32>,
{
    #[inline]
    pub fn sample(&mut self) -> f32 {
        self.rng.sample(&self.distribution)
    }

    /// Adds noise to PCM samples in place, saturating at full scale.
    pub fn add_to(&mut self, samples: &mut [i16]) {
        for sample in samples {
            let x = f32::from_sample(*sample) + self.sample();
            *sample = x.into_sample();
        }
    }
}

/// Uniform noise in `[-amplitude, amplitude]` (normalized full scale).
///
/// # Panics
///
/// If `amplitude` is not finite.
pub fn white_noise(amplitude: f32) -> Noise<SmallRng, Uniform<f32>> {
    Noise::new(SmallRng::from_entropy(), distribution(amplitude))
}

/// Like [`white_noise`], but reproducible.
///
/// # Panics
///
/// If `amplitude` is not finite.
pub fn seeded_white_noise(amplitude: f32, seed: u64) -> Noise<SmallRng, Uniform<f32>> {
    Noise::new(SmallRng::seed_from_u64(seed), distribution(amplitude))
}

fn distribution(amplitude: f32) -> Uniform<f32> {
    let amplitude = amplitude.abs();
    Uniform::new_inclusive(-amplitude, amplitude)
}
