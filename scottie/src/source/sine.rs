use std::f32::consts::TAU;

#[inline]
fn step_from_frequency_and_sample_rate(frequency: f32, sample_rate: f32) -> f32 {
    (TAU * frequency / sample_rate).rem_euclid(TAU)
}

/// Running oscillator phase in `[0, 2π)`.
///
/// The phase is carried across tone and frequency changes so that
/// concatenated segments have no discontinuity.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PhaseAccumulator {
    phase: f32,
}

impl PhaseAccumulator {
    #[inline]
    pub fn new(phase: f32) -> Self {
        Self {
            phase: phase.rem_euclid(TAU),
        }
    }

    #[inline]
    pub fn phase(&self) -> f32 {
        self.phase
    }

    /// Returns the phase for the current sample, then steps one sample ahead
    /// at `frequency`.
    #[inline]
    pub fn advance(&mut self, frequency: f32, sample_rate: f32) -> f32 {
        let phase = self.phase;
        self.phase =
            (self.phase + step_from_frequency_and_sample_rate(frequency, sample_rate)).rem_euclid(TAU);
        phase
    }
}
