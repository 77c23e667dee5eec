//! Binary frequency-shift keying, as used by the VIS header.

use crate::{
    filter::Goertzel,
    source::{
        SynthError,
        Synthesizer,
    },
};

/// Renders bits as back-to-back tapered tones.
#[derive(Clone, Copy, Debug)]
pub struct FskModulator {
    /// Frequency for `0` bits.
    pub space: f32,
    /// Frequency for `1` bits.
    pub mark: f32,
    pub bit_time_ms: f32,
}

impl FskModulator {
    #[inline]
    pub fn new(space: f32, mark: f32, bit_time_ms: f32) -> Self {
        Self {
            space,
            mark,
            bit_time_ms,
        }
    }

    /// Appends one tone per bit to `synth` and returns the rendered samples.
    pub fn render_bits<'a>(
        &self,
        synth: &'a mut Synthesizer,
        bits: impl IntoIterator<Item = bool>,
    ) -> Result<&'a [i16], SynthError> {
        let start = synth.len();
        for bit in bits {
            let frequency = if bit { self.mark } else { self.space };
            synth.render_tone(frequency, self.bit_time_ms, true)?;
        }
        Ok(&synth.samples()[start..])
    }
}

/// Fraction of a window's energy the winning tone must carry by default.
pub const DEFAULT_MIN_PURITY: f32 = 0.5;

/// Decides bits by comparing the power at the mark and space frequencies.
#[derive(Clone, Copy, Debug)]
pub struct FskDetector {
    space: Goertzel,
    mark: Goertzel,
    min_purity: f32,
}

impl FskDetector {
    pub fn new(sample_rate: f32, space: f32, mark: f32) -> Self {
        Self {
            space: Goertzel::new(sample_rate, space),
            mark: Goertzel::new(sample_rate, mark),
            min_purity: DEFAULT_MIN_PURITY,
        }
    }

    /// Sets the fraction of window energy (in `0..=1`) the stronger tone must
    /// account for, before the window counts as a bit.
    pub fn with_min_purity(mut self, min_purity: f32) -> Self {
        self.min_purity = min_purity;
        self
    }

    /// Returns the bit carried by the window, or `None` if neither tone
    /// dominates it.
    ///
    /// A sinusoid exactly on the detector frequency has purity 1. Silence,
    /// noise, other tones and windows straddling a bit boundary score low.
    pub fn detect(&self, window: &[f32]) -> Option<bool> {
        let energy = window.iter().map(|x| x * x).sum::<f32>();
        if window.is_empty() || energy <= 0.0 {
            return None;
        }

        let mark = self.mark.power(window);
        let space = self.space.power(window);
        let (bit, power) = if mark > space {
            (true, mark)
        }
        else {
            (false, space)
        };

        let purity = 2.0 * power / (window.len() as f32 * energy);
        (purity >= self.min_purity).then_some(bit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        sample::FromSample,
        source::Taper,
    };

    const SAMPLE_RATE: f32 = 44100.0;

    #[test]
    fn it_detects_rendered_bits() {
        let bits = [true, false, false, true, true, false, true, false];
        let modulator = FskModulator::new(1100.0, 1300.0, 30.0);
        let mut synth = Synthesizer::new(SAMPLE_RATE, Taper::from_duration(5.0, SAMPLE_RATE));
        let samples = modulator
            .render_bits(&mut synth, bits)
            .unwrap()
            .iter()
            .map(|x| f32::from_sample(*x))
            .collect::<Vec<f32>>();
        assert_eq!(samples.len(), 8 * 1323);

        let detector = FskDetector::new(SAMPLE_RATE, 1100.0, 1300.0);
        let detected = samples
            .chunks_exact(1323)
            .map(|window| detector.detect(window))
            .collect::<Option<Vec<bool>>>();
        assert_eq!(detected.as_deref(), Some(&bits[..]));
    }

    #[test]
    fn silence_is_not_a_bit() {
        let detector = FskDetector::new(SAMPLE_RATE, 1100.0, 1300.0);
        assert_eq!(detector.detect(&[0.0; 1323]), None);
        assert_eq!(detector.detect(&[]), None);
    }

    #[test]
    fn other_tones_are_not_bits() {
        let mut synth = Synthesizer::new(SAMPLE_RATE, Taper::default());
        let window = synth
            .render_tone(1200.0, 30.0, false)
            .unwrap()
            .iter()
            .map(|x| f32::from_sample(*x))
            .collect::<Vec<f32>>();

        let detector = FskDetector::new(SAMPLE_RATE, 1100.0, 1300.0);
        assert_eq!(detector.detect(&window), None);
    }
}
