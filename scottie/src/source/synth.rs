//! Phase-continuous tone synthesis into a growing PCM buffer.

use std::{
    f32::consts::PI,
    ops::Range,
};

use crate::{
    GetSampleRate,
    sample::IntoSample,
    source::PhaseAccumulator,
    util::{
        duration_to_samples,
        lerp,
    },
};

#[derive(Debug, thiserror::Error)]
pub enum SynthError {
    #[error("invalid duration: {duration_ms} ms")]
    NegativeDuration { duration_ms: f32 },
    #[error("sweep without frequencies")]
    EmptySweep,
}

/// Raised-cosine fade at both ends of a segment.
///
/// The first and last samples are silent and the envelope is symmetric:
/// sample `i` has the same gain as sample `length - 1 - i`. The fade is
/// clamped to half the segment, so short segments still reach full amplitude
/// in their middle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Taper {
    num_samples: usize,
}

impl Taper {
    #[inline]
    pub fn new(num_samples: usize) -> Self {
        Self { num_samples }
    }

    #[inline]
    pub fn from_duration(duration_ms: f32, sample_rate: f32) -> Self {
        Self::new(duration_to_samples(duration_ms, sample_rate))
    }

    #[inline]
    pub fn num_samples(&self) -> usize {
        self.num_samples
    }

    /// Gain of sample `index` in a segment of `length` samples.
    #[inline]
    pub fn gain(&self, index: usize, length: usize) -> f32 {
        let last = length.saturating_sub(1);
        let edge = self.num_samples.min(last / 2);
        let distance = index.min(last.saturating_sub(index));
        if distance >= edge {
            1.0
        }
        else {
            0.5 - 0.5 * (PI * distance as f32 / edge as f32).cos()
        }
    }

    pub fn envelope(&self, length: usize) -> Vec<f32> {
        (0..length).map(|index| self.gain(index, length)).collect()
    }
}

/// Sample range covered by item `index` when `count` items are spread over
/// `total` samples.
///
/// The spans of all items are disjoint and cover `0..total`. This is the
/// layout the synthesizer uses for sweeps.
#[inline]
pub fn sweep_span(index: usize, count: usize, total: usize) -> Range<usize> {
    let start = |index: usize| (index * total).div_ceil(count);
    start(index)..start(index + 1)
}

/// Item index of sample `n` when `count` items are spread over `total`
/// samples, and how far into that item's span the sample lies, in `[0, 1)`.
#[inline]
pub fn sweep_position(n: usize, count: usize, total: usize) -> (usize, f32) {
    let position = n * count;
    (position / total, (position % total) as f32 / total as f32)
}

#[derive(Clone, Debug)]
pub struct Synthesizer {
    sample_rate: f32,
    taper: Taper,
    phase: PhaseAccumulator,
    samples: Vec<i16>,
}

impl Synthesizer {
    pub fn new(sample_rate: f32, taper: Taper) -> Self {
        Self::with_capacity(sample_rate, taper, 0)
    }

    pub fn with_capacity(sample_rate: f32, taper: Taper, capacity: usize) -> Self {
        Self {
            sample_rate,
            taper,
            phase: PhaseAccumulator::default(),
            samples: Vec::with_capacity(capacity),
        }
    }

    #[inline]
    pub fn taper(&self) -> Taper {
        self.taper
    }

    #[inline]
    pub fn phase(&self) -> &PhaseAccumulator {
        &self.phase
    }

    #[inline]
    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    #[inline]
    pub fn into_samples(self) -> Vec<i16> {
        self.samples
    }

    fn num_samples(&self, duration_ms: f32) -> Result<usize, SynthError> {
        if duration_ms >= 0.0 {
            Ok(duration_to_samples(duration_ms, self.sample_rate))
        }
        else {
            Err(SynthError::NegativeDuration { duration_ms })
        }
    }

    /// Appends a constant tone and returns the samples it produced.
    pub fn render_tone(
        &mut self,
        frequency: f32,
        duration_ms: f32,
        taper: bool,
    ) -> Result<&[i16], SynthError> {
        let num_samples = self.num_samples(duration_ms)?;
        Ok(self.render_tone_samples(frequency, num_samples, taper))
    }

    pub fn render_tone_samples(&mut self, frequency: f32, num_samples: usize, taper: bool) -> &[i16] {
        let start = self.samples.len();
        self.samples.reserve(num_samples);

        for i in 0..num_samples {
            let gain = if taper {
                self.taper.gain(i, num_samples)
            }
            else {
                1.0
            };
            let phase = self.phase.advance(frequency, self.sample_rate);
            self.samples.push((gain * phase.sin()).into_sample());
        }

        &self.samples[start..]
    }

    /// Appends a tapered tone whose frequency glides through `frequencies`.
    ///
    /// Each frequency owns an equal share of the segment (see [`sweep_span`])
    /// and is linearly interpolated towards the next one. The last frequency
    /// is held.
    pub fn render_sweep(&mut self, frequencies: &[f32], duration_ms: f32) -> Result<&[i16], SynthError> {
        let num_samples = self.num_samples(duration_ms)?;
        self.render_sweep_samples(frequencies, num_samples)
    }

    pub fn render_sweep_samples(
        &mut self,
        frequencies: &[f32],
        num_samples: usize,
    ) -> Result<&[i16], SynthError> {
        let count = frequencies.len();
        if count == 0 {
            return Err(SynthError::EmptySweep);
        }

        let start = self.samples.len();
        self.samples.reserve(num_samples);

        for i in 0..num_samples {
            let (index, alpha) = sweep_position(i, count, num_samples);
            let frequency = if index + 1 < count {
                lerp(alpha, frequencies[index], frequencies[index + 1])
            }
            else {
                frequencies[count - 1]
            };

            let gain = self.taper.gain(i, num_samples);
            let phase = self.phase.advance(frequency, self.sample_rate);
            self.samples.push((gain * phase.sin()).into_sample());
        }

        Ok(&self.samples[start..])
    }

    /// Appends silence. The phase is left untouched.
    pub fn render_silence(&mut self, duration_ms: f32) -> Result<&[i16], SynthError> {
        let num_samples = self.num_samples(duration_ms)?;
        Ok(self.render_silence_samples(num_samples))
    }

    pub fn render_silence_samples(&mut self, num_samples: usize) -> &[i16] {
        let start = self.samples.len();
        self.samples.resize(start + num_samples, 0);
        &self.samples[start..]
    }
}

impl GetSampleRate for Synthesizer {
    #[inline]
    fn sample_rate(&self) -> f32 {
        self.sample_rate
    }
}

#[cfg(test)]
mod tests {
    use std::f32::consts::TAU;

    use super::*;

    const SAMPLE_RATE: f32 = 44100.0;

    fn synth() -> Synthesizer {
        Synthesizer::new(SAMPLE_RATE, Taper::from_duration(5.0, SAMPLE_RATE))
    }

    #[test]
    fn tone_has_expected_length() {
        let mut synth = synth();
        assert_eq!(synth.render_tone(1200.0, 9.0, true).unwrap().len(), 396);
        assert_eq!(synth.render_tone(1500.0, 1.5, true).unwrap().len(), 66);
        assert_eq!(synth.render_silence(1.5).unwrap().len(), 66);
        assert_eq!(synth.len(), 396 + 66 + 66);
    }

    #[test]
    fn zero_duration_renders_nothing() {
        let mut synth = synth();
        assert!(synth.render_tone(1200.0, 0.0, true).unwrap().is_empty());
        assert!(synth.render_sweep(&[1500.0], 0.0).unwrap().is_empty());
        assert!(synth.is_empty());
    }

    #[test]
    fn negative_duration_is_rejected() {
        let mut synth = synth();
        assert!(matches!(
            synth.render_tone(1200.0, -1.0, false),
            Err(SynthError::NegativeDuration { .. })
        ));
        assert!(matches!(
            synth.render_silence(-1.0),
            Err(SynthError::NegativeDuration { .. })
        ));
    }

    #[test]
    fn empty_sweep_is_rejected() {
        let mut synth = synth();
        assert!(matches!(
            synth.render_sweep(&[], 10.0),
            Err(SynthError::EmptySweep)
        ));
    }

    #[test]
    fn tapered_tone_starts_silent() {
        let mut synth = synth();
        let samples = synth.render_tone(1200.0, 30.0, true).unwrap();
        assert_eq!(samples[0], 0);
        assert!(samples.iter().all(|x| *x != i16::MIN));
        let peak = samples.iter().map(|x| x.unsigned_abs()).max().unwrap();
        assert!(peak > 32000);
    }

    #[test]
    fn short_segments_clamp_the_taper() {
        let taper = Taper::new(220);
        // 66 sample porch: fade over 32 samples, full amplitude in the middle
        assert_eq!(taper.gain(0, 66), 0.0);
        assert_eq!(taper.gain(32, 66), 1.0);
        assert_eq!(taper.gain(33, 66), 1.0);
        assert!(taper.gain(16, 66) > 0.4);
        assert_eq!(taper.gain(65, 66), 0.0);
        assert_eq!(Taper::new(0).gain(0, 66), 1.0);
    }

    #[test]
    fn taper_is_symmetric() {
        let taper = Taper::new(220);
        for length in [1, 2, 65, 66, 396, 1323, 6096] {
            let envelope = taper.envelope(length);
            for (index, gain) in envelope.iter().enumerate() {
                assert_eq!(*gain, envelope[length - 1 - index], "length {length}, index {index}");
            }
        }
    }

    #[test]
    fn tapered_tone_ends_silent() {
        let mut synth = synth();
        let samples = synth.render_tone(1900.0, 30.0, true).unwrap();
        assert_eq!(samples[0], 0);
        assert_eq!(samples[samples.len() - 1], 0);
    }

    #[test]
    fn phase_is_continuous_across_tones() {
        let mut synth = synth();
        synth.render_tone(1200.0, 10.0, false).unwrap();
        let boundary = synth.len();
        synth.render_tone(2300.0, 10.0, false).unwrap();

        let samples = synth.samples();
        let max_step = 32767.0 * TAU * 2300.0 / SAMPLE_RATE + 1.0;
        for window in samples[boundary - 8..boundary + 8].windows(2) {
            let delta = (f32::from(window[1]) - f32::from(window[0])).abs();
            assert!(delta <= max_step, "jump of {delta} at tone boundary");
        }
    }

    #[test]
    fn silence_does_not_reset_phase() {
        let mut synth = synth();
        synth.render_tone(1200.0, 1.0, false).unwrap();
        let phase = *synth.phase();
        assert!(synth.render_silence(5.0).unwrap().iter().all(|x| *x == 0));
        assert_eq!(*synth.phase(), phase);
    }

    #[test]
    fn sweep_spans_cover_the_segment() {
        let total = 6096;
        let count = 320;
        let mut expected_start = 0;
        for index in 0..count {
            let span = sweep_span(index, count, total);
            assert_eq!(span.start, expected_start);
            assert!(span.len() == 19 || span.len() == 20);
            expected_start = span.end;
        }
        assert_eq!(expected_start, total);
    }

    #[test]
    fn sweep_positions_stay_in_their_spans() {
        let total = 6096;
        let count = 320;
        for index in 0..count {
            let span = sweep_span(index, count, total);
            for n in span.clone() {
                let (item, alpha) = sweep_position(n, count, total);
                assert_eq!(item, index);
                assert!((0.0..1.0).contains(&alpha));
            }
            // a span starts within one sample of its item's start
            assert!(sweep_position(span.start, count, total).1 < count as f32 / total as f32);
        }
    }

    #[test]
    fn sweep_spans_match_synthesis() {
        // the synthesizer assigns sample i to frequency i * count / total
        let total = 6096;
        let count = 320;
        for index in 0..count {
            for i in sweep_span(index, count, total) {
                assert_eq!(i * count / total, index);
            }
        }
    }
}
