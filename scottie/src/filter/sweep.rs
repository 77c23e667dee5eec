//! Knot frequencies of a linear sweep.
//!
//! [`Synthesizer::render_sweep`] glides linearly from each knot frequency to
//! the next across the knot's span. Any per-span frequency estimate thus
//! mixes a knot with its successor. Instead, this fits the knot frequencies of
//! the glide model to all samples at once.
//!
//! For a tone with phase steps `ω[n]` and unit amplitude,
//!
//! ```text
//! x[n + 1] + x[n - 1] = x[n] (cos ω[n] + cos ω[n - 1]) + q[n] (sin ω[n] - sin ω[n - 1])
//! x[n + 1] - x[n - 1] = x[n] (cos ω[n] - cos ω[n - 1]) + q[n] (sin ω[n] + sin ω[n - 1])
//! ```
//!
//! where `q` is the quadrature component. Eliminating `q` leaves one residual
//! per sample that only depends on the two phase steps, which in turn depend
//! on at most three neighbouring knots. The normal equations are banded and
//! a few Gauss-Newton steps converge from per-span estimates.
//!
//! The taper leaves the first span with too little amplitude to pin its knot
//! down. If the sweep follows a tone of known frequency without a phase jump,
//! [`SweepDemodulator::lead_in_phase`] measures the phase the sweep starts
//! with, and [`SweepDemodulator::anchor`] refines the first knots so that the
//! accumulated phase matches the observed one.
//!
//! Sums run in `f64`: the residuals are small differences of large terms.
//!
//! [`Synthesizer::render_sweep`]: crate::source::Synthesizer::render_sweep

use std::{
    f64::consts::{
        PI,
        TAU,
    },
    ops::RangeInclusive,
};

use crate::source::{
    Taper,
    synth::sweep_position,
};

/// Samples with less envelope gain than this are left out of the fit.
const FIT_GAIN_FLOOR: f32 = 1e-3;

/// Levenberg-Marquardt damping, relative to the diagonal.
const DAMPING: f64 = 1e-3;

const MAX_ITERATIONS: usize = 6;

/// Refinement stops once no knot moves further than this (Hz).
const TOLERANCE: f64 = 1e-3;

/// Upper bandwidth of the normal equations.
const BANDWIDTH: usize = 2;

/// Number of leading knots refined from the lead-in phase. The phase is
/// tracked over as many spans.
const ANCHORED_KNOTS: usize = 3;

/// Phase refinements moving a knot further than this (Hz) are rejected. Under
/// noise the phase can slip by whole cycles.
const MAX_ANCHOR_STEP: f64 = 32.0;

/// Lead-in tones weaker than this give no usable phase.
const MIN_LEAD_IN_AMPLITUDE: f64 = 1e-3;

#[derive(Clone, Debug)]
pub struct SweepDemodulator {
    sample_rate: f32,
    taper: Taper,
    num_knots: usize,
    envelope: Vec<f32>,
}

impl SweepDemodulator {
    /// Demodulator for sweeps through `num_knots` frequencies over
    /// `num_samples` samples, tapered with `taper`.
    pub fn new(sample_rate: f32, taper: Taper, num_knots: usize, num_samples: usize) -> Self {
        Self {
            sample_rate,
            taper,
            num_knots,
            envelope: taper.envelope(num_samples),
        }
    }

    #[inline]
    pub fn num_knots(&self) -> usize {
        self.num_knots
    }

    #[inline]
    pub fn num_samples(&self) -> usize {
        self.envelope.len()
    }

    /// The taper envelope over the sweep.
    #[inline]
    pub fn envelope(&self) -> &[f32] {
        &self.envelope
    }

    #[inline]
    fn radians_per_hz(&self) -> f64 {
        TAU / f64::from(self.sample_rate)
    }

    fn fits(&self, samples: &[f32], frequencies: &[f32]) -> bool {
        samples.len() == self.num_samples()
            && frequencies.len() == self.num_knots
            && self.num_knots > 0
            && self.num_knots <= self.num_samples()
    }

    /// Knots that sample `n` depends on, with their weights.
    #[inline]
    fn knot_weights(&self, n: usize) -> [(usize, f64); 2] {
        let (index, alpha) = sweep_position(n, self.num_knots, self.num_samples());
        if index + 1 < self.num_knots {
            let alpha = f64::from(alpha);
            [(index, 1.0 - alpha), (index + 1, alpha)]
        }
        else {
            [(index, 1.0), (index, 0.0)]
        }
    }

    /// Phase step of sample `n`, in radians.
    #[inline]
    fn phase_step(&self, n: usize, frequencies: &[f32]) -> f64 {
        self.knot_weights(n)
            .iter()
            .map(|(index, weight)| weight * f64::from(frequencies[*index]))
            .sum::<f64>()
            * self.radians_per_hz()
    }

    /// Refines one frequency per knot so that the glide model fits `samples`.
    ///
    /// `frequencies` holds the starting point, e.g. per-span estimates.
    /// Results are clamped to `range`. Nothing happens if the lengths don't
    /// match this demodulator.
    pub fn refine(&self, samples: &[f32], frequencies: &mut [f32], range: RangeInclusive<f32>) {
        if !self.fits(samples, frequencies) || samples.len() < 3 {
            return;
        }

        let num_samples = samples.len();
        let radians_per_hz = self.radians_per_hz();
        let mut normal = vec![[0.0f64; BANDWIDTH + 1]; self.num_knots];
        let mut gradient = vec![0.0f64; self.num_knots];
        let mut trig = Vec::with_capacity(num_samples);

        for iteration in 0..MAX_ITERATIONS {
            normal.fill([0.0; BANDWIDTH + 1]);
            gradient.fill(0.0);
            trig.clear();
            trig.extend((0..num_samples).map(|n| self.phase_step(n, frequencies).sin_cos()));

            for n in 1..num_samples - 1 {
                let g0 = self.envelope[n - 1];
                let g1 = self.envelope[n];
                let g2 = self.envelope[n + 1];
                if g0.min(g1).min(g2) < FIT_GAIN_FLOOR {
                    continue;
                }

                let previous = f64::from(samples[n - 1] / g0);
                let current = f64::from(samples[n] / g1);
                let next = f64::from(samples[n + 1] / g2);
                let (sin_n, cos_n) = trig[n];
                let (sin_m, cos_m) = trig[n - 1];
                let sin_sum = sin_n + sin_m;
                if sin_sum.abs() < 1e-9 {
                    continue;
                }

                let skew = (sin_n - sin_m) / sin_sum;
                let gain = f64::from(g1);
                let residual = gain
                    * (next + previous
                        - current * (cos_n + cos_m)
                        - skew * (next - previous - current * (cos_n - cos_m)));

                let scale = gain * current * radians_per_hz;
                let [a, b] = self.knot_weights(n);
                let [c, d] = self.knot_weights(n - 1);
                let jacobian = [
                    (a.0, a.1 * scale * sin_n),
                    (b.0, b.1 * scale * sin_n),
                    (c.0, c.1 * scale * sin_m),
                    (d.0, d.1 * scale * sin_m),
                ];

                for (i, ji) in jacobian {
                    gradient[i] -= ji * residual;
                    for (j, jj) in jacobian {
                        if j >= i && j - i <= BANDWIDTH {
                            normal[i][j - i] += ji * jj;
                        }
                    }
                }
            }

            for row in &mut normal {
                row[0] = row[0] * (1.0 + DAMPING) + f64::MIN_POSITIVE;
            }
            solve_banded(&mut normal, &mut gradient);

            let mut largest_step = 0.0f64;
            for (frequency, step) in frequencies.iter_mut().zip(&gradient) {
                if !step.is_finite() {
                    continue;
                }
                let current = f64::from(*frequency);
                let updated = (current + step).clamp(f64::from(*range.start()), f64::from(*range.end()));
                largest_step = largest_step.max((updated - current).abs());
                *frequency = updated as f32;
            }

            if largest_step < TOLERANCE {
                tracing::trace!(iteration, "sweep fit converged");
                break;
            }
        }
    }

    /// Phase of the first sweep sample, continued from the tone of
    /// `frequency` in `lead_in`, which directly precedes the sweep and
    /// carries the same taper.
    pub fn lead_in_phase(&self, lead_in: &[f32], frequency: f32) -> Option<f64> {
        let length = lead_in.len();
        let step = f64::from(frequency) * self.radians_per_hz();

        // least squares for `x[m] = g[m] (a sin(ω m) + b cos(ω m))`
        let mut sin_sin = 0.0;
        let mut cos_cos = 0.0;
        let mut sin_cos = 0.0;
        let mut x_sin = 0.0;
        let mut x_cos = 0.0;
        for (m, x) in lead_in.iter().enumerate() {
            let gain = f64::from(self.taper.gain(m, length));
            let (sin, cos) = (step * m as f64).sin_cos();
            let (sin, cos) = (gain * sin, gain * cos);
            let x = f64::from(*x);
            sin_sin += sin * sin;
            cos_cos += cos * cos;
            sin_cos += sin * cos;
            x_sin += x * sin;
            x_cos += x * cos;
        }

        let determinant = sin_sin * cos_cos - sin_cos * sin_cos;
        if determinant.is_nan() || determinant <= f64::EPSILON {
            return None;
        }
        let a = (x_sin * cos_cos - x_cos * sin_cos) / determinant;
        let b = (x_cos * sin_sin - x_sin * sin_cos) / determinant;
        if a.hypot(b) < MIN_LEAD_IN_AMPLITUDE {
            return None;
        }

        Some(b.atan2(a) + step * length as f64)
    }

    /// Refines the first knots so that the phase accumulated over the sweep
    /// continues from `phase`, the phase of its first sample (see
    /// [`lead_in_phase`](Self::lead_in_phase)).
    ///
    /// Returns whether the refinement was applied.
    pub fn anchor(&self, samples: &[f32], frequencies: &mut [f32], phase: f64, range: RangeInclusive<f32>) -> bool {
        if !self.fits(samples, frequencies) || self.num_knots < ANCHORED_KNOTS {
            return false;
        }

        let num_samples = samples.len();
        let end = (ANCHORED_KNOTS * num_samples / self.num_knots).min(num_samples - 1);
        let radians_per_hz = self.radians_per_hz();

        let mut normal = [[0.0f64; ANCHORED_KNOTS]; ANCHORED_KNOTS];
        let mut gradient = [0.0f64; ANCHORED_KNOTS];
        let mut accumulated = 0.0;
        let mut derivative = [0.0f64; ANCHORED_KNOTS];
        let mut previous_step = 0.0;

        for n in 0..end {
            let step = self.phase_step(n, frequencies);

            if n > 0 {
                let g0 = self.envelope[n - 1];
                let g1 = self.envelope[n];
                let g2 = self.envelope[n + 1];
                if g0 > 0.0 && g1 > 0.0 && g2 > 0.0 {
                    let current = f64::from(samples[n] / g1);
                    let spread = f64::from(samples[n + 1] / g2) - f64::from(samples[n - 1] / g0);
                    let (sin_n, cos_n) = step.sin_cos();
                    let (sin_m, cos_m) = f64::sin_cos(previous_step);
                    let quadrature = (spread - current * (cos_n - cos_m)) / (sin_n + sin_m);

                    let residual = wrap_phase(current.atan2(quadrature) - phase - accumulated);
                    let weight = f64::from(g1 * g1) * (current * current + quadrature * quadrature);
                    for i in 0..ANCHORED_KNOTS {
                        gradient[i] += weight * derivative[i] * residual;
                        for j in 0..ANCHORED_KNOTS {
                            normal[i][j] += weight * derivative[i] * derivative[j];
                        }
                    }
                }
            }

            accumulated += step;
            previous_step = step;
            for (index, weight) in self.knot_weights(n) {
                if index < ANCHORED_KNOTS {
                    derivative[index] += weight * radians_per_hz;
                }
            }
        }

        let Some(steps) = solve_dense(normal, gradient)
        else {
            return false;
        };
        if steps.iter().any(|step| step.is_nan() || step.abs() > MAX_ANCHOR_STEP) {
            tracing::trace!(?steps, "lead-in phase rejected");
            return false;
        }

        for (frequency, step) in frequencies.iter_mut().zip(steps) {
            *frequency = (*frequency + step as f32).clamp(*range.start(), *range.end());
        }
        true
    }
}

#[inline]
fn wrap_phase(phase: f64) -> f64 {
    (phase + PI).rem_euclid(TAU) - PI
}

/// Solves a symmetric positive definite band system in place. `band[i][d]`
/// holds entry `(i, i + d)`. On return `rhs` holds the solution.
fn solve_banded(band: &mut [[f64; BANDWIDTH + 1]], rhs: &mut [f64]) {
    let n = rhs.len();

    for i in 0..n {
        let pivot = band[i][0];
        for r in 1..=BANDWIDTH.min(n - 1 - i) {
            let factor = band[i][r] / pivot;
            for c in r..=BANDWIDTH {
                band[i + r][c - r] -= factor * band[i][c];
            }
            rhs[i + r] -= factor * rhs[i];
        }
    }

    for i in (0..n).rev() {
        let mut value = rhs[i];
        for d in 1..=BANDWIDTH.min(n - 1 - i) {
            value -= band[i][d] * rhs[i + d];
        }
        rhs[i] = value / band[i][0];
    }
}

fn solve_dense<const N: usize>(mut matrix: [[f64; N]; N], mut rhs: [f64; N]) -> Option<[f64; N]> {
    for i in 0..N {
        let pivot = matrix[i][i];
        if pivot.is_nan() || pivot <= 0.0 {
            return None;
        }
        for r in i + 1..N {
            let factor = matrix[r][i] / pivot;
            for c in i..N {
                matrix[r][c] -= factor * matrix[i][c];
            }
            rhs[r] -= factor * rhs[i];
        }
    }

    for i in (0..N).rev() {
        let mut value = rhs[i];
        for c in i + 1..N {
            value -= matrix[i][c] * rhs[c];
        }
        rhs[i] = value / matrix[i][i];
    }

    rhs.iter().all(|x| x.is_finite()).then_some(rhs)
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;
    use crate::{
        sample::FromSample,
        source::Synthesizer,
    };

    const SAMPLE_RATE: f32 = 44100.0;
    const TAPER: usize = 220;
    const SCAN: usize = 6096;
    const LEAD_IN: usize = 66;
    const BAND: RangeInclusive<f32> = 1500.0..=2300.0;

    /// A lead-in tone followed by a sweep, as normalized samples.
    fn render(frequencies: &[f32]) -> (Vec<f32>, Vec<f32>) {
        let mut synth = Synthesizer::new(SAMPLE_RATE, Taper::new(TAPER));
        // some phase to start from
        synth.render_tone_samples(1234.0, 17, false);
        let start = synth.len();
        synth.render_tone_samples(1500.0, LEAD_IN, true);
        synth.render_sweep_samples(frequencies, SCAN).unwrap();

        let samples = synth.samples()[start..]
            .iter()
            .map(|x| f32::from_sample(*x))
            .collect::<Vec<f32>>();
        let (lead_in, sweep) = samples.split_at(LEAD_IN);
        (lead_in.to_vec(), sweep.to_vec())
    }

    fn demodulator(num_knots: usize) -> SweepDemodulator {
        SweepDemodulator::new(SAMPLE_RATE, Taper::new(TAPER), num_knots, SCAN)
    }

    #[test]
    fn it_recovers_alternating_knots() {
        let expected = (0..320)
            .map(|i| if i % 2 == 0 { 1500.0 } else { 2300.0 })
            .collect::<Vec<f32>>();
        let (_, sweep) = render(&expected);

        let mut frequencies = vec![1900.0; 320];
        demodulator(320).refine(&sweep, &mut frequencies, BAND);

        // the first knot is only resolved by the lead-in
        for (frequency, expected) in frequencies.iter().zip(&expected).skip(1) {
            assert_abs_diff_eq!(*frequency, *expected, epsilon = 3.0);
        }
    }

    #[test]
    fn it_recovers_a_step() {
        let expected = (0..320)
            .map(|i| if i < 160 { 1562.7 } else { 2190.2 })
            .collect::<Vec<f32>>();
        let (_, sweep) = render(&expected);

        let mut frequencies = vec![1900.0; 320];
        demodulator(320).refine(&sweep, &mut frequencies, BAND);

        for (frequency, expected) in frequencies.iter().zip(&expected).skip(1) {
            assert_abs_diff_eq!(*frequency, *expected, epsilon = 3.0);
        }
    }

    #[test]
    fn lead_in_anchors_the_first_knot() {
        let mut expected = vec![1900.0; 320];
        expected[0] = 2300.0;
        expected[1] = 1600.0;
        let (lead_in, sweep) = render(&expected);
        let demodulator = demodulator(320);

        let mut frequencies = vec![1900.0; 320];
        demodulator.refine(&sweep, &mut frequencies, BAND);
        let phase = demodulator.lead_in_phase(&lead_in, 1500.0).unwrap();
        assert!(demodulator.anchor(&sweep, &mut frequencies, phase, BAND));

        for (frequency, expected) in frequencies.iter().zip(&expected) {
            assert_abs_diff_eq!(*frequency, *expected, epsilon = 3.0);
        }
    }

    #[test]
    fn silent_lead_in_has_no_phase() {
        assert_eq!(demodulator(320).lead_in_phase(&[0.0; LEAD_IN], 1500.0), None);
        assert_eq!(demodulator(320).lead_in_phase(&[], 1500.0), None);
    }

    #[test]
    fn mismatched_lengths_are_ignored() {
        let mut frequencies = vec![1900.0; 10];
        demodulator(320).refine(&[0.5; 100], &mut frequencies, BAND);
        assert!(frequencies.iter().all(|frequency| *frequency == 1900.0));
        assert!(!demodulator(320).anchor(&[0.5; 100], &mut frequencies, 0.0, BAND));
    }

    #[test]
    fn silence_leaves_the_estimate() {
        let mut frequencies = vec![1700.0; 320];
        demodulator(320).refine(&[0.0; SCAN], &mut frequencies, BAND);
        assert!(frequencies.iter().all(|frequency| *frequency == 1700.0));
    }

    #[test]
    fn banded_solve_matches_dense() {
        // tridiagonal plus one more band
        let mut band = vec![[4.0, 1.0, 0.5], [5.0, 1.5, 0.25], [6.0, 2.0, 0.0], [7.0, 0.0, 0.0]];
        let mut rhs = vec![1.0, 2.0, 3.0, 4.0];
        let dense = [
            [4.0, 1.0, 0.5, 0.0],
            [1.0, 5.0, 1.5, 0.25],
            [0.5, 1.5, 6.0, 2.0],
            [0.0, 0.25, 2.0, 7.0],
        ];
        let expected = solve_dense(dense, [1.0, 2.0, 3.0, 4.0]).unwrap();
        solve_banded(&mut band, &mut rhs);
        for (x, expected) in rhs.iter().zip(expected) {
            assert_abs_diff_eq!(*x, expected, epsilon = 1e-12);
        }
    }
}
