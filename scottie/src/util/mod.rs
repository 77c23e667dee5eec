#[inline(always)]
pub fn lerp(t: f32, a: f32, b: f32) -> f32 {
    (1.0 - t) * a + t * b
}

#[inline(always)]
pub fn unlerp(x: f32, a: f32, b: f32) -> f32 {
    (x - a) / (b - a)
}

/// Number of whole samples that fit into `duration_ms` at `sample_rate`.
///
/// The fractional sample is dropped. Negative durations yield 0, callers that
/// need to reject them must check beforehand.
#[inline]
pub fn duration_to_samples(duration_ms: f32, sample_rate: f32) -> usize {
    (f64::from(duration_ms) * f64::from(sample_rate) / 1000.0).max(0.0) as usize
}

/// Like [`duration_to_samples`], but rounds to the nearest sample.
#[inline]
pub fn duration_to_samples_rounded(duration_ms: f32, sample_rate: f32) -> usize {
    (f64::from(duration_ms) * f64::from(sample_rate) / 1000.0)
        .round()
        .max(0.0) as usize
}

#[inline]
pub fn samples_to_duration(num_samples: usize, sample_rate: f32) -> f32 {
    (num_samples as f64 * 1000.0 / f64::from(sample_rate)) as f32
}
