//! Conversions between 16-bit PCM samples and normalized floats.
//!
//! The encoder scales by [`PCM_FULL_SCALE`] so that a full-amplitude sine
//! never clips. The decoder divides by [`PCM_NORMALIZE`] which maps the whole
//! `i16` range into `[-1, 1)`.

pub const PCM_FULL_SCALE: f32 = 32767.0;
pub const PCM_NORMALIZE: f32 = 32768.0;

pub trait FromSample<S> {
    fn from_sample(sample: S) -> Self;
}

impl<T> FromSample<T> for T {
    #[inline]
    fn from_sample(sample: T) -> Self {
        sample
    }
}

impl FromSample<i16> for f32 {
    #[inline]
    fn from_sample(sample: i16) -> Self {
        f32::from(sample) / PCM_NORMALIZE
    }
}

impl FromSample<f32> for i16 {
    #[inline]
    fn from_sample(sample: f32) -> Self {
        // `as` saturates, so out-of-range values clip instead of wrapping.
        (sample * PCM_FULL_SCALE).round() as i16
    }
}

pub trait IntoSample<S> {
    fn into_sample(self) -> S;
}

impl<T, U> IntoSample<U> for T
where
    U: FromSample<T>,
{
    #[inline]
    fn into_sample(self) -> U {
        U::from_sample(self)
    }
}
