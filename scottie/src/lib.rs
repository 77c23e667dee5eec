#[cfg(feature = "audio")]
pub mod audio;
pub mod filter;
pub mod modem;
pub mod sample;
pub mod sink;
pub mod source;
pub mod util;

pub trait GetSampleRate {
    fn sample_rate(&self) -> f32;
}

impl<T: GetSampleRate> GetSampleRate for &T {
    #[inline]
    fn sample_rate(&self) -> f32 {
        (**self).sample_rate()
    }
}

impl<T: GetSampleRate> GetSampleRate for &mut T {
    #[inline]
    fn sample_rate(&self) -> f32 {
        (**self).sample_rate()
    }
}

/// Attaches a sample rate to a source or sink that doesn't carry one itself,
/// e.g. an in-memory [`Cursor`](crate::source::Cursor).
#[derive(Clone, Copy, Debug)]
pub struct WithSampleRate<T> {
    pub inner: T,
    pub sample_rate: f32,
}

impl<T> WithSampleRate<T> {
    #[inline]
    pub fn new(inner: T, sample_rate: f32) -> Self {
        Self { inner, sample_rate }
    }
}

impl<T> GetSampleRate for WithSampleRate<T> {
    #[inline]
    fn sample_rate(&self) -> f32 {
        self.sample_rate
    }
}

impl<T: source::ReadSamples> source::ReadSamples for WithSampleRate<T> {
    type Error = T::Error;

    #[inline]
    fn read_samples(&mut self, buffer: &mut [i16]) -> Result<usize, Self::Error> {
        self.inner.read_samples(buffer)
    }
}

impl<T: sink::WriteSamples> sink::WriteSamples for WithSampleRate<T> {
    type Error = T::Error;

    #[inline]
    fn write_samples(&mut self, samples: &[i16]) -> Result<(), Self::Error> {
        self.inner.write_samples(samples)
    }

    #[inline]
    fn drain(&mut self) -> Result<(), Self::Error> {
        self.inner.drain()
    }

    #[inline]
    fn close(&mut self) -> Result<(), Self::Error> {
        self.inner.close()
    }
}
