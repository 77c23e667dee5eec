pub mod file;
pub mod noise;
pub mod sine;
pub mod synth;

use std::convert::Infallible;

pub use self::{
    file::WavSource,
    noise::Noise,
    sine::PhaseAccumulator,
    synth::{
        SynthError,
        Synthesizer,
        Taper,
    },
};

/// A blocking source of 16-bit mono PCM.
pub trait ReadSamples {
    type Error;

    /// Reads up to `buffer.len()` samples, blocking until at least one is
    /// available.
    ///
    /// Returns the number of samples read. `0` means the stream has ended.
    fn read_samples(&mut self, buffer: &mut [i16]) -> Result<usize, Self::Error>;
}

impl<R: ReadSamples> ReadSamples for &mut R {
    type Error = R::Error;

    #[inline]
    fn read_samples(&mut self, buffer: &mut [i16]) -> Result<usize, Self::Error> {
        (**self).read_samples(buffer)
    }
}

/// Reads samples from a slice.
#[derive(Clone, Copy, Debug)]
pub struct Cursor<'a> {
    samples: &'a [i16],
    position: usize,
}

impl<'a> Cursor<'a> {
    #[inline]
    pub fn new(samples: &'a [i16]) -> Self {
        Self {
            samples,
            position: 0,
        }
    }

    #[inline]
    pub fn position(&self) -> usize {
        self.position
    }

    #[inline]
    pub fn remaining(&self) -> &'a [i16] {
        &self.samples[self.position..]
    }
}

impl ReadSamples for Cursor<'_> {
    type Error = Infallible;

    fn read_samples(&mut self, buffer: &mut [i16]) -> Result<usize, Self::Error> {
        let remaining = self.remaining();
        let n = remaining.len().min(buffer.len());
        buffer[..n].copy_from_slice(&remaining[..n]);
        self.position += n;
        Ok(n)
    }
}
