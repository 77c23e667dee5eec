pub mod file;

use std::convert::Infallible;

pub use self::file::WavSink;

/// A blocking sink for 16-bit mono PCM.
pub trait WriteSamples {
    type Error;

    /// Writes all of `samples`.
    fn write_samples(&mut self, samples: &[i16]) -> Result<(), Self::Error>;

    /// Blocks until everything written so far has been played or persisted.
    fn drain(&mut self) -> Result<(), Self::Error>;

    /// Releases the underlying device or file. Further writes fail.
    #[inline]
    fn close(&mut self) -> Result<(), Self::Error> {
        self.drain()
    }
}

impl<W: WriteSamples> WriteSamples for &mut W {
    type Error = W::Error;

    #[inline]
    fn write_samples(&mut self, samples: &[i16]) -> Result<(), Self::Error> {
        (**self).write_samples(samples)
    }

    #[inline]
    fn drain(&mut self) -> Result<(), Self::Error> {
        (**self).drain()
    }

    #[inline]
    fn close(&mut self) -> Result<(), Self::Error> {
        (**self).close()
    }
}

impl WriteSamples for Vec<i16> {
    type Error = Infallible;

    #[inline]
    fn write_samples(&mut self, samples: &[i16]) -> Result<(), Self::Error> {
        self.extend_from_slice(samples);
        Ok(())
    }

    #[inline]
    fn drain(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}
