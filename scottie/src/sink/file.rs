use std::{
    fs::File,
    io::{
        BufWriter,
        Seek,
        Write,
    },
    path::Path,
};

use crate::{
    GetSampleRate,
    sink::WriteSamples,
};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("wav sink error")]
    Hound(#[from] hound::Error),
    #[error("wav sink is closed")]
    Closed,
}

/// Writes 16-bit mono WAV.
#[derive(derive_more::Debug)]
pub struct WavSink<W>
where
    W: Write + Seek,
{
    #[debug(skip)]
    inner: Option<hound::WavWriter<W>>,
    sample_rate: f32,
}

pub fn wav_spec(sample_rate: f32) -> hound::WavSpec {
    hound::WavSpec {
        channels: 1,
        sample_rate: sample_rate as u32,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    }
}

impl<W> WavSink<W>
where
    W: Write + Seek,
{
    #[inline]
    pub fn new(inner: hound::WavWriter<W>) -> Self {
        let sample_rate = inner.spec().sample_rate as f32;
        Self {
            inner: Some(inner),
            sample_rate,
        }
    }

    #[inline]
    pub fn from_writer(writer: W, sample_rate: f32) -> Result<Self, Error> {
        Ok(Self::new(hound::WavWriter::new(
            writer,
            wav_spec(sample_rate),
        )?))
    }

    #[inline]
    fn writer_mut(&mut self) -> Result<&mut hound::WavWriter<W>, Error> {
        self.inner.as_mut().ok_or(Error::Closed)
    }
}

impl WavSink<BufWriter<File>> {
    #[inline]
    pub fn from_path(path: impl AsRef<Path>, sample_rate: f32) -> Result<Self, Error> {
        Ok(Self::new(hound::WavWriter::create(
            path,
            wav_spec(sample_rate),
        )?))
    }
}

impl<W> WriteSamples for WavSink<W>
where
    W: Write + Seek,
{
    type Error = Error;

    fn write_samples(&mut self, samples: &[i16]) -> Result<(), Self::Error> {
        let writer = self.writer_mut()?;
        for sample in samples {
            writer.write_sample(*sample)?;
        }
        Ok(())
    }

    #[inline]
    fn drain(&mut self) -> Result<(), Self::Error> {
        self.writer_mut()?.flush()?;
        Ok(())
    }

    #[inline]
    fn close(&mut self) -> Result<(), Self::Error> {
        if let Some(writer) = self.inner.take() {
            writer.finalize()?;
        }
        Ok(())
    }
}

impl<W> GetSampleRate for WavSink<W>
where
    W: Write + Seek,
{
    #[inline]
    fn sample_rate(&self) -> f32 {
        self.sample_rate
    }
}

/// Writes `samples` to a new WAV file in one go.
pub fn write_wav(path: impl AsRef<Path>, samples: &[i16], sample_rate: f32) -> Result<(), Error> {
    let mut sink = WavSink::from_path(path, sample_rate)?;
    sink.write_samples(samples)?;
    sink.close()
}
