use std::{
    fs::File,
    io::BufReader,
    path::Path,
};

use crate::{
    GetSampleRate,
    source::ReadSamples,
};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("wav source error")]
    Hound(#[from] hound::Error),
    #[error("unexpected channel count: {channels} (expected {expected})")]
    UnexpectedChannelCount { channels: u16, expected: u16 },
    #[error("unexpected bits per sample: {bits_per_sample} (expected {expected})")]
    UnexpectedBitsPerSample { bits_per_sample: u16, expected: u16 },
    #[error("unexpected sample format: {sample_format:?} (expected {expected:?})")]
    UnexpectedSampleFormat {
        sample_format: hound::SampleFormat,
        expected: hound::SampleFormat,
    },
}

fn check_spec(spec: &hound::WavSpec) -> Result<(), Error> {
    if spec.channels != 1 {
        return Err(Error::UnexpectedChannelCount {
            channels: spec.channels,
            expected: 1,
        });
    }
    if spec.sample_format != hound::SampleFormat::Int {
        return Err(Error::UnexpectedSampleFormat {
            sample_format: spec.sample_format,
            expected: hound::SampleFormat::Int,
        });
    }
    if spec.bits_per_sample != 16 {
        return Err(Error::UnexpectedBitsPerSample {
            bits_per_sample: spec.bits_per_sample,
            expected: 16,
        });
    }
    Ok(())
}

/// Reads 16-bit mono WAV.
#[derive(derive_more::Debug)]
pub struct WavSource<R> {
    #[debug(skip)]
    inner: hound::WavReader<R>,
    spec: hound::WavSpec,
}

impl<R> WavSource<R>
where
    R: std::io::Read,
{
    pub fn new(inner: hound::WavReader<R>) -> Result<Self, Error> {
        let spec = inner.spec();
        check_spec(&spec)?;
        Ok(Self { inner, spec })
    }

    #[inline]
    pub fn from_reader(reader: R) -> Result<Self, Error> {
        Self::new(hound::WavReader::new(reader)?)
    }

    #[inline]
    pub fn spec(&self) -> &hound::WavSpec {
        &self.spec
    }

    /// Total number of samples in the file.
    #[inline]
    pub fn num_samples(&self) -> usize {
        self.inner.len() as usize
    }
}

impl WavSource<BufReader<File>> {
    #[inline]
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, Error> {
        Self::new(hound::WavReader::open(path)?)
    }
}

impl<R> ReadSamples for WavSource<R>
where
    R: std::io::Read,
{
    type Error = Error;

    fn read_samples(&mut self, buffer: &mut [i16]) -> Result<usize, Self::Error> {
        let mut samples = self.inner.samples::<i16>();
        let mut n = 0;
        for slot in buffer.iter_mut() {
            let Some(sample) = samples.next()
            else {
                break;
            };
            *slot = sample?;
            n += 1;
        }
        Ok(n)
    }
}

impl<R> GetSampleRate for WavSource<R> {
    #[inline]
    fn sample_rate(&self) -> f32 {
        self.spec.sample_rate as f32
    }
}

/// Reads a whole WAV file.
pub fn read_wav(path: impl AsRef<Path>) -> Result<(Vec<i16>, f32), Error> {
    let source = WavSource::from_path(path)?;
    let sample_rate = source.sample_rate();
    let samples = source
        .inner
        .into_samples::<i16>()
        .collect::<Result<Vec<i16>, _>>()?;
    Ok((samples, sample_rate))
}
