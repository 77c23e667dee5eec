//! Sound card playback (rodio) and capture (cpal).
//!
//! `cpal` streams are not `Send` on every platform, so open devices on the
//! thread that uses them.

use cpal::traits::{
    DeviceTrait,
    HostTrait,
    StreamTrait,
};
use crossbeam::channel::{
    self,
    TrySendError,
};

use crate::{
    GetSampleRate,
    sample::FromSample,
    sink::WriteSamples,
    source::ReadSamples,
};

/// Samples per capture callback assumed when sizing the capture queue.
/// Devices typically deliver a few hundred to a few thousand.
const CALLBACK_LEN_HINT: f32 = 1024.0;

type Chunk = Result<Vec<i16>, cpal::StreamError>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("could not open audio output")]
    Output(#[from] rodio::StreamError),
    #[error("no audio input device available")]
    NoInputDevice,
    #[error("could not open audio input")]
    BuildStream(#[from] cpal::BuildStreamError),
    #[error("could not start audio input")]
    PlayStream(#[from] cpal::PlayStreamError),
    #[error("audio input failed")]
    Stream(#[from] cpal::StreamError),
    #[error("audio input stream closed")]
    Disconnected,
}

/// Plays samples on the default output device.
#[derive(derive_more::Debug)]
pub struct AudioOutput {
    #[debug(skip)]
    sink: rodio::Sink,
    // must outlive the sink
    #[debug(skip)]
    _stream: rodio::OutputStream,
    sample_rate: f32,
}

impl AudioOutput {
    pub fn open(sample_rate: f32) -> Result<Self, Error> {
        let stream = rodio::OutputStreamBuilder::open_default_stream()?;
        let sink = rodio::Sink::connect_new(stream.mixer());
        tracing::debug!(sample_rate, "opened audio output");
        Ok(Self {
            sink,
            _stream: stream,
            sample_rate,
        })
    }
}

impl WriteSamples for AudioOutput {
    type Error = Error;

    fn write_samples(&mut self, samples: &[i16]) -> Result<(), Self::Error> {
        let samples = samples
            .iter()
            .map(|sample| f32::from_sample(*sample))
            .collect::<Vec<f32>>();
        self.sink.append(rodio::buffer::SamplesBuffer::new(
            1,
            self.sample_rate as u32,
            samples,
        ));
        Ok(())
    }

    fn drain(&mut self) -> Result<(), Self::Error> {
        self.sink.sleep_until_end();
        Ok(())
    }

    fn close(&mut self) -> Result<(), Self::Error> {
        self.drain()?;
        self.sink.stop();
        Ok(())
    }
}

impl GetSampleRate for AudioOutput {
    #[inline]
    fn sample_rate(&self) -> f32 {
        self.sample_rate
    }
}

/// Records 16-bit mono from the default input device.
///
/// The capture callback hands chunks over a bounded channel, `read_samples`
/// blocks on it. If the reader falls behind by more than the backlog given
/// to [`open`](Self::open), new chunks are dropped.
#[derive(derive_more::Debug)]
pub struct AudioInput {
    #[debug(skip)]
    _stream: cpal::Stream,
    #[debug(skip)]
    receiver: channel::Receiver<Chunk>,
    pending: Vec<i16>,
    sample_rate: f32,
}

impl AudioInput {
    /// Opens the default input device. About `max_backlog_seconds` of audio
    /// are queued for the reader.
    pub fn open(sample_rate: f32, max_backlog_seconds: f32) -> Result<Self, Error> {
        let host = cpal::default_host();
        let device = host.default_input_device().ok_or(Error::NoInputDevice)?;

        let config = cpal::StreamConfig {
            channels: 1,
            sample_rate: cpal::SampleRate(sample_rate as u32),
            buffer_size: cpal::BufferSize::Default,
        };

        let capacity = queue_capacity(sample_rate, max_backlog_seconds);
        let (sender, receiver) = channel::bounded(capacity);
        let error_sender = sender.clone();

        let stream = device.build_input_stream(
            &config,
            move |data: &[i16], _info: &cpal::InputCallbackInfo| forward(&sender, Ok(data.to_vec())),
            move |error| forward(&error_sender, Err(error)),
            None,
        )?;
        stream.play()?;

        tracing::debug!(device = ?device.name().ok(), sample_rate, capacity, "opened audio input");

        Ok(Self {
            _stream: stream,
            receiver,
            pending: vec![],
            sample_rate,
        })
    }
}

/// Number of capture callbacks queued before chunks are dropped.
fn queue_capacity(sample_rate: f32, max_backlog_seconds: f32) -> usize {
    (sample_rate * max_backlog_seconds.max(0.0) / CALLBACK_LEN_HINT)
        .ceil()
        .max(1.0) as usize
}

/// Hands a chunk to the reader without blocking the capture thread.
fn forward(sender: &channel::Sender<Chunk>, chunk: Chunk) {
    match sender.try_send(chunk) {
        // the receiver is gone once the input is dropped
        Ok(()) | Err(TrySendError::Disconnected(_)) => {}
        Err(TrySendError::Full(chunk)) => {
            tracing::warn!(
                num_samples = chunk.as_ref().map_or(0, Vec::len),
                "audio input is falling behind, dropped samples"
            );
        }
    }
}

impl ReadSamples for AudioInput {
    type Error = Error;

    fn read_samples(&mut self, buffer: &mut [i16]) -> Result<usize, Self::Error> {
        while self.pending.is_empty() {
            match self.receiver.recv() {
                Ok(Ok(chunk)) => self.pending = chunk,
                Ok(Err(error)) => return Err(error.into()),
                Err(channel::RecvError) => return Err(Error::Disconnected),
            }
        }

        let n = self.pending.len().min(buffer.len());
        buffer[..n].copy_from_slice(&self.pending[..n]);
        self.pending.drain(..n);
        Ok(n)
    }
}

impl GetSampleRate for AudioInput {
    #[inline]
    fn sample_rate(&self) -> f32 {
        self.sample_rate
    }
}
