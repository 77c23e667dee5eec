use std::{
    f32::consts::TAU,
    ops::{
        ControlFlow,
        Range,
    },
    sync::{
        Arc,
        atomic::{
            AtomicBool,
            Ordering,
        },
    },
    task::Poll,
};

use serde::{
    Deserialize,
    Serialize,
};

use crate::{
    GetSampleRate,
    filter::{
        FrequencyDiscriminator,
        Goertzel,
        SweepDemodulator,
    },
    modem::{
        fsk::FskDetector,
        sstv::{
            CHANNEL_HIGH_TONE,
            CHANNEL_LOW_TONE,
            PORCH_TONE,
            SYNC_TONE,
            VIS_DATA_BITS,
            VIS_ONE_TONE,
            VIS_SLOTS,
            VIS_ZERO_TONE,
            image::{
                Channel,
                FrameBufferMut,
                FrequencyBand,
                Pixel,
                quantize,
            },
            modes::{
                LineTiming,
                ModeSpecification,
                VisCode,
            },
            state::{
                State,
                SyncKind,
            },
            stream::StreamBuffer,
        },
    },
    source::{
        ReadSamples,
        Taper,
        synth::sweep_span,
    },
    util::duration_to_samples,
};

/// Windows with less energy than this (normalized units) are widened before
/// estimating their frequency.
const MIN_WINDOW_ENERGY: f32 = 0.05;

/// Limit for window widening, in pixel spans.
const MAX_WINDOW_SPANS: usize = 4;

/// Stride of the coarse VIS alignment search. The search is refined around
/// the best coarse offset.
const VIS_ALIGN_COARSE_STEP: usize = 8;

#[derive(Debug, thiserror::Error)]
pub enum DecodeError<S> {
    #[error("sample source error")]
    Source(#[source] S),
    #[error("sample rate mismatch: source runs at {actual} Hz, decoder at {expected} Hz")]
    SampleRateMismatch { expected: f32, actual: f32 },
}

/// How pixel values are recovered from a channel sweep.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PixelEstimator {
    /// Fits the frequency of every pixel to the whole sweep at once, using
    /// the phase of the preceding 1500 Hz tone for the first pixels. See
    /// [`SweepDemodulator`].
    #[default]
    SweepFit,
    /// Mean frequency of each pixel's span from a three-sample recurrence
    /// fit, with the taper divided out. The sweep glides towards the next
    /// pixel within the span, so sharp edges are blurred.
    Discriminator,
    /// Goertzel power at the band edges, `255 * high / (low + high)`, per
    /// span. Only meaningful for spans much longer than one period, and
    /// blurred like [`Discriminator`](Self::Discriminator).
    PowerRatio,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderConfig {
    pub pixel_estimator: PixelEstimator,
    /// Normalized Goertzel magnitude a sync or porch window must exceed.
    pub sync_threshold: f32,
    /// How far the VIS search window slides after a mismatch.
    pub vis_search_step_ms: f32,
    /// How much unconfirmable audio (in lines) is tolerated while waiting for
    /// a sync or porch, before the decoder gives up on the frame.
    pub lock_timeout_lines: f32,
    /// Buffered audio beyond this is dropped, oldest first.
    pub max_backlog_seconds: f32,
    /// Samples per read in [`SstvDecoder::run`].
    pub chunk_size: usize,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            pixel_estimator: PixelEstimator::default(),
            sync_threshold: 0.2,
            vis_search_step_ms: 1.0,
            lock_timeout_lines: 1.0,
            max_backlog_seconds: 30.0,
            chunk_size: 4096,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DecoderEvent {
    /// The VIS header matched, a new frame starts. `position` is the stream
    /// offset of the header's start.
    VisDetected { position: u64 },
    LineDecoded { row: usize },
    FrameComplete,
    /// Sync couldn't be confirmed, the current frame was abandoned.
    LockLost { row: usize, position: u64 },
}

/// Why [`SstvDecoder::run`] returned.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunExit {
    EndOfStream,
    Stopped,
    /// The event handler returned [`ControlFlow::Break`].
    Interrupted,
}

/// Shared flag that asks a running decoder to stop.
///
/// It is checked between chunks, so the decoder stops after at most one read.
#[derive(Clone, Debug, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn stop(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    #[inline]
    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[derive(Clone, Debug)]
struct Detectors {
    vis: FskDetector,
    sync: Goertzel,
    porch: Goertzel,
    channel_low: Goertzel,
    channel_high: Goertzel,
    discriminator: FrequencyDiscriminator,
    sweep: SweepDemodulator,
    /// Expected Teager energy over the middle of the VIS header, starting
    /// at `vis_model_start`.
    vis_model: Vec<f32>,
    vis_model_start: usize,
}

#[derive(derive_more::Debug)]
pub struct SstvDecoder<F> {
    mode: ModeSpecification,
    config: DecoderConfig,
    sample_rate: f32,
    timing: LineTiming,
    vis_search_step: usize,
    vis_align_span: usize,
    lock_timeout: usize,
    max_backlog: usize,

    #[debug(skip)]
    detectors: Detectors,
    #[debug(skip)]
    buffer: StreamBuffer,
    state: State,
    #[debug(skip)]
    line: Vec<Pixel>,
    #[debug(skip)]
    frequencies: Vec<f32>,

    #[debug(skip)]
    frame_buffer: F,
}

impl<F> SstvDecoder<F>
where
    F: FrameBufferMut,
{
    pub fn new(frame_buffer: F, mode: ModeSpecification, sample_rate: f32, config: DecoderConfig) -> Self {
        let timing = mode.line_timing(sample_rate);

        let vis_search_step = duration_to_samples(config.vis_search_step_ms, sample_rate).max(1);
        let lock_timeout = (config.lock_timeout_lines.max(0.0) * timing.line() as f32) as usize;
        // never trim below what a single step might need
        let max_backlog = ((config.max_backlog_seconds.max(0.0) * sample_rate) as usize)
            .max(2 * timing.line() + 2 * timing.vis_header());

        tracing::debug!(mode = %mode.name, sample_rate, ?timing, "decoder timing");

        let taper = Taper::new(timing.taper);
        let vis_tones = std::iter::once(SYNC_TONE)
            .chain(mode.vis_code.bits().map(|bit| if bit { VIS_ONE_TONE } else { VIS_ZERO_TONE }))
            .chain(std::iter::once(SYNC_TONE))
            .collect::<Vec<f32>>();
        let vis_model = vis_energy_model(timing.vis_bit, taper, &vis_tones, sample_rate);

        let detectors = Detectors {
            vis: FskDetector::new(sample_rate, VIS_ZERO_TONE, VIS_ONE_TONE),
            sync: Goertzel::new(sample_rate, SYNC_TONE),
            porch: Goertzel::new(sample_rate, PORCH_TONE),
            channel_low: Goertzel::new(sample_rate, CHANNEL_LOW_TONE),
            channel_high: Goertzel::new(sample_rate, CHANNEL_HIGH_TONE),
            discriminator: FrequencyDiscriminator::new(sample_rate),
            sweep: SweepDemodulator::new(sample_rate, taper, mode.pixels_per_line, timing.scan),
            vis_model,
            vis_model_start: timing.vis_bit / 2,
        };

        Self {
            line: vec![Pixel::BLACK; mode.pixels_per_line],
            frequencies: vec![0.0; mode.pixels_per_line],
            mode,
            config,
            sample_rate,
            timing,
            vis_search_step,
            vis_align_span: 3 * timing.vis_bit / 4,
            lock_timeout,
            max_backlog,
            detectors,
            // the tone before each sweep anchors its phase
            buffer: StreamBuffer::with_capacity(timing.line()).with_history(timing.porch.max(timing.separator)),
            state: State::default(),
            frame_buffer,
        }
    }

    #[inline]
    pub fn state(&self) -> State {
        self.state
    }

    #[inline]
    pub fn mode(&self) -> &ModeSpecification {
        &self.mode
    }

    /// Samples buffered but not consumed yet.
    #[inline]
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    #[inline]
    pub fn frame_buffer(&self) -> &F {
        &self.frame_buffer
    }

    #[inline]
    pub fn into_frame_buffer(self) -> F {
        self.frame_buffer
    }

    /// Appends samples and advances the state machine as far as the buffered
    /// audio allows.
    pub fn push_samples(&mut self, samples: &[i16]) -> Vec<DecoderEvent> {
        self.buffer.push(samples);

        let mut events = vec![];
        while self.step(&mut events).is_ready() {}

        let dropped = self.buffer.truncate_front(self.max_backlog);
        if dropped > 0 {
            tracing::warn!(
                dropped,
                max_backlog = self.max_backlog,
                "decoder is falling behind, dropped oldest samples"
            );
        }

        events
    }

    /// Drops all buffered audio and waits for the next VIS header.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.state = State::AwaitingVis;
    }

    /// Reads `source` in chunks and decodes until the stream ends, `stop` is
    /// set, or `on_event` breaks.
    pub fn run<R, H>(&mut self, mut source: R, stop: &StopSignal, mut on_event: H) -> Result<RunExit, DecodeError<R::Error>>
    where
        R: ReadSamples + GetSampleRate,
        H: FnMut(&DecoderEvent) -> ControlFlow<()>,
    {
        let actual = source.sample_rate();
        if (actual - self.sample_rate).abs() > 0.5 {
            return Err(DecodeError::SampleRateMismatch {
                expected: self.sample_rate,
                actual,
            });
        }

        let mut chunk = vec![0; self.config.chunk_size.max(1)];

        loop {
            if stop.is_stopped() {
                tracing::debug!("decoder stopped");
                return Ok(RunExit::Stopped);
            }

            let num_read = source.read_samples(&mut chunk).map_err(DecodeError::Source)?;
            if num_read == 0 {
                tracing::debug!("end of stream");
                return Ok(RunExit::EndOfStream);
            }

            for event in self.push_samples(&chunk[..num_read]) {
                if on_event(&event).is_break() {
                    return Ok(RunExit::Interrupted);
                }
            }
        }
    }

    /// Performs one step. Returns [`Poll::Pending`] if more samples are
    /// needed.
    pub fn step(&mut self, events: &mut Vec<DecoderEvent>) -> Poll<()> {
        match self.state {
            State::AwaitingVis => self.step_vis(events),
            State::AwaitingSync { row, kind } => self.step_tone(events, row, kind, ToneKind::Sync),
            State::AwaitingPorch { row, kind } => self.step_tone(events, row, kind, ToneKind::Porch),
            State::DecodingLine { row, channel } => self.step_channel(events, row, channel),
        }
    }

    fn step_vis(&mut self, events: &mut Vec<DecoderEvent>) -> Poll<()> {
        let slot = self.timing.vis_bit;
        let header_len = self.timing.vis_header();
        let Some(window) = self.buffer.peek(header_len + self.vis_align_span)
        else {
            return Poll::Pending;
        };

        // skip the start marker, ignore the stop marker
        let vis_code = window[..header_len]
            .chunks_exact(slot)
            .skip(1)
            .take(VIS_DATA_BITS)
            .map(|bit| self.detectors.vis.detect(bit))
            .collect::<Option<Vec<bool>>>()
            .map(VisCode::from_bits);

        if vis_code == Some(self.mode.vis_code) {
            let offset = vis_alignment(
                window,
                &self.detectors.vis_model,
                self.detectors.vis_model_start,
                self.vis_align_span,
            );
            let position = self.buffer.position() + offset as u64;
            tracing::debug!(vis_code = %self.mode.vis_code, position, offset, "vis header detected");

            self.buffer.consume(offset + header_len);
            self.frame_buffer
                .reset(self.mode.pixels_per_line, self.mode.num_lines);
            self.state = self.state.next(self.mode.num_lines);
            events.push(DecoderEvent::VisDetected { position });
        }
        else {
            self.buffer.consume(self.vis_search_step);
        }

        Poll::Ready(())
    }

    fn step_tone(&mut self, events: &mut Vec<DecoderEvent>, row: usize, kind: SyncKind, tone: ToneKind) -> Poll<()> {
        let (detector, window_len) = match tone {
            ToneKind::Sync => (&self.detectors.sync, self.timing.sync),
            ToneKind::Porch => (&self.detectors.porch, self.timing.porch),
        };

        let Some(window) = self.buffer.peek(window_len)
        else {
            return Poll::Pending;
        };

        let magnitude = detector.magnitude(window);
        if magnitude > self.config.sync_threshold {
            self.buffer.consume(window_len);
            self.state = self.state.next(self.mode.num_lines);
            Poll::Ready(())
        }
        else if self.buffer.len() >= window_len + self.lock_timeout {
            let position = self.buffer.position();
            tracing::warn!(row, ?kind, ?tone, magnitude, position, "lost lock");
            self.state = State::AwaitingVis;
            events.push(DecoderEvent::LockLost { row, position });
            Poll::Ready(())
        }
        else {
            Poll::Pending
        }
    }

    fn step_channel(&mut self, events: &mut Vec<DecoderEvent>, row: usize, channel: Channel) -> Poll<()> {
        let scan = self.timing.scan;
        let trailing = if channel.next().is_some() {
            self.timing.separator
        }
        else {
            self.timing.pad
        };

        let Some(segment) = self.buffer.peek(scan + trailing)
        else {
            return Poll::Pending;
        };
        let segment = &segment[..scan];
        let lead_in = if channel == Channel::Green {
            self.timing.porch
        }
        else {
            self.timing.separator
        };
        let lead_in = self.buffer.peek_behind(lead_in);

        let band = channel.band();
        let width = self.line.len();
        match self.config.pixel_estimator {
            PixelEstimator::PowerRatio => {
                for (x, pixel) in self.line.iter_mut().enumerate() {
                    let span = sweep_span(x, width, scan);
                    pixel.set_channel(channel, self.detectors.estimate_power_ratio(&segment[span]));
                }
            }
            estimator => {
                for (x, frequency) in self.frequencies.iter_mut().enumerate() {
                    let span = sweep_span(x, width, scan);
                    *frequency = self
                        .detectors
                        .estimate_discriminator(segment, span)
                        .unwrap_or(band.low);
                }
                if estimator == PixelEstimator::SweepFit {
                    self.detectors
                        .estimate_sweep(segment, lead_in, band, &mut self.frequencies);
                }
                for (pixel, frequency) in self.line.iter_mut().zip(&self.frequencies) {
                    pixel.set_channel(channel, band.value(*frequency));
                }
            }
        }

        self.buffer.consume(scan + trailing);

        if channel.next().is_none() {
            for (x, pixel) in self.line.iter().enumerate() {
                self.frame_buffer.set_pixel(x, row, *pixel);
            }
            tracing::trace!(row, "line decoded");
            events.push(DecoderEvent::LineDecoded { row });

            if row + 1 >= self.mode.num_lines {
                tracing::debug!(position = self.buffer.position(), "frame complete");
                events.push(DecoderEvent::FrameComplete);
            }
        }

        self.state = self.state.next(self.mode.num_lines);
        Poll::Ready(())
    }
}

#[derive(Clone, Copy, Debug)]
enum ToneKind {
    Sync,
    Porch,
}

/// Teager energy `x[n]² - x[n - 1] x[n + 1]` a header with unit amplitude
/// has from the middle of its start marker to the middle of its stop marker.
///
/// For a tapered tone this is `g[n - 1] g[n + 1] sin²(ω)`: it follows the
/// envelope without the ripple of `x²`, and the tapered slot edges make it
/// drop to zero at every slot boundary.
fn vis_energy_model(slot: usize, taper: Taper, tones: &[f32], sample_rate: f32) -> Vec<f32> {
    (slot / 2..(VIS_SLOTS - 1) * slot + slot / 2)
        .map(|n| {
            let (k, i) = (n / slot, n % slot);
            let previous = if i > 0 { taper.gain(i - 1, slot) } else { 0.0 };
            let next = if i + 1 < slot { taper.gain(i + 1, slot) } else { 0.0 };
            previous * next * (TAU * tones[k] / sample_rate).sin().powi(2)
        })
        .collect()
}

/// Offset within `0..=span` at which the Teager energy of `window` correlates
/// best with `model`, which starts `model_start` samples into the header.
fn vis_alignment(window: &[f32], model: &[f32], model_start: usize, span: usize) -> usize {
    if model_start == 0 || model.is_empty() {
        return 0;
    }
    let Some(span) = window
        .len()
        .checked_sub(model_start + model.len() + 1)
        .map(|max_offset| span.min(max_offset))
    else {
        return 0;
    };

    let score = |offset: usize| {
        let start = offset + model_start;
        model
            .iter()
            .enumerate()
            .map(|(j, weight)| {
                let n = start + j;
                let energy = window[n] * window[n] - window[n - 1] * window[n + 1];
                f64::from(weight * energy)
            })
            .sum::<f64>()
    };
    let coarse = best_offset((0..=span).step_by(VIS_ALIGN_COARSE_STEP), &score);
    best_offset(
        coarse.saturating_sub(VIS_ALIGN_COARSE_STEP)..=(coarse + VIS_ALIGN_COARSE_STEP).min(span),
        &score,
    )
}

fn best_offset(offsets: impl Iterator<Item = usize>, score: impl Fn(usize) -> f64) -> usize {
    offsets
        .map(|offset| (offset, score(offset)))
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map_or(0, |(offset, _)| offset)
}

impl Detectors {
    /// Frequency in the `span` of a channel sweep `segment`.
    ///
    /// Windows at the tapered ends of the sweep carry little energy. These are
    /// grown until the fit has enough to work with.
    fn estimate_discriminator(&self, segment: &[f32], span: Range<usize>) -> Option<f32> {
        let grow = span.len().div_ceil(2).max(1);
        let max_len = MAX_WINDOW_SPANS * span.len().max(1);
        let mut window = span;

        loop {
            let moments = self
                .discriminator
                .moments(segment, Some(self.sweep.envelope()), window.clone());

            let exhausted = window.len() >= max_len || (window.start == 0 && window.end >= segment.len());
            if moments.energy >= MIN_WINDOW_ENERGY || exhausted {
                return moments.frequency(self.discriminator.sample_rate());
            }

            window = window.start.saturating_sub(grow)..(window.end + grow).min(segment.len());
        }
    }

    /// Refines per-span `frequencies` of a channel sweep `segment` with the
    /// sweep fit. `lead_in` is the tone just before the sweep, if buffered.
    fn estimate_sweep(&self, segment: &[f32], lead_in: Option<&[f32]>, band: FrequencyBand, frequencies: &mut [f32]) {
        let range = band.low..=band.high;
        self.sweep.refine(segment, frequencies, range.clone());

        let phase = lead_in.and_then(|lead_in| self.sweep.lead_in_phase(lead_in, PORCH_TONE));
        if let Some(phase) = phase {
            if !self.sweep.anchor(segment, frequencies, phase, range) {
                tracing::trace!("sweep start left unanchored");
            }
        }
    }

    fn estimate_power_ratio(&self, window: &[f32]) -> u8 {
        let low = self.channel_low.power(window);
        let high = self.channel_high.power(window);
        quantize(high / (low + high + 1e-12))
    }
}
