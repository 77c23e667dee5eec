use std::{
    ops::ControlFlow,
    path::Path,
};

use image::RgbImage;
use scottie::{
    GetSampleRate,
    modem::sstv::{
        DecoderEvent,
        RunExit,
        SstvDecoder,
        StopSignal,
    },
    source::{
        ReadSamples,
        WavSource,
    },
};

use crate::{
    Error,
    config::Config,
    files::frame_path,
};

/// Decodes frames from `source` and writes each one as it completes.
///
/// Returns the number of frames written. A frame cut off by the end of the
/// stream is written too, with the rows that never arrived left black.
fn receive_frames<R>(
    config: &Config,
    mut source: R,
    output: &Path,
    max_frames: Option<usize>,
    stop: &StopSignal,
) -> Result<usize, Error>
where
    R: ReadSamples + GetSampleRate,
    R::Error: std::error::Error + Send + Sync + 'static,
{
    let mut decoder = SstvDecoder::new(
        RgbImage::new(0, 0),
        config.mode.clone(),
        source.sample_rate(),
        config.decoder.clone(),
    );
    let mut num_frames = 0;

    let save = |image: &RgbImage, index: usize| -> Result<(), Error> {
        let path = frame_path(output, index);
        image.save(&path)?;
        tracing::info!(path = %path.display(), "Saved frame");
        Ok(())
    };

    loop {
        if max_frames.is_some_and(|max_frames| num_frames >= max_frames) {
            break;
        }

        let exit = decoder.run(&mut source, stop, |event| {
            match event {
                DecoderEvent::VisDetected { position } => {
                    tracing::info!(position, "Receiving frame");
                }
                DecoderEvent::LockLost { row, .. } => {
                    tracing::info!(row, "Lost frame");
                }
                DecoderEvent::FrameComplete => return ControlFlow::Break(()),
                DecoderEvent::LineDecoded { .. } => {}
            }
            ControlFlow::Continue(())
        })?;

        match exit {
            RunExit::Interrupted => {
                save(decoder.frame_buffer(), num_frames)?;
                num_frames += 1;
            }
            RunExit::EndOfStream | RunExit::Stopped => {
                if decoder.state().is_locked() {
                    tracing::warn!(row = decoder.state().row(), "Stream ended mid-frame, saving partial frame");
                    save(decoder.frame_buffer(), num_frames)?;
                    num_frames += 1;
                }
                break;
            }
        }
    }

    Ok(num_frames)
}

pub fn decode(config: &Config, input: &Path, output: &Path, stop: &StopSignal) -> Result<(), Error> {
    let source = WavSource::from_path(input)?;
    tracing::info!(
        path = %input.display(),
        sample_rate = source.sample_rate(),
        num_samples = source.num_samples(),
        "Decoding WAV file"
    );

    let num_frames = receive_frames(config, source, output, None, stop)?;
    if num_frames == 0 {
        tracing::warn!("No frame found");
    }
    else {
        tracing::info!(num_frames, "Done");
    }

    Ok(())
}

#[cfg(feature = "audio")]
pub fn receive(
    config: &Config,
    sample_rate: f32,
    output: &Path,
    max_frames: Option<usize>,
    stop: &StopSignal,
) -> Result<(), Error> {
    use scottie::audio::AudioInput;

    let input = AudioInput::open(sample_rate, config.decoder.max_backlog_seconds)?;
    tracing::info!(sample_rate, "Listening, press Ctrl-C to stop");

    let num_frames = receive_frames(config, input, output, max_frames, stop)?;
    tracing::info!(num_frames, "Done");

    Ok(())
}
