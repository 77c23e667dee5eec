use std::path::Path;

use image::{
    RgbImage,
    imageops::FilterType,
};
use scottie::{
    modem::sstv::{
        ModeSpecification,
        SstvEncoder,
    },
    sink::file::write_wav,
    source::noise::{
        seeded_white_noise,
        white_noise,
    },
    util::samples_to_duration,
};

use crate::{
    Error,
    config::Config,
};

/// Loads an image and scales it to the geometry of `mode`.
pub fn load_image(path: &Path, mode: &ModeSpecification) -> Result<RgbImage, Error> {
    let image = image::open(path)?;
    let width = mode.pixels_per_line as u32;
    let height = mode.num_lines as u32;

    if (image.width(), image.height()) == (width, height) {
        Ok(image.to_rgb8())
    }
    else {
        tracing::info!(
            from = ?(image.width(), image.height()),
            to = ?(width, height),
            "Resizing image"
        );
        Ok(image.resize_exact(width, height, FilterType::Triangle).to_rgb8())
    }
}

/// Renders the transmission for the image at `path`.
pub fn render(config: &Config, sample_rate: f32, path: &Path) -> Result<Vec<i16>, Error> {
    let image = load_image(path, &config.mode)?;

    let samples = SstvEncoder::new(config.mode.clone(), sample_rate).encode(&image, config.mode.vis_code)?;
    tracing::info!(
        mode = %config.mode.name,
        num_samples = samples.len(),
        duration_s = samples_to_duration(samples.len(), sample_rate) / 1000.0,
        "Encoded image"
    );

    Ok(samples)
}

pub fn encode(
    config: &Config,
    sample_rate: f32,
    image: &Path,
    output: &Path,
    noise: Option<f32>,
    seed: Option<u64>,
) -> Result<(), Error> {
    let mut samples = render(config, sample_rate, image)?;

    if let Some(amplitude) = noise {
        tracing::info!(amplitude, ?seed, "Adding white noise");
        match seed {
            Some(seed) => seeded_white_noise(amplitude, seed).add_to(&mut samples),
            None => white_noise(amplitude).add_to(&mut samples),
        }
    }

    write_wav(output, &samples, sample_rate)?;
    tracing::info!(path = %output.display(), "Wrote WAV file");

    Ok(())
}

/// Renders the image and plays it back, blocking until playback is done.
#[cfg(feature = "audio")]
pub fn play(config: &Config, sample_rate: f32, image: &Path) -> Result<(), Error> {
    use scottie::{
        audio::AudioOutput,
        sink::WriteSamples,
    };

    let samples = render(config, sample_rate, image)?;

    let mut output = AudioOutput::open(sample_rate)?;
    output.write_samples(&samples)?;
    tracing::info!("Playing");
    output.close()?;

    Ok(())
}
