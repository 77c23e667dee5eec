#![allow(dead_code)]

use image::{
    Rgb,
    RgbImage,
};
use rand::{
    Rng,
    SeedableRng,
    rngs::SmallRng,
};
use scottie::modem::sstv::{
    DecoderConfig,
    DecoderEvent,
    ModeSpecification,
    SstvDecoder,
    SstvEncoder,
    VIS_CODE,
};

pub const SAMPLE_RATE: f32 = 44100.0;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

pub fn mode(num_lines: usize) -> ModeSpecification {
    ModeSpecification {
        num_lines,
        ..ModeSpecification::SCOTTIE_DX
    }
}

/// Smooth horizontal ramps, different per channel and row.
pub fn gradient_image(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        let ramp = (x / 4) as u8;
        Rgb([ramp, 255 - (8 * y % 256) as u8, 200u8.saturating_sub(ramp)])
    })
}

/// Rows of solid colors, including the band edges.
pub fn color_bars(width: u32, height: u32) -> RgbImage {
    const COLORS: [[u8; 3]; 8] = [
        [0, 0, 0],
        [255, 255, 255],
        [255, 0, 0],
        [0, 255, 0],
        [0, 0, 255],
        [128, 64, 32],
        [17, 200, 99],
        [250, 5, 128],
    ];
    RgbImage::from_fn(width, height, |_x, y| Rgb(COLORS[y as usize % COLORS.len()]))
}

/// Alternating black and white vertical stripes, `stripe` pixels wide.
pub fn vertical_stripes(width: u32, height: u32, stripe: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, _y| {
        if (x / stripe) % 2 == 0 {
            Rgb([0; 3])
        }
        else {
            Rgb([255; 3])
        }
    })
}

/// A single vertical edge from `low` to `high` at column `at`.
pub fn step_edge(width: u32, height: u32, at: u32, low: u8, high: u8) -> RgbImage {
    RgbImage::from_fn(width, height, |x, _y| Rgb([if x < at { low } else { high }; 3]))
}

/// Uniformly random pixels, reproducible from `seed`.
pub fn random_image(width: u32, height: u32, seed: u64) -> RgbImage {
    let mut rng = SmallRng::seed_from_u64(seed);
    RgbImage::from_fn(width, height, |_x, _y| Rgb(rng.r#gen()))
}

pub fn encode(image: &RgbImage, mode: ModeSpecification) -> Vec<i16> {
    SstvEncoder::new(mode, SAMPLE_RATE)
        .encode(image, VIS_CODE)
        .unwrap()
}

pub fn decoder(mode: ModeSpecification) -> SstvDecoder<RgbImage> {
    SstvDecoder::new(
        RgbImage::new(0, 0),
        mode,
        SAMPLE_RATE,
        DecoderConfig::default(),
    )
}

/// Largest per-channel difference between two images of equal size.
pub fn max_channel_error(expected: &RgbImage, actual: &RgbImage) -> u8 {
    assert_eq!(expected.dimensions(), actual.dimensions());
    expected
        .pixels()
        .zip(actual.pixels())
        .flat_map(|(a, b)| (0..3).map(move |c| a.0[c].abs_diff(b.0[c])))
        .max()
        .unwrap_or_default()
}

/// Average per-channel difference between two images of equal size.
pub fn mean_channel_error(expected: &RgbImage, actual: &RgbImage) -> f32 {
    assert_eq!(expected.dimensions(), actual.dimensions());
    let total = expected
        .pixels()
        .zip(actual.pixels())
        .flat_map(|(a, b)| (0..3).map(move |c| u32::from(a.0[c].abs_diff(b.0[c]))))
        .sum::<u32>();
    total as f32 / (3 * expected.width() * expected.height()).max(1) as f32
}

/// Rows reported as decoded, in order.
pub fn decoded_rows(events: &[DecoderEvent]) -> Vec<usize> {
    events
        .iter()
        .filter_map(|event| {
            match event {
                DecoderEvent::LineDecoded { row } => Some(*row),
                _ => None,
            }
        })
        .collect()
}
