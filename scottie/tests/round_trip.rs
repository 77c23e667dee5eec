mod common;

use common::*;
use scottie::modem::sstv::DecoderEvent;

#[test]
fn gradient_survives_a_noiseless_channel() {
    init_tracing();

    let mode = mode(8);
    let image = gradient_image(320, 8);
    let samples = encode(&image, mode.clone());

    let mut decoder = decoder(mode);
    let events = decoder.push_samples(&samples);
    assert_eq!(events.first(), Some(&DecoderEvent::VisDetected { position: 0 }));
    assert_eq!(events.last(), Some(&DecoderEvent::FrameComplete));

    let decoded = decoder.into_frame_buffer();
    let error = max_channel_error(&image, &decoded);
    assert!(error <= 2, "max channel error {error}");
}

#[test]
fn color_bars_survive_a_noiseless_channel() {
    let mode = mode(8);
    let image = color_bars(320, 8);
    let samples = encode(&image, mode.clone());

    let mut decoder = decoder(mode);
    decoder.push_samples(&samples);

    let decoded = decoder.into_frame_buffer();
    let error = max_channel_error(&image, &decoded);
    assert!(error <= 2, "max channel error {error}");
}

#[test]
fn vertical_stripes_keep_their_edges() {
    let mode = mode(4);
    let image = vertical_stripes(320, 4, 8);
    let samples = encode(&image, mode.clone());

    let mut decoder = decoder(mode);
    decoder.push_samples(&samples);

    let decoded = decoder.into_frame_buffer();
    let error = max_channel_error(&image, &decoded);
    assert!(error <= 2, "max channel error {error}");
}

#[test]
fn step_edge_is_not_smeared() {
    let mode = mode(4);
    let image = step_edge(320, 4, 160, 20, 220);
    let samples = encode(&image, mode.clone());

    let mut decoder = decoder(mode);
    decoder.push_samples(&samples);

    let decoded = decoder.into_frame_buffer();
    for y in 0..4 {
        assert!(decoded.get_pixel(159, y).0[0].abs_diff(20) <= 2, "row {y}: {:?}", decoded.get_pixel(159, y));
        assert!(decoded.get_pixel(160, y).0[0].abs_diff(220) <= 2, "row {y}: {:?}", decoded.get_pixel(160, y));
    }
    let error = max_channel_error(&image, &decoded);
    assert!(error <= 2, "max channel error {error}");
}

#[test]
fn random_pixels_survive_a_noiseless_channel() {
    let mode = mode(8);
    let image = random_image(320, 8, 0x5c07);
    let samples = encode(&image, mode.clone());

    let mut decoder = decoder(mode);
    decoder.push_samples(&samples);

    let decoded = decoder.into_frame_buffer();
    let error = max_channel_error(&image, &decoded);
    assert!(error <= 2, "max channel error {error}");
}

#[test]
fn full_frame_round_trip() {
    let mode = scottie::modem::sstv::ModeSpecification::SCOTTIE_DX;
    let image = gradient_image(320, 256);
    let samples = encode(&image, mode.clone());

    let mut decoder = decoder(mode);
    let events = decoder.push_samples(&samples);

    assert_eq!(decoded_rows(&events), (0..256).collect::<Vec<usize>>());

    let decoded = decoder.into_frame_buffer();
    let error = max_channel_error(&image, &decoded);
    assert!(error <= 2, "max channel error {error}");
}

#[test]
fn leading_silence_is_skipped() {
    let mode = mode(4);
    let image = color_bars(320, 4);

    let mut samples = vec![0; 12_345];
    samples.extend(encode(&image, mode.clone()));

    let mut decoder = decoder(mode);
    let events = decoder.push_samples(&samples);
    assert!(matches!(
        events.first(),
        Some(DecoderEvent::VisDetected { position }) if position.abs_diff(12_345) <= 2
    ));
    assert_eq!(events.last(), Some(&DecoderEvent::FrameComplete));

    let decoded = decoder.into_frame_buffer();
    let error = max_channel_error(&image, &decoded);
    assert!(error <= 2, "max channel error {error}");
}

#[test]
fn consecutive_frames_are_decoded() {
    let mode = mode(2);
    let first = color_bars(320, 2);
    let second = gradient_image(320, 2);

    let mut samples = encode(&first, mode.clone());
    samples.extend(encode(&second, mode.clone()));

    let mut decoder = decoder(mode);
    let events = decoder.push_samples(&samples);
    let frames = events
        .iter()
        .filter(|event| **event == DecoderEvent::FrameComplete)
        .count();
    assert_eq!(frames, 2);

    let decoded = decoder.into_frame_buffer();
    let error = max_channel_error(&second, &decoded);
    assert!(error <= 2, "max channel error {error}");
}
