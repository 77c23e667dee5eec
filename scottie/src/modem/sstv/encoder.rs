use crate::{
    modem::{
        fsk::FskModulator,
        sstv::{
            PORCH_TONE,
            SYNC_TONE,
            VIS_ONE_TONE,
            VIS_ZERO_TONE,
            image::{
                Channel,
                FrameBuffer,
            },
            modes::{
                LineTiming,
                ModeSpecification,
                VisCode,
            },
        },
    },
    source::{
        SynthError,
        Synthesizer,
        Taper,
    },
};

#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error("can't encode an empty image ({width}x{height})")]
    EmptyImage { width: usize, height: usize },
    #[error("synthesis failed")]
    Synth(#[from] SynthError),
}

#[derive(Clone, Debug)]
pub struct SstvEncoder {
    mode: ModeSpecification,
    sample_rate: f32,
    timing: LineTiming,
}

impl SstvEncoder {
    pub fn new(mode: ModeSpecification, sample_rate: f32) -> Self {
        let timing = mode.line_timing(sample_rate);
        Self {
            mode,
            sample_rate,
            timing,
        }
    }

    #[inline]
    pub fn mode(&self) -> &ModeSpecification {
        &self.mode
    }

    #[inline]
    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    /// Number of samples `encode` produces for an image with `height` rows.
    pub fn encoded_len(&self, height: usize) -> usize {
        self.timing.vis_header() + self.timing.sync + self.timing.porch + height * self.timing.line()
    }

    /// Renders a complete transmission of `image`.
    ///
    /// Every row of the image becomes one line and every column one pixel
    /// of the channel sweeps, so the image should already have the mode's
    /// geometry for a receiver to pick it up.
    pub fn encode<F>(&self, image: &F, vis_code: VisCode) -> Result<Vec<i16>, EncodeError>
    where
        F: FrameBuffer,
    {
        let width = image.width();
        let height = image.height();
        if width == 0 || height == 0 {
            return Err(EncodeError::EmptyImage { width, height });
        }

        if width != self.mode.pixels_per_line || height != self.mode.num_lines {
            tracing::warn!(
                width,
                height,
                mode_width = self.mode.pixels_per_line,
                mode_height = self.mode.num_lines,
                "image geometry differs from the mode"
            );
        }

        let mut synth = Synthesizer::with_capacity(
            self.sample_rate,
            Taper::new(self.timing.taper),
            self.encoded_len(height),
        );

        self.render_vis_header(&mut synth, vis_code)?;

        // vertical sync
        synth.render_tone(SYNC_TONE, self.mode.sync_ms, true)?;
        synth.render_tone(PORCH_TONE, self.mode.porch_ms, true)?;

        let mut frequencies = Vec::with_capacity(width);
        for y in 0..height {
            self.render_line(&mut synth, image, y, &mut frequencies)?;
        }

        tracing::debug!(
            %vis_code,
            width,
            height,
            num_samples = synth.len(),
            "encoded image"
        );

        Ok(synth.into_samples())
    }

    fn render_vis_header(&self, synth: &mut Synthesizer, vis_code: VisCode) -> Result<(), EncodeError> {
        // start marker
        synth.render_tone(SYNC_TONE, self.mode.vis_bit_ms, true)?;

        FskModulator::new(VIS_ZERO_TONE, VIS_ONE_TONE, self.mode.vis_bit_ms)
            .render_bits(synth, vis_code.bits())?;

        // stop marker
        synth.render_tone(SYNC_TONE, self.mode.vis_bit_ms, true)?;

        Ok(())
    }

    fn render_line<F>(
        &self,
        synth: &mut Synthesizer,
        image: &F,
        y: usize,
        frequencies: &mut Vec<f32>,
    ) -> Result<(), EncodeError>
    where
        F: FrameBuffer,
    {
        let start = synth.len();

        synth.render_tone(SYNC_TONE, self.mode.sync_ms, true)?;
        synth.render_tone(PORCH_TONE, self.mode.porch_ms, true)?;

        for channel in Channel::ALL {
            let band = channel.band();
            frequencies.clear();
            frequencies.extend((0..image.width()).map(|x| band.frequency(image.pixel(x, y).channel(channel))));

            synth.render_sweep(frequencies, self.mode.scan_ms)?;

            if channel.next().is_some() {
                synth.render_tone(PORCH_TONE, self.mode.separator_ms, true)?;
            }
        }

        let used = synth.len() - start;
        synth.render_silence_samples(self.timing.line().saturating_sub(used));

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use image::RgbImage;

    use super::*;
    use crate::modem::sstv::VIS_CODE;

    fn encoder() -> SstvEncoder {
        SstvEncoder::new(ModeSpecification::SCOTTIE_DX, 44100.0)
    }

    #[test]
    fn empty_image_is_rejected() {
        let image = RgbImage::new(0, 10);
        assert!(matches!(
            encoder().encode(&image, VIS_CODE),
            Err(EncodeError::EmptyImage {
                width: 0,
                height: 10
            })
        ));
    }

    #[test]
    fn output_has_fixed_length() {
        let encoder = encoder();
        let image = RgbImage::new(320, 3);
        let samples = encoder.encode(&image, VIS_CODE).unwrap();
        assert_eq!(samples.len(), encoder.encoded_len(3));
        assert_eq!(samples.len(), 13230 + 396 + 66 + 3 * 19625);
    }

    #[test]
    fn lines_end_in_silence() {
        let encoder = encoder();
        let image = RgbImage::from_pixel(320, 2, image::Rgb([255, 255, 255]));
        let samples = encoder.encode(&image, VIS_CODE).unwrap();

        let header = 13230 + 396 + 66;
        for row in 0..2 {
            let line = &samples[header + row * 19625..header + (row + 1) * 19625];
            assert!(line[19625 - 743..].iter().all(|x| *x == 0));
            assert!(line[..19625 - 743].iter().any(|x| *x != 0));
        }
    }

    #[test]
    fn header_starts_tapered() {
        let samples = encoder().encode(&RgbImage::new(1, 1), VIS_CODE).unwrap();
        assert_eq!(samples[0], 0);
    }
}
