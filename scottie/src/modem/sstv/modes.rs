use std::{
    borrow::Cow,
    fmt,
};

use serde::{
    Deserialize,
    Serialize,
};

use crate::{
    modem::sstv::{
        VIS_DATA_BITS,
        image::Channel,
    },
    util::{
        duration_to_samples,
        duration_to_samples_rounded,
    },
};

/// 8-bit mode identifier sent in the VIS header.
///
/// Bits are transmitted least significant first.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VisCode(u8);

impl VisCode {
    #[inline]
    pub const fn new(code: u8) -> Self {
        Self(code)
    }

    #[inline]
    pub const fn get(&self) -> u8 {
        self.0
    }

    #[inline]
    pub fn bits(self) -> impl Iterator<Item = bool> {
        (0..VIS_DATA_BITS).map(move |i| (self.0 >> i) & 1 != 0)
    }

    /// Assembles a code from bits in transmission order. Bits beyond the 8th
    /// are ignored.
    pub fn from_bits(bits: impl IntoIterator<Item = bool>) -> Self {
        Self(
            bits.into_iter()
                .take(VIS_DATA_BITS)
                .enumerate()
                .fold(0, |code, (i, bit)| code | (u8::from(bit) << i)),
        )
    }
}

impl From<u8> for VisCode {
    #[inline]
    fn from(value: u8) -> Self {
        Self(value)
    }
}

impl fmt::Display for VisCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#04x}", self.0)
    }
}

/// Timing and geometry of a transmission mode. All durations are in
/// milliseconds.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModeSpecification {
    pub name: Cow<'static, str>,
    pub vis_code: VisCode,
    pub pixels_per_line: usize,
    pub num_lines: usize,
    pub vis_bit_ms: f32,
    pub sync_ms: f32,
    pub porch_ms: f32,
    pub scan_ms: f32,
    pub separator_ms: f32,
    /// Fixed length of one line, the remainder after sync, porch, scans and
    /// separators is filled with silence.
    pub line_ms: f32,
    /// Length of the raised-cosine fade at each end of a tone.
    pub taper_ms: f32,
}

impl ModeSpecification {
    pub const SCOTTIE_DX: Self = Self {
        name: Cow::Borrowed("Scottie DX"),
        vis_code: super::VIS_CODE,
        pixels_per_line: 320,
        num_lines: 256,
        vis_bit_ms: 30.0,
        sync_ms: 9.0,
        porch_ms: 1.5,
        scan_ms: 138.24,
        separator_ms: 1.5,
        line_ms: 445.0,
        taper_ms: 5.0,
    };

    /// Segment lengths in samples.
    ///
    /// Encoder and decoder both derive their framing from this, so they agree
    /// to the sample.
    pub fn line_timing(&self, sample_rate: f32) -> LineTiming {
        let samples = |duration_ms| duration_to_samples(duration_ms, sample_rate);

        let sync = samples(self.sync_ms);
        let porch = samples(self.porch_ms);
        let scan = samples(self.scan_ms);
        let separator = samples(self.separator_ms);
        let line = duration_to_samples_rounded(self.line_ms, sample_rate);

        let num_channels = Channel::ALL.len();
        let used = sync + porch + num_channels * scan + (num_channels - 1) * separator;
        if used > line {
            tracing::debug!(
                mode = %self.name,
                used,
                line,
                "line content exceeds the line budget, not padding"
            );
        }

        LineTiming {
            vis_bit: samples(self.vis_bit_ms),
            sync,
            porch,
            scan,
            separator,
            pad: line.saturating_sub(used),
            taper: samples(self.taper_ms),
        }
    }
}

impl Default for ModeSpecification {
    #[inline]
    fn default() -> Self {
        Self::SCOTTIE_DX
    }
}

/// Segment lengths of a mode in samples.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LineTiming {
    pub vis_bit: usize,
    pub sync: usize,
    pub porch: usize,
    pub scan: usize,
    pub separator: usize,
    pub pad: usize,
    pub taper: usize,
}

impl LineTiming {
    /// Length of one full line, including the pad.
    #[inline]
    pub fn line(&self) -> usize {
        let num_channels = Channel::ALL.len();
        self.sync + self.porch + num_channels * self.scan + (num_channels - 1) * self.separator + self.pad
    }

    #[inline]
    pub fn vis_header(&self) -> usize {
        super::VIS_SLOTS * self.vis_bit
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;
    use crate::util::samples_to_duration;

    #[test]
    fn scottie_dx_line_adds_up() {
        let mode = ModeSpecification::SCOTTIE_DX;
        for sample_rate in [11025.0, 44100.0, 48000.0] {
            let timing = mode.line_timing(sample_rate);
            let resolution = 1000.0 / sample_rate;
            assert_abs_diff_eq!(
                samples_to_duration(timing.line(), sample_rate),
                mode.line_ms,
                epsilon = resolution
            );
        }
    }

    #[test]
    fn scottie_dx_at_44100() {
        let timing = ModeSpecification::SCOTTIE_DX.line_timing(44100.0);
        assert_eq!(
            timing,
            LineTiming {
                vis_bit: 1323,
                sync: 396,
                porch: 66,
                scan: 6096,
                separator: 66,
                pad: 743,
                taper: 220,
            }
        );
        assert_eq!(timing.line(), 19625);
        assert_eq!(timing.vis_header(), 13230);
    }

    #[test]
    fn pad_is_never_negative() {
        let mode = ModeSpecification {
            scan_ms: 200.0,
            ..ModeSpecification::SCOTTIE_DX
        };
        let timing = mode.line_timing(44100.0);
        assert_eq!(timing.pad, 0);
        assert!(timing.line() > 19625);
    }

    #[test]
    fn vis_bits_are_lsb_first() {
        let bits = VisCode::new(0x4c).bits().collect::<Vec<bool>>();
        assert_eq!(
            bits,
            [false, false, true, true, false, false, true, false]
        );
        assert_eq!(VisCode::from_bits(bits), VisCode::new(0x4c));
    }

    #[test]
    fn vis_code_displays_as_hex() {
        assert_eq!(VisCode::new(0x3c).to_string(), "0x3c");
    }
}
