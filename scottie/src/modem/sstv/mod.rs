//! Scottie DX style slow-scan television.
//!
//! A transmission is a VIS header (start marker, 8 FSK data bits LSB-first,
//! stop marker), a vertical sync and porch, and then one line per image row:
//! horizontal sync, porch, and the green, blue and red channels as frequency
//! sweeps separated by short porch tones. Each line is padded with silence to
//! a fixed duration.
//!
//! # References
//!
//! - <http://lionel.cordesses.free.fr/gpages/sstv.html>
//! - <http://www.barberdsp.com/downloads/Dayton%20Paper.pdf>

mod decoder;
mod encoder;
pub mod image;
pub mod modes;
pub mod state;
pub mod stream;

pub use self::{
    decoder::{
        DecodeError,
        DecoderConfig,
        DecoderEvent,
        PixelEstimator,
        RunExit,
        SstvDecoder,
        StopSignal,
    },
    encoder::{
        EncodeError,
        SstvEncoder,
    },
    modes::{
        LineTiming,
        ModeSpecification,
        VisCode,
    },
};

pub const VIS_CODE: VisCode = VisCode::new(0x3c);
pub const VIS_ZERO_TONE: f32 = 1100.0;
pub const VIS_ONE_TONE: f32 = 1300.0;

/// Start marker, 8 data bits, stop marker.
pub const VIS_SLOTS: usize = 10;
pub const VIS_DATA_BITS: usize = 8;

// sync, vis start/stop
pub const SYNC_TONE: f32 = 1200.0;

// porch, separator
pub const PORCH_TONE: f32 = 1500.0;

pub const CHANNEL_LOW_TONE: f32 = 1500.0;
pub const CHANNEL_HIGH_TONE: f32 = 2300.0;

pub const DEFAULT_SAMPLE_RATE: f32 = 44100.0;
