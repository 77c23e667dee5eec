use std::path::PathBuf;

use clap::{
    Parser,
    Subcommand,
};
use color_eyre::eyre::{
    Error,
    bail,
};

#[derive(Debug, Parser)]
pub struct Args {
    /// Configuration file. Defaults to `config.toml` in the user's config
    /// directory, which is created with default values if missing.
    #[clap(short, long)]
    pub config: Option<PathBuf>,

    /// Sample rate in Hz. Overrides the configuration file.
    #[clap(short, long = "samplerate")]
    pub sample_rate: Option<f32>,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Encode an image into a WAV file.
    Encode {
        image: PathBuf,

        output: PathBuf,

        /// Add white noise of this amplitude (full scale is 1.0).
        #[clap(long)]
        noise: Option<f32>,

        /// Seed for the noise, for reproducible output.
        #[clap(long, requires = "noise")]
        seed: Option<u64>,
    },

    /// Encode an image and play it on the default output device.
    #[cfg(feature = "audio")]
    Play { image: PathBuf },

    /// Decode all frames in a WAV file.
    ///
    /// The first frame is written to OUTPUT, further frames get a counter
    /// appended to the file name.
    Decode { input: PathBuf, output: PathBuf },

    /// Decode frames from the default input device until interrupted.
    #[cfg(feature = "audio")]
    Receive {
        output: PathBuf,

        /// Stop after this many frames.
        #[clap(short, long)]
        frames: Option<usize>,
    },
}

impl Command {
    /// Whether Ctrl-C should end the command cleanly, keeping what was decoded
    /// so far, rather than kill the process.
    pub fn stops_gracefully(&self) -> bool {
        match self {
            Command::Decode { .. } => true,
            #[cfg(feature = "audio")]
            Command::Receive { .. } => true,
            _ => false,
        }
    }

    /// Rejects option values that parse but can't be used.
    pub fn validate(&self) -> Result<(), Error> {
        if let Command::Encode {
            noise: Some(amplitude),
            ..
        } = self
        {
            if !amplitude.is_finite() {
                bail!("Noise amplitude must be finite, got {amplitude}");
            }
        }
        Ok(())
    }
}
