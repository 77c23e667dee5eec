use std::path::Path;

use scottie::modem::sstv::{
    DEFAULT_SAMPLE_RATE,
    DecoderConfig,
    ModeSpecification,
};
use serde::{
    Deserialize,
    Serialize,
};

use crate::Error;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Sample rate of rendered, played and captured audio, in Hz.
    pub sample_rate: f32,
    pub mode: ModeSpecification,
    pub decoder: DecoderConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            mode: ModeSpecification::default(),
            decoder: DecoderConfig::default(),
        }
    }
}

impl Config {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, Error> {
        tracing::debug!(path = %path.as_ref().display(), "Loading config from file");
        Ok(toml::from_str(&std::fs::read_to_string(path)?)?)
    }

    pub fn to_path(&self, path: impl AsRef<Path>) -> Result<(), Error> {
        tracing::debug!(path = %path.as_ref().display(), "Writing config to file");
        std::fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }
}
