mod args;
mod config;
mod files;
mod receive;
mod transmit;

use clap::Parser;
use color_eyre::eyre::{
    Error,
    bail,
};
use scottie::modem::sstv::StopSignal;
use tracing_subscriber::EnvFilter;

use crate::{
    args::{
        Args,
        Command,
    },
    config::Config,
    files::AppFiles,
};

#[tokio::main]
async fn main() -> Result<(), Error> {
    let _ = dotenvy::dotenv();
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    tracing::debug!(?args);

    let config = match &args.config {
        Some(path) => Config::from_path(path)?,
        None => AppFiles::new()?.config()?,
    };
    let sample_rate = args.sample_rate.unwrap_or(config.sample_rate);
    if !(sample_rate.is_finite() && sample_rate > 0.0) {
        bail!("Sample rate must be positive, got {sample_rate}");
    }
    args.command.validate()?;

    // the decoder checks this between reads
    let stop = StopSignal::new();
    if args.command.stops_gracefully() {
        tokio::spawn({
            let stop = stop.clone();
            async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::info!("Interrupted");
                    stop.stop();
                }
            }
        });
    }

    // encoding and decoding are blocking and CPU bound
    let result = tokio::task::spawn_blocking(move || {
        match args.command {
            Command::Encode {
                image,
                output,
                noise,
                seed,
            } => transmit::encode(&config, sample_rate, &image, &output, noise, seed),
            #[cfg(feature = "audio")]
            Command::Play { image } => transmit::play(&config, sample_rate, &image),
            Command::Decode { input, output } => receive::decode(&config, &input, &output, &stop),
            #[cfg(feature = "audio")]
            Command::Receive { output, frames } => receive::receive(&config, sample_rate, &output, frames, &stop),
        }
    })
    .await?;

    if let Err(error) = &result {
        tracing::error!(?error);
    }
    else {
        tracing::debug!("Program exiting");
    }

    result
}
