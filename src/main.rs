//! tunegen server binary.
//!
//! Parses the CLI, fetches model weights if needed, and runs the HTTP
//! server until the process exits.

use anyhow::Result;
use clap::Parser;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use tunegen::cli::Cli;
use tunegen::models::{check_models, ensure_models};
use tunegen::server;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let skip_download = cli.skip_download;
    let config = cli.into_config();

    if skip_download {
        if let Err(err) = check_models(&config.model_path) {
            warn!("{} (generation requests will fail until models exist)", err);
        }
    } else {
        ensure_models(&config.model_path)?;
    }

    server::run(config).await?;
    Ok(())
}
