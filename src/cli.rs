//! Command-line interface for the tunegen server.

use std::path::PathBuf;

use clap::Parser;

use crate::config::{Device, ServiceConfig, DEFAULT_PORT};

/// Top-level CLI options.
#[derive(Debug, Parser)]
#[command(name = "tunegen")]
#[command(about = "Text-to-music generation server with a built-in web UI")]
pub struct Cli {
    /// HTTP port to bind.
    #[arg(long, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Directory containing the ONNX model files (defaults to the
    /// platform cache directory).
    #[arg(long)]
    pub model_dir: Option<PathBuf>,

    /// Directory for generated WAV files (defaults to the platform
    /// cache directory).
    #[arg(long)]
    pub audio_dir: Option<PathBuf>,

    /// Device to use for inference.
    #[arg(long, value_enum, default_value_t = Device::Auto)]
    pub device: Device,

    /// Number of threads for CPU execution (0 = auto).
    #[arg(long, default_value_t = 0)]
    pub threads: u32,

    /// Skip the model download check at startup.
    #[arg(long)]
    pub skip_download: bool,
}

impl Cli {
    /// Builds the service configuration from the parsed arguments.
    pub fn into_config(self) -> ServiceConfig {
        let mut config = ServiceConfig {
            port: self.port,
            device: self.device,
            threads: self.threads,
            ..ServiceConfig::default()
        };
        if let Some(model_dir) = self.model_dir {
            config.model_path = model_dir;
        }
        if let Some(audio_dir) = self.audio_dir {
            config.audio_path = audio_dir;
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_service_config() {
        let cli = Cli::parse_from(["tunegen"]);
        assert!(!cli.skip_download);
        let config = cli.into_config();
        let defaults = ServiceConfig::default();
        assert_eq!(config.port, defaults.port);
        assert_eq!(config.model_path, defaults.model_path);
        assert_eq!(config.device, Device::Auto);
    }

    #[test]
    fn overrides_apply() {
        let cli = Cli::parse_from([
            "tunegen",
            "--port",
            "9000",
            "--model-dir",
            "/tmp/models",
            "--device",
            "cpu",
            "--threads",
            "4",
        ]);
        let config = cli.into_config();
        assert_eq!(config.port, 9000);
        assert_eq!(config.model_path, PathBuf::from("/tmp/models"));
        assert_eq!(config.device, Device::Cpu);
        assert_eq!(config.threads, 4);
    }
}
