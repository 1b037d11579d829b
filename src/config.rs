//! Service configuration module.
//!
//! Provides configuration types for the HTTP port, device selection,
//! threading, duration policy, and model/audio paths.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default HTTP port for the web UI and API.
pub const DEFAULT_PORT: u16 = 7878;

/// Default lower bound for requested durations, in seconds.
pub const DEFAULT_MIN_DURATION_SEC: u32 = 1;

/// Default upper bound for requested durations, in seconds.
pub const DEFAULT_MAX_DURATION_SEC: u32 = 30;

/// Hardware device for model inference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum, Default)]
#[serde(rename_all = "lowercase")]
pub enum Device {
    /// Automatically select best available device.
    #[default]
    Auto,
    /// Force CPU execution.
    Cpu,
    /// Use NVIDIA CUDA GPU.
    Cuda,
    /// Use Apple Metal GPU (macOS only).
    Metal,
}

/// Configuration for the tunegen service.
///
/// Duration bounds are policy, not protocol: the defaults mirror the web
/// form's limits but can be widened without touching the generation code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Path to the directory containing ONNX model files.
    pub model_path: PathBuf,

    /// Path to the directory holding generated WAV files.
    pub audio_path: PathBuf,

    /// HTTP port to bind.
    pub port: u16,

    /// Device to use for inference.
    pub device: Device,

    /// Number of threads for CPU execution (0 = auto).
    pub threads: u32,

    /// Minimum accepted duration in seconds.
    pub min_duration_sec: u32,

    /// Maximum accepted duration in seconds.
    pub max_duration_sec: u32,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        // Use platform-appropriate cache directory
        let base_cache = directories::BaseDirs::new()
            .map(|d| d.cache_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from(".cache"));

        let cache = base_cache.join("tunegen");

        Self {
            model_path: cache.join("models").join("musicgen-small"),
            audio_path: cache.join("audio"),
            port: DEFAULT_PORT,
            device: Device::Auto,
            threads: 0, // Auto-detect
            min_duration_sec: DEFAULT_MIN_DURATION_SEC,
            max_duration_sec: DEFAULT_MAX_DURATION_SEC,
        }
    }
}

impl ServiceConfig {
    /// Returns the path to the tokenizer.json file.
    pub fn tokenizer_path(&self) -> PathBuf {
        self.model_path.join("tokenizer.json")
    }

    /// Returns the path to the config.json file.
    pub fn config_path(&self) -> PathBuf {
        self.model_path.join("config.json")
    }

    /// Returns the path to the text encoder ONNX model.
    pub fn text_encoder_path(&self) -> PathBuf {
        self.model_path.join("text_encoder.onnx")
    }

    /// Returns the path to the decoder ONNX model (first iteration).
    pub fn decoder_path(&self) -> PathBuf {
        self.model_path.join("decoder_model.onnx")
    }

    /// Returns the path to the decoder with past ONNX model (subsequent iterations).
    pub fn decoder_with_past_path(&self) -> PathBuf {
        self.model_path.join("decoder_with_past_model.onnx")
    }

    /// Returns the path to the audio codec ONNX model.
    pub fn audio_codec_path(&self) -> PathBuf {
        self.model_path.join("encodec_decode.onnx")
    }

    /// Checks if all required model files exist.
    pub fn models_exist(&self) -> bool {
        self.missing_models().is_empty()
    }

    /// Returns a list of missing model files.
    pub fn missing_models(&self) -> Vec<PathBuf> {
        let paths = [
            self.tokenizer_path(),
            self.text_encoder_path(),
            self.decoder_path(),
            self.decoder_with_past_path(),
            self.audio_codec_path(),
        ];

        paths.into_iter().filter(|p| !p.exists()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_paths_under_cache() {
        let config = ServiceConfig::default();
        assert!(config.model_path.ends_with("models/musicgen-small"));
        assert!(config.audio_path.ends_with("audio"));
    }

    #[test]
    fn default_duration_policy() {
        let config = ServiceConfig::default();
        assert_eq!(config.min_duration_sec, 1);
        assert_eq!(config.max_duration_sec, 30);
        assert_eq!(config.port, DEFAULT_PORT);
    }

    #[test]
    fn model_file_paths() {
        let config = ServiceConfig::default();
        assert!(config.tokenizer_path().ends_with("tokenizer.json"));
        assert!(config.decoder_with_past_path().ends_with("decoder_with_past_model.onnx"));
        assert!(config.audio_codec_path().ends_with("encodec_decode.onnx"));
    }

    #[test]
    fn missing_models_reports_all_when_dir_absent() {
        let mut config = ServiceConfig::default();
        config.model_path = PathBuf::from("/nonexistent/tunegen-models");
        assert!(!config.models_exist());
        assert_eq!(config.missing_models().len(), 5);
    }
}
