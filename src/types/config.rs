//! Model configuration types.
//!
//! Defines the ModelConfig struct with parameters loaded from the
//! MusicGen config.json file.

use serde::{Deserialize, Serialize};

use crate::models::musicgen::FRAMES_PER_SECOND;

/// Configuration parameters for the MusicGen model.
///
/// Loaded from the config.json file that accompanies the ONNX model
/// files; falls back to MusicGen-small defaults when a field is missing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Token vocabulary size.
    pub vocab_size: u32,

    /// Number of decoder transformer layers.
    pub num_hidden_layers: u32,

    /// Number of audio channels (1 for MusicGen-small).
    pub audio_channels: u32,

    /// Audio sample rate in Hz (32000 for MusicGen).
    pub sample_rate: u32,

    /// Number of codebooks for audio tokenization (4 for MusicGen).
    pub codebooks: u32,

    /// Padding token ID fed to codebooks that have no token yet.
    pub pad_token_id: u32,
}

impl Default for ModelConfig {
    /// Default configuration for MusicGen-small.
    fn default() -> Self {
        Self {
            vocab_size: 2048,
            num_hidden_layers: 24,
            audio_channels: 1,
            sample_rate: 32_000,
            codebooks: 4,
            pad_token_id: 2048,
        }
    }
}

impl ModelConfig {
    /// Parses model configuration from the HuggingFace config.json format.
    ///
    /// Missing or unparseable fields fall back to the defaults.
    pub fn from_json(json_str: &str) -> Self {
        #[derive(Default, Deserialize)]
        struct HfConfig {
            vocab_size: Option<u32>,
            num_hidden_layers: Option<u32>,
            audio_channels: Option<u32>,
            sampling_rate: Option<u32>,
            num_codebooks: Option<u32>,
            pad_token_id: Option<u32>,
        }

        let hf: HfConfig = serde_json::from_str(json_str).unwrap_or_default();

        let default = Self::default();
        Self {
            vocab_size: hf.vocab_size.unwrap_or(default.vocab_size),
            num_hidden_layers: hf.num_hidden_layers.unwrap_or(default.num_hidden_layers),
            audio_channels: hf.audio_channels.unwrap_or(default.audio_channels),
            sample_rate: hf.sampling_rate.unwrap_or(default.sample_rate),
            codebooks: hf.num_codebooks.unwrap_or(default.codebooks),
            pad_token_id: hf.pad_token_id.unwrap_or(default.pad_token_id),
        }
    }

    /// Expected number of token frames for a given duration.
    pub fn frames_for_duration(&self, duration_sec: u32) -> usize {
        duration_sec as usize * FRAMES_PER_SECOND
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_musicgen_small() {
        let config = ModelConfig::default();
        assert_eq!(config.sample_rate, 32_000);
        assert_eq!(config.codebooks, 4);
        assert_eq!(config.pad_token_id, 2048);
    }

    #[test]
    fn from_json_overrides_known_fields() {
        let config = ModelConfig::from_json(r#"{"sampling_rate": 16000, "num_codebooks": 8}"#);
        assert_eq!(config.sample_rate, 16_000);
        assert_eq!(config.codebooks, 8);
        // Unset fields keep defaults
        assert_eq!(config.vocab_size, 2048);
    }

    #[test]
    fn from_json_garbage_falls_back() {
        let config = ModelConfig::from_json("not json");
        assert_eq!(config.sample_rate, 32_000);
    }

    #[test]
    fn frames_for_duration_uses_frame_rate() {
        let config = ModelConfig::default();
        assert_eq!(config.frames_for_duration(10), 500);
    }
}
