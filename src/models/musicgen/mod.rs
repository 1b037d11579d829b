//! MusicGen ONNX model wrappers.
//!
//! This module contains the three sessions that make up MusicGen-small:
//! - [`text_encoder`]: T5 encoder turning prompts into hidden states
//! - [`decoder`]: autoregressive token decoder with delayed codebooks
//! - [`audio_codec`]: EnCodec decoder turning tokens into samples

pub mod audio_codec;
pub mod decoder;
pub mod text_encoder;

use std::fs;
use std::path::Path;

use ort::execution_providers::ExecutionProviderDispatch;
use ort::session::Session;
use tracing::info;

use crate::config::ServiceConfig;
use crate::error::{Result, ServiceError};
use crate::models::device::{device_label, providers_for};
use crate::types::ModelConfig;

pub use audio_codec::AudioCodec;
pub use decoder::{Decoder, DelayPattern, Logits};
pub use text_encoder::TextEncoder;

/// Token frames generated per second of audio.
pub const FRAMES_PER_SECOND: usize = 50;

/// Number of parallel codebooks in the token stream.
pub const NUM_CODEBOOKS: usize = 4;

/// Default top-k cutoff for sampling.
pub const DEFAULT_TOP_K: usize = 250;

/// Default classifier-free guidance scale.
pub const DEFAULT_GUIDANCE_SCALE: f32 = 3.0;

/// Model version string recorded on generated tracks.
pub const MODEL_VERSION: &str = "musicgen-small-onnx-v1";

/// Files that must exist in the model directory before loading.
pub const REQUIRED_MODEL_FILES: &[&str] = &[
    "tokenizer.json",
    "text_encoder.onnx",
    "decoder_model.onnx",
    "decoder_with_past_model.onnx",
    "encodec_decode.onnx",
];

/// Download URLs for each model file, keyed by file name.
pub const MODEL_URLS: &[(&str, &str)] = &[
    (
        "tokenizer.json",
        "https://huggingface.co/Xenova/musicgen-small/resolve/main/tokenizer.json",
    ),
    (
        "config.json",
        "https://huggingface.co/Xenova/musicgen-small/resolve/main/config.json",
    ),
    (
        "text_encoder.onnx",
        "https://huggingface.co/Xenova/musicgen-small/resolve/main/onnx/text_encoder.onnx",
    ),
    (
        "decoder_model.onnx",
        "https://huggingface.co/Xenova/musicgen-small/resolve/main/onnx/decoder_model.onnx",
    ),
    (
        "decoder_with_past_model.onnx",
        "https://huggingface.co/Xenova/musicgen-small/resolve/main/onnx/decoder_with_past_model.onnx",
    ),
    (
        "encodec_decode.onnx",
        "https://huggingface.co/Xenova/musicgen-small/resolve/main/onnx/encodec_decode.onnx",
    ),
];

/// Loads a single ONNX session with the given execution providers.
pub(crate) fn load_session(
    path: &Path,
    providers: &[ExecutionProviderDispatch],
) -> Result<Session> {
    if !path.exists() {
        return Err(ServiceError::model_not_found(path.display().to_string()));
    }

    let mut builder = Session::builder()
        .map_err(|e| ServiceError::model_load_failed(format!("Failed to create session: {}", e)))?;

    if !providers.is_empty() {
        builder = builder.with_execution_providers(providers).map_err(|e| {
            ServiceError::model_load_failed(format!("Failed to set execution providers: {}", e))
        })?;
    }

    builder.commit_from_file(path).map_err(|e| {
        ServiceError::model_load_failed(format!("Failed to load {}: {}", path.display(), e))
    })
}

/// Checks that all required model files exist in `model_dir`.
pub fn check_models(model_dir: &Path) -> Result<()> {
    let missing: Vec<&str> = REQUIRED_MODEL_FILES
        .iter()
        .copied()
        .filter(|f| !model_dir.join(f).exists())
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(ServiceError::model_not_found(format!(
            "Missing model files in {}: {}",
            model_dir.display(),
            missing.join(", ")
        )))
    }
}

/// Complete set of loaded MusicGen sessions.
pub struct MusicGenModels {
    /// T5 text encoder for prompt conditioning.
    pub text_encoder: TextEncoder,
    /// Autoregressive token decoder.
    pub decoder: Decoder,
    /// EnCodec audio codec.
    pub audio_codec: AudioCodec,
    /// Parsed model configuration.
    config: ModelConfig,
    /// Device name used for inference.
    device_name: String,
}

impl std::fmt::Debug for MusicGenModels {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MusicGenModels")
            .field("device_name", &self.device_name)
            .finish_non_exhaustive()
    }
}

impl MusicGenModels {
    /// Loads all sessions according to the service configuration.
    pub fn load(config: &ServiceConfig) -> Result<Self> {
        let providers = providers_for(config.device);
        let device_name = device_label(config.device).to_string();
        Self::load_from_dir(&config.model_path, &providers, device_name)
    }

    /// Loads all sessions from a model directory with explicit providers.
    pub fn load_from_dir(
        model_dir: &Path,
        providers: &[ExecutionProviderDispatch],
        device_name: String,
    ) -> Result<Self> {
        check_models(model_dir)?;

        let model_config = fs::read_to_string(model_dir.join("config.json"))
            .map(|json| ModelConfig::from_json(&json))
            .unwrap_or_default();

        info!(model_dir = %model_dir.display(), device = %device_name, "loading MusicGen sessions");

        let text_encoder = TextEncoder::load(model_dir, providers)?;
        let decoder = Decoder::load(model_dir, providers, &model_config)?;
        let audio_codec = AudioCodec::load(model_dir, providers)?;

        info!("MusicGen sessions loaded");

        Ok(Self {
            text_encoder,
            decoder,
            audio_codec,
            config: model_config,
            device_name,
        })
    }

    /// Parsed model configuration.
    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    /// Model version string for track metadata.
    pub fn version(&self) -> &'static str {
        MODEL_VERSION
    }

    /// Device name used for inference.
    pub fn device_name(&self) -> &str {
        &self.device_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_required_file_has_a_url() {
        for file in REQUIRED_MODEL_FILES {
            assert!(
                MODEL_URLS.iter().any(|(name, _)| name == file),
                "missing URL for {}",
                file
            );
        }
    }

    #[test]
    fn check_models_fails_on_missing_dir() {
        let result = check_models(Path::new("/nonexistent/models"));
        assert!(result.is_err());
    }

    #[test]
    fn frame_rate_constants() {
        assert_eq!(FRAMES_PER_SECOND, 50);
        assert_eq!(NUM_CODEBOOKS, 4);
        assert_eq!(DEFAULT_TOP_K, 250);
    }
}
