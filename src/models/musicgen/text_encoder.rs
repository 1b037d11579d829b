//! T5 text encoder for MusicGen.
//!
//! Encodes a text prompt into the hidden states that condition the token
//! decoder.
//!
//! ## Model Signature
//!
//! **text_encoder.onnx:**
//! - Inputs:
//!   - `input_ids`: (batch, seq_len) i64
//!   - `attention_mask`: (batch, seq_len) i64
//! - Outputs:
//!   - `last_hidden_state`: (batch, seq_len, 768) f32

use std::path::Path;

use half::f16;
use ndarray::{Array2, Array3};
use ort::execution_providers::ExecutionProviderDispatch;
use ort::session::Session;
use ort::value::Tensor;
use tokenizers::Tokenizer;

use crate::error::{Result, ServiceError};

use super::load_session;

/// Maximum token sequence length fed to the encoder.
pub const MAX_SEQ_LENGTH: usize = 512;

/// T5 text encoder for prompt conditioning.
pub struct TextEncoder {
    session: Session,
    tokenizer: Tokenizer,
}

impl std::fmt::Debug for TextEncoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextEncoder").finish_non_exhaustive()
    }
}

impl TextEncoder {
    /// Loads the text encoder from the model directory.
    ///
    /// Expects `text_encoder.onnx` and `tokenizer.json`.
    pub fn load(model_dir: &Path, providers: &[ExecutionProviderDispatch]) -> Result<Self> {
        let session = load_session(&model_dir.join("text_encoder.onnx"), providers)?;

        let tokenizer = Tokenizer::from_file(model_dir.join("tokenizer.json"))
            .map_err(|e| ServiceError::model_load_failed(format!("Failed to load tokenizer: {}", e)))?;

        Ok(Self { session, tokenizer })
    }

    /// Encodes a prompt into conditioning hidden states.
    ///
    /// # Returns
    ///
    /// A tuple of:
    /// - `last_hidden_state`: shape (1, seq_len, 768)
    /// - `attention_mask`: shape (1, seq_len)
    pub fn encode(&mut self, prompt: &str) -> Result<(Array3<f32>, Array2<i64>)> {
        let encoding = self.tokenizer.encode(prompt, true).map_err(|e| {
            ServiceError::model_inference_failed(format!("Tokenization failed: {}", e))
        })?;

        let token_ids: Vec<i64> = encoding.get_ids().iter().map(|&id| id as i64).collect();
        let attention_mask: Vec<i64> = encoding
            .get_attention_mask()
            .iter()
            .map(|&m| m as i64)
            .collect();

        // Truncate if needed
        let seq_len = token_ids.len().min(MAX_SEQ_LENGTH);
        let token_ids = token_ids[..seq_len].to_vec();
        let attention_mask = attention_mask[..seq_len].to_vec();

        let input_ids_tensor = Tensor::from_array(([1, seq_len], token_ids)).map_err(|e| {
            ServiceError::model_inference_failed(format!("Failed to create input_ids tensor: {}", e))
        })?;
        let mask_tensor =
            Tensor::from_array(([1, seq_len], attention_mask.clone())).map_err(|e| {
                ServiceError::model_inference_failed(format!(
                    "Failed to create attention_mask tensor: {}",
                    e
                ))
            })?;

        let mut outputs = self
            .session
            .run(ort::inputs![
                "input_ids" => input_ids_tensor,
                "attention_mask" => mask_tensor,
            ])
            .map_err(|e| {
                ServiceError::model_inference_failed(format!("Text encoder inference failed: {}", e))
            })?;

        let hidden = outputs.remove("last_hidden_state").ok_or_else(|| {
            ServiceError::model_inference_failed("Missing last_hidden_state output")
        })?;

        // fp16 exports produce half-precision hidden states
        let (dims, data) = if let Ok((shape, data)) = hidden.try_extract_tensor::<f32>() {
            (shape.to_vec(), data.to_vec())
        } else if let Ok((shape, data)) = hidden.try_extract_tensor::<f16>() {
            (
                shape.to_vec(),
                data.iter().map(|&v| f32::from(v)).collect(),
            )
        } else {
            return Err(ServiceError::model_inference_failed(
                "last_hidden_state must be f16 or f32",
            ));
        };

        let dims: Vec<usize> = dims.iter().map(|&d| d as usize).collect();
        let hidden_states = Array3::from_shape_vec((dims[0], dims[1], dims[2]), data)
            .map_err(|e| {
                ServiceError::model_inference_failed(format!(
                    "Failed to reshape last_hidden_state: {}",
                    e
                ))
            })?;

        let attention_mask = Array2::from_shape_vec((1, seq_len), attention_mask).map_err(|e| {
            ServiceError::model_inference_failed(format!(
                "Failed to create attention mask array: {}",
                e
            ))
        })?;

        Ok((hidden_states, attention_mask))
    }
}
