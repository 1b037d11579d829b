//! EnCodec audio codec for MusicGen.
//!
//! Decodes de-delayed token frames into 32 kHz mono samples.

use std::path::Path;

use half::f16;
use ort::execution_providers::ExecutionProviderDispatch;
use ort::session::Session;
use ort::value::{DynValue, Tensor};

use crate::error::{Result, ServiceError};

use super::{load_session, NUM_CODEBOOKS};

/// EnCodec decoder session.
pub struct AudioCodec {
    session: Session,
}

impl std::fmt::Debug for AudioCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioCodec").finish_non_exhaustive()
    }
}

impl AudioCodec {
    /// Loads the codec from the model directory.
    ///
    /// Expects `encodec_decode.onnx`.
    pub fn load(model_dir: &Path, providers: &[ExecutionProviderDispatch]) -> Result<Self> {
        let session = load_session(&model_dir.join("encodec_decode.onnx"), providers)?;
        Ok(Self { session })
    }

    /// Decodes token frames into audio samples.
    ///
    /// Frames arrive as `[codebook0..codebook3]` per timestep; EnCodec
    /// wants shape `(1, 1, codebooks, seq_len)`, so the frames are
    /// transposed into codebook-major order first.
    pub fn decode(&mut self, frames: &[[i64; NUM_CODEBOOKS]]) -> Result<Vec<f32>> {
        if frames.is_empty() {
            return Ok(Vec::new());
        }

        let seq_len = frames.len();
        let mut codes = vec![0_i64; seq_len * NUM_CODEBOOKS];
        for (t, frame) in frames.iter().enumerate() {
            for (k, &id) in frame.iter().enumerate() {
                codes[k * seq_len + t] = id;
            }
        }

        let codes_tensor = Tensor::from_array(([1_usize, 1, NUM_CODEBOOKS, seq_len], codes))
            .map_err(|e| {
                ServiceError::model_inference_failed(format!(
                    "Failed to create token tensor: {}",
                    e
                ))
            })?;

        let mut outputs = self
            .session
            .run(ort::inputs![codes_tensor])
            .map_err(|e| {
                ServiceError::model_inference_failed(format!("Audio codec inference failed: {}", e))
            })?;

        let audio_values: DynValue = outputs.remove("audio_values").ok_or_else(|| {
            ServiceError::model_inference_failed("audio_values not found in output")
        })?;

        if let Ok((_shape, data)) = audio_values.try_extract_tensor::<f32>() {
            return Ok(data.to_vec());
        }
        if let Ok((_shape, data)) = audio_values.try_extract_tensor::<f16>() {
            return Ok(data.iter().map(|&v| f32::from(v)).collect());
        }

        Err(ServiceError::model_inference_failed(
            "Audio values must be either f16 or f32",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transpose_is_codebook_major() {
        let frames = [[1_i64, 2, 3, 4], [5, 6, 7, 8]];
        let seq_len = frames.len();

        let mut codes = vec![0_i64; seq_len * NUM_CODEBOOKS];
        for (t, frame) in frames.iter().enumerate() {
            for (k, &id) in frame.iter().enumerate() {
                codes[k * seq_len + t] = id;
            }
        }

        assert_eq!(codes, vec![1, 5, 2, 6, 3, 7, 4, 8]);
    }
}
