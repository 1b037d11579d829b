//! Generation parameters and request validation.
//!
//! Parameters are fixed per call: the sampling policy comes from service
//! defaults, the duration and seed come from the request.

use serde::{Deserialize, Serialize};

use crate::error::{Result, ServiceError};
use crate::models::musicgen::{DEFAULT_GUIDANCE_SCALE, DEFAULT_TOP_K, FRAMES_PER_SECOND};

/// Maximum accepted prompt length in characters.
pub const MAX_PROMPT_CHARS: usize = 1000;

/// Immutable parameters for a single generation call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationParams {
    /// Whether to sample from the token distribution (true) or take the
    /// argmax (false).
    pub use_sampling: bool,

    /// Number of top logits considered when sampling.
    pub top_k: usize,

    /// Classifier-free guidance scale.
    pub guidance_scale: f32,

    /// Requested audio duration in seconds.
    pub duration_sec: u32,

    /// Seed for the sampling RNG. Generated per request; a given
    /// (prompt, seed) pair reproduces the same audio.
    pub seed: u64,
}

impl GenerationParams {
    /// Creates parameters for the given duration and seed with the
    /// default sampling policy.
    pub fn for_duration(duration_sec: u32, seed: u64) -> Self {
        Self {
            use_sampling: true,
            top_k: DEFAULT_TOP_K,
            guidance_scale: DEFAULT_GUIDANCE_SCALE,
            duration_sec,
            seed,
        }
    }

    /// Number of token frames to generate for the requested duration.
    pub fn frame_budget(&self) -> usize {
        self.duration_sec as usize * FRAMES_PER_SECOND
    }
}

/// Validates a prompt before it reaches the model.
///
/// Rejects empty or whitespace-only prompts and prompts longer than
/// [`MAX_PROMPT_CHARS`].
pub fn validate_prompt(prompt: &str) -> Result<()> {
    if prompt.trim().is_empty() {
        return Err(ServiceError::invalid_prompt("Prompt must not be empty"));
    }
    let chars = prompt.chars().count();
    if chars > MAX_PROMPT_CHARS {
        return Err(ServiceError::invalid_prompt(format!(
            "Prompt must be at most {} characters, got {}",
            MAX_PROMPT_CHARS, chars
        )));
    }
    Ok(())
}

/// Validates a requested duration against the configured bounds.
pub fn validate_duration(duration_sec: u32, min: u32, max: u32) -> Result<()> {
    if duration_sec < min || duration_sec > max {
        return Err(ServiceError::invalid_duration(duration_sec, min, max));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    #[test]
    fn params_for_duration_defaults() {
        let params = GenerationParams::for_duration(10, 42);
        assert!(params.use_sampling);
        assert_eq!(params.top_k, 250);
        assert_eq!(params.guidance_scale, 3.0);
        assert_eq!(params.duration_sec, 10);
        assert_eq!(params.seed, 42);
    }

    #[test]
    fn frame_budget_scales_with_duration() {
        assert_eq!(GenerationParams::for_duration(1, 0).frame_budget(), 50);
        assert_eq!(GenerationParams::for_duration(30, 0).frame_budget(), 1500);
    }

    #[test]
    fn empty_prompt_rejected() {
        let err = validate_prompt("").unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidPrompt);
    }

    #[test]
    fn whitespace_prompt_rejected() {
        assert!(validate_prompt("   \t\n").is_err());
    }

    #[test]
    fn overlong_prompt_rejected() {
        let prompt = "a".repeat(MAX_PROMPT_CHARS + 1);
        assert!(validate_prompt(&prompt).is_err());
    }

    #[test]
    fn reasonable_prompt_accepted() {
        assert!(validate_prompt("lofi chill beats with soft piano").is_ok());
    }

    #[test]
    fn duration_bounds_enforced() {
        assert!(validate_duration(0, 1, 30).is_err());
        assert!(validate_duration(31, 1, 30).is_err());
        assert!(validate_duration(1, 1, 30).is_ok());
        assert!(validate_duration(30, 1, 30).is_ok());
    }

    #[test]
    fn duration_error_code() {
        let err = validate_duration(31, 1, 30).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidDuration);
        assert_eq!(err.context.as_deref(), Some("31"));
    }
}
