//! Generation pipeline for the MusicGen backend.
//!
//! One call, one waveform: encode the prompt, run the token loop for the
//! requested duration, decode tokens to samples. Validation happens at
//! the request boundary, not here.

use tracing::{debug, info};

use crate::audio::wav::samples_to_duration;
use crate::error::Result;
use crate::models::musicgen::{MusicGenModels, FRAMES_PER_SECOND};
use crate::types::GenerationParams;

/// Generates one waveform for one prompt.
///
/// # Returns
///
/// Mono f32 samples at 32 kHz, or the first error encountered. There is
/// no retry and no cancellation; the call runs to completion or fails.
pub fn generate(
    models: &mut MusicGenModels,
    prompt: &str,
    params: &GenerationParams,
) -> Result<Vec<f32>> {
    generate_with_progress(models, prompt, params, |_, _| {})
}

/// Generates one waveform, reporting `(frames_complete, frames_total)`
/// after each decoder step.
pub fn generate_with_progress<F>(
    models: &mut MusicGenModels,
    prompt: &str,
    params: &GenerationParams,
    on_progress: F,
) -> Result<Vec<f32>>
where
    F: Fn(usize, usize),
{
    let max_frames = params.frame_budget();

    debug!(prompt, "encoding prompt");
    let (hidden_states, attention_mask) = models.text_encoder.encode(prompt)?;

    info!(
        duration_sec = params.duration_sec,
        frames = max_frames,
        top_k = params.top_k,
        "generating tokens"
    );
    let frames = models.decoder.generate_tokens_with_progress(
        hidden_states,
        attention_mask,
        params,
        max_frames,
        on_progress,
    )?;

    debug!(frames = frames.len(), "decoding tokens to audio");
    let samples = models.audio_codec.decode(&frames)?;

    info!(
        samples = samples.len(),
        duration_sec = samples_to_duration(samples.len()),
        "generation complete"
    );

    Ok(samples)
}

/// Estimates the number of audio samples for a given frame count.
///
/// Each token frame covers 32000 / 50 = 640 samples.
pub fn estimate_samples(frame_count: usize) -> usize {
    frame_count * (32_000 / FRAMES_PER_SECOND)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn estimate_samples_calculation() {
        // 10 seconds = 500 frames = 320,000 samples
        assert_eq!(estimate_samples(500), 320_000);
    }

    #[test]
    fn frame_budget_matches_duration() {
        let params = GenerationParams::for_duration(30, 0);
        assert_eq!(params.frame_budget(), 1500);
        let params = GenerationParams::for_duration(1, 0);
        assert_eq!(params.frame_budget(), 50);
    }
}
