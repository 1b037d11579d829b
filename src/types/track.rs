//! Track entity representing a generated audio file.
//!
//! The track id is derived from the generation parameters, so every
//! request with a fresh seed lands on its own output path while repeated
//! saves under one id deterministically overwrite the same file.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::PathBuf;
use std::time::SystemTime;

/// A generated audio file persisted in the audio directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Track {
    /// SHA256-derived identifier (16 hex chars).
    pub track_id: String,

    /// Absolute filesystem path to the WAV file.
    pub path: PathBuf,

    /// Original text prompt used for generation.
    pub prompt: String,

    /// Actual duration of the generated audio in seconds.
    pub duration_sec: f32,

    /// Audio sample rate in Hz.
    pub sample_rate: u32,

    /// Random seed used for sampling.
    pub seed: u64,

    /// Model identifier for reproducibility.
    pub model_version: String,

    /// Time taken to generate in seconds.
    pub generation_time_sec: f32,

    /// When the track was created.
    pub created_at: SystemTime,
}

impl Track {
    /// Creates a new Track under an already-computed id.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        track_id: String,
        path: PathBuf,
        prompt: String,
        duration_sec: f32,
        sample_rate: u32,
        seed: u64,
        model_version: String,
        generation_time_sec: f32,
    ) -> Self {
        Self {
            track_id,
            path,
            prompt,
            duration_sec,
            sample_rate,
            seed,
            model_version,
            generation_time_sec,
            created_at: SystemTime::now(),
        }
    }
}

/// Computes a track id from generation parameters.
///
/// The id is the first 16 hex characters of
/// SHA256(prompt:seed:duration:model_version). Identical parameters always
/// produce the same id; a per-request seed makes ids (and therefore output
/// paths) unique across requests.
pub fn compute_track_id(prompt: &str, seed: u64, duration_sec: u32, model_version: &str) -> String {
    let input = format!("{}:{}:{}:{}", prompt, seed, duration_sec, model_version);
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    let digest = hasher.finalize();
    hex::encode(&digest[..8])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn track_id_deterministic() {
        let a = compute_track_id("lofi beats", 12345, 10, "musicgen-small-v1");
        let b = compute_track_id("lofi beats", 12345, 10, "musicgen-small-v1");
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn track_id_differs_per_input() {
        let base = compute_track_id("lofi beats", 12345, 10, "musicgen-small-v1");
        assert_ne!(base, compute_track_id("jazz piano", 12345, 10, "musicgen-small-v1"));
        assert_ne!(base, compute_track_id("lofi beats", 12346, 10, "musicgen-small-v1"));
        assert_ne!(base, compute_track_id("lofi beats", 12345, 11, "musicgen-small-v1"));
        assert_ne!(base, compute_track_id("lofi beats", 12345, 10, "musicgen-small-v2"));
    }
}
