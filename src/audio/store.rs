//! Audio persistence and delivery.
//!
//! Writes generated waveforms under the audio directory, reads them back
//! for playback, and encodes download payloads as `data:` URIs. Paths are
//! deterministic in the track id: saving twice under one id overwrites the
//! same file, and per-request ids keep concurrent requests off each
//! other's paths.

use std::fs;
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::audio::wav::write_wav;
use crate::error::{Result, ServiceError};

/// MIME prefix for WAV download links.
const DATA_URI_PREFIX: &str = "data:audio/wav;base64,";

/// Store for generated audio files.
///
/// Files accumulate; there is no cleanup policy.
#[derive(Debug, Clone)]
pub struct AudioStore {
    dir: PathBuf,
}

impl AudioStore {
    /// Opens a store rooted at `dir`, creating the directory if needed.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| {
            ServiceError::audio_io(format!(
                "Failed to create audio directory {}: {}",
                dir.display(),
                e
            ))
        })?;
        Ok(Self { dir })
    }

    /// Returns the store's root directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File name for a track id.
    pub fn file_name(track_id: &str) -> String {
        format!("audio_{}.wav", track_id)
    }

    /// Deterministic output path for a track id.
    pub fn wav_path(&self, track_id: &str) -> PathBuf {
        self.dir.join(Self::file_name(track_id))
    }

    /// Writes a waveform as a WAV file, overwriting any prior file under
    /// the same id. The file is complete on disk before this returns.
    pub fn save_waveform(&self, samples: &[f32], track_id: &str) -> Result<PathBuf> {
        let path = self.wav_path(track_id);
        write_wav(&path, samples)?;
        Ok(path)
    }

    /// Reads a persisted track back as raw WAV bytes.
    pub fn read_bytes(&self, track_id: &str) -> Result<Vec<u8>> {
        let path = self.wav_path(track_id);
        fs::read(&path).map_err(|e| {
            ServiceError::audio_io(format!("Failed to read {}: {}", path.display(), e))
        })
    }

    /// Returns true if a track with this id has been persisted.
    pub fn exists(&self, track_id: &str) -> bool {
        self.wav_path(track_id).exists()
    }
}

/// Encodes WAV bytes as a `data:audio/wav;base64,...` URI for a download
/// link, avoiding a separate file-serving endpoint.
pub fn data_uri(bytes: &[u8]) -> String {
    format!("{}{}", DATA_URI_PREFIX, STANDARD.encode(bytes))
}

/// Decodes the payload of a data URI produced by [`data_uri`].
pub fn decode_data_uri(uri: &str) -> Result<Vec<u8>> {
    let payload = uri
        .strip_prefix(DATA_URI_PREFIX)
        .ok_or_else(|| ServiceError::audio_io("Not an audio/wav data URI"))?;
    STANDARD
        .decode(payload)
        .map_err(|e| ServiceError::audio_io(format!("Invalid base64 payload: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, AudioStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = AudioStore::new(dir.path().join("audio")).unwrap();
        (dir, store)
    }

    #[test]
    fn new_creates_directory() {
        let (_guard, store) = store();
        assert!(store.dir().is_dir());
    }

    #[test]
    fn save_then_read_round_trip() {
        let (_guard, store) = store();
        let samples = vec![0.0_f32; 320];

        let path = store.save_waveform(&samples, "0").unwrap();
        assert_eq!(path, store.wav_path("0"));
        assert!(store.exists("0"));

        let bytes = store.read_bytes("0").unwrap();
        let reader = hound::WavReader::new(std::io::Cursor::new(bytes)).unwrap();
        assert_eq!(reader.len(), 320);
    }

    #[test]
    fn same_id_overwrites_last_writer_wins() {
        let (_guard, store) = store();

        let first = vec![0.1_f32; 100];
        let second = vec![0.9_f32; 200];

        let path_a = store.save_waveform(&first, "0").unwrap();
        let path_b = store.save_waveform(&second, "0").unwrap();
        assert_eq!(path_a, path_b);

        // Final file holds only the second waveform
        let reader = hound::WavReader::open(&path_b).unwrap();
        assert_eq!(reader.len(), 200);
        let decoded: Vec<i16> = reader.into_samples().map(|s| s.unwrap()).collect();
        let expected = (0.9_f32.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
        assert!(decoded.iter().all(|&s| s == expected));
    }

    #[test]
    fn read_missing_track_fails() {
        let (_guard, store) = store();
        assert!(store.read_bytes("deadbeef").is_err());
        assert!(!store.exists("deadbeef"));
    }

    #[test]
    fn data_uri_round_trip() {
        let payload: Vec<u8> = (0..=255).collect();
        let uri = data_uri(&payload);
        assert!(uri.starts_with("data:audio/wav;base64,"));
        assert_eq!(decode_data_uri(&uri).unwrap(), payload);
    }

    #[test]
    fn decode_rejects_foreign_uri() {
        assert!(decode_data_uri("data:text/plain;base64,aGk=").is_err());
    }
}
