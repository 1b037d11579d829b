//! Audio output module.
//!
//! Provides WAV encoding, the on-disk audio store, and download URI
//! encoding for generated waveforms.

pub mod store;
pub mod wav;

// Re-export commonly used items
pub use store::{data_uri, decode_data_uri, AudioStore};
pub use wav::{samples_to_duration, write_wav, write_wav_to_buffer, CHANNELS, SAMPLE_RATE};
