//! Model components for the MusicGen backend.
//!
//! This module contains:
//! - [`musicgen`]: the ONNX session wrappers (text encoder, decoder, codec)
//! - [`handle`]: the lazily initialized process-wide model handle
//! - [`device`]: device detection and execution provider selection
//! - [`downloader`]: model download and management

pub mod device;
pub mod downloader;
pub mod handle;
pub mod musicgen;

// Re-export commonly used items from submodules
pub use device::{detect_providers, device_label, providers_for, DetectedProvider};
pub use downloader::ensure_models;
pub use handle::{acquire, LazyShared, ModelHandle};
pub use musicgen::{
    check_models, MusicGenModels, DEFAULT_GUIDANCE_SCALE, DEFAULT_TOP_K, FRAMES_PER_SECOND,
    MODEL_URLS, MODEL_VERSION, NUM_CODEBOOKS, REQUIRED_MODEL_FILES,
};
