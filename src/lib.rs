//! tunegen: text-to-music generation server with a built-in web UI.
//!
//! This library provides the core functionality behind the tunegen
//! binary: a thin pipeline around MusicGen-small ONNX sessions that turns
//! a text prompt and a duration into a playable, downloadable WAV file.
//!
//! # Modules
//!
//! - [`config`] - Service configuration (port, device, paths, duration policy)
//! - [`error`] - Error types and result alias
//! - [`types`] - Core domain types (GenerationParams, Track, ModelConfig)
//! - [`models`] - Model sessions, the shared handle, and the downloader
//! - [`generation`] - The prompt-to-waveform pipeline
//! - [`audio`] - WAV encoding, the audio store, and download URIs
//! - [`server`] - The axum HTTP server and embedded UI
//!
//! # Example
//!
//! ```rust,ignore
//! use tunegen::config::ServiceConfig;
//! use tunegen::server;
//!
//! let config = ServiceConfig::default();
//! if !config.models_exist() {
//!     println!("Missing models: {:?}", config.missing_models());
//! }
//! server::run(config).await?;
//! ```

pub mod audio;
pub mod cli;
pub mod config;
pub mod error;
pub mod generation;
pub mod models;
pub mod server;
pub mod types;

// Re-export commonly used types at crate root for convenience
pub use config::{Device, ServiceConfig};
pub use error::{ErrorCode, Result, ServiceError};
pub use types::{compute_track_id, GenerationParams, ModelConfig, Track};
