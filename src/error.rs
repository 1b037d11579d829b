//! Error types for the tunegen service.
//!
//! Provides a structured error type covering model loading, inference,
//! request validation, and audio persistence. The HTTP layer maps
//! [`ErrorCode`] values to status codes; nothing in the request path panics.

use std::fmt;

/// Error categories surfaced to API clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// ONNX model files not found at the expected path.
    ModelNotFound,
    /// Failed to load an ONNX model (corrupt, wrong format, or OOM).
    ModelLoadFailed,
    /// Failed to download model files from the remote source.
    ModelDownloadFailed,
    /// Model inference failed (numerical instability, OOM).
    ModelInferenceFailed,
    /// Prompt is empty or exceeds the maximum length.
    InvalidPrompt,
    /// Duration outside the configured range.
    InvalidDuration,
    /// Reading or writing a generated audio file failed.
    AudioIo,
    /// HTTP server failure (bind error, transport fault).
    Http,
}

impl ErrorCode {
    /// Returns the string code used in JSON error responses.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ModelNotFound => "MODEL_NOT_FOUND",
            ErrorCode::ModelLoadFailed => "MODEL_LOAD_FAILED",
            ErrorCode::ModelDownloadFailed => "MODEL_DOWNLOAD_FAILED",
            ErrorCode::ModelInferenceFailed => "MODEL_INFERENCE_FAILED",
            ErrorCode::InvalidPrompt => "INVALID_PROMPT",
            ErrorCode::InvalidDuration => "INVALID_DURATION",
            ErrorCode::AudioIo => "AUDIO_IO",
            ErrorCode::Http => "HTTP",
        }
    }

    /// Returns true if this code denotes a request validation failure
    /// rather than an internal fault.
    pub fn is_validation(&self) -> bool {
        matches!(self, ErrorCode::InvalidPrompt | ErrorCode::InvalidDuration)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Main error type for service operations.
#[derive(Debug)]
pub struct ServiceError {
    /// The error code category.
    pub code: ErrorCode,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional context (file path, model name, etc.).
    pub context: Option<String>,
}

impl ServiceError {
    /// Creates a new ServiceError with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            context: None,
        }
    }

    /// Creates a new ServiceError with additional context.
    pub fn with_context(
        code: ErrorCode,
        message: impl Into<String>,
        context: impl Into<String>,
    ) -> Self {
        Self {
            code,
            message: message.into(),
            context: Some(context.into()),
        }
    }

    /// Model files not found at the specified path.
    pub fn model_not_found(path: impl Into<String>) -> Self {
        let path = path.into();
        Self::with_context(
            ErrorCode::ModelNotFound,
            format!("ONNX model files not found at expected path: {}", path),
            path,
        )
    }

    /// Model failed to load.
    pub fn model_load_failed(reason: impl Into<String>) -> Self {
        Self::new(ErrorCode::ModelLoadFailed, reason)
    }

    /// Model download failed.
    pub fn model_download_failed(reason: impl Into<String>) -> Self {
        Self::new(ErrorCode::ModelDownloadFailed, reason)
    }

    /// Model inference failed.
    pub fn model_inference_failed(reason: impl Into<String>) -> Self {
        Self::new(ErrorCode::ModelInferenceFailed, reason)
    }

    /// Invalid prompt (empty or too long).
    pub fn invalid_prompt(reason: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidPrompt, reason)
    }

    /// Duration outside the configured range.
    pub fn invalid_duration(duration: u32, min: u32, max: u32) -> Self {
        Self::with_context(
            ErrorCode::InvalidDuration,
            format!(
                "Duration must be between {} and {} seconds, got {}",
                min, max, duration
            ),
            duration.to_string(),
        )
    }

    /// Audio file read or write failed.
    pub fn audio_io(reason: impl Into<String>) -> Self {
        Self::new(ErrorCode::AudioIo, reason)
    }

    /// HTTP server failure.
    pub fn http(reason: impl Into<String>) -> Self {
        Self::new(ErrorCode::Http, reason)
    }
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)?;
        if let Some(ctx) = &self.context {
            write!(f, " (context: {})", ctx)?;
        }
        Ok(())
    }
}

impl std::error::Error for ServiceError {}

/// Result type alias using ServiceError.
pub type Result<T> = std::result::Result<T, ServiceError>;
