//! Error types for longscribe.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum LongscribeError {
    // Configuration errors
    #[error("Configuration file not found at {path}")]
    ConfigFileNotFound { path: String },

    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    // Provider lookup errors
    #[error("Unknown provider '{provider}'. Registered providers: {known}")]
    UnknownProvider { provider: String, known: String },

    // Audio source errors
    #[error("Cannot read audio source {path}: {message}")]
    SourceUnreadable { path: String, message: String },

    #[error("Audio format mismatch: expected {expected}, got {actual}")]
    AudioFormatMismatch { expected: String, actual: String },

    #[error("Audio decode failed: {message}")]
    AudioDecode { message: String },

    // Staging errors (retryable)
    #[error("Staging failed: {message}")]
    Staging { message: String },

    // Transcription errors
    #[error("Authentication failed for provider {provider}: {message}")]
    Auth { provider: String, message: String },

    #[error("Rate limit exceeded for provider {provider}")]
    RateLimited { provider: String },

    #[error("Transient failure: {message}")]
    Transient { message: String },

    #[error("Permanent failure: {message}")]
    Permanent { message: String },

    #[error("Deadline exceeded: {message}")]
    Timeout { message: String },

    // Job control
    #[error("Job cancelled: {reason}")]
    Cancelled { reason: String },

    // Manifest serialization
    #[error("Manifest serialization failed: {0}")]
    Manifest(#[from] serde_json::Error),

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl LongscribeError {
    /// Whether the resilience policy may retry after this error.
    ///
    /// Staging failures, rate limits, transient network/5xx failures, and
    /// deadline overruns are retryable. Auth and permanent failures are not:
    /// retrying them wastes the budget without any chance of success.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LongscribeError::Staging { .. }
                | LongscribeError::RateLimited { .. }
                | LongscribeError::Transient { .. }
                | LongscribeError::Timeout { .. }
        )
    }
}

// Type alias for convenience
pub type Result<T> = std::result::Result<T, LongscribeError>;
