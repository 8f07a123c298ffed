//! longscribe - Long-audio speech-to-text pipeline
//!
//! Splits long audio into silence-aligned chunks, stages chunks for
//! providers that require a remote reference, transcribes each chunk
//! through a rate-limited, retrying provider chain, and reassembles the
//! transcript in time order with a manifest of the whole operation.

#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

pub mod audio;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod defaults;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod resilience;
pub mod staging;
pub mod stt;

// Core traits (decode → segment → stage → transcribe → assemble)
pub use audio::decoder::AudioDecoder;
pub use staging::{BlobStore, StagingStore};
pub use stt::transcriber::Transcriber;

// Pipeline
pub use pipeline::orchestrator::{JobHandle, Orchestrator};
pub use pipeline::{AudioJob, ChunkStatus, JobState, Manifest, TranscriptionResult};

// Error handling
pub use error::{LongscribeError, Result};

// Config
pub use config::Config;

// Provider lookup
pub use stt::registry::TranscriberRegistry;

// Resilience (for advanced users)
pub use resilience::{AttemptObserver, Clock, ResilienceConfig, ResiliencePolicy};

/// Build version string with optional git commit hash.
///
/// Returns `"0.1.0+abc1234"` when git hash is available, `"0.1.0"` otherwise.
pub fn version_string() -> String {
    let version = env!("CARGO_PKG_VERSION");
    match option_env!("GIT_HASH") {
        Some(hash) if !hash.is_empty() => format!("{}+{}", version, hash),
        _ => version.to_string(),
    }
}
