//! Speech-to-text provider capabilities and lookup.

#[cfg(feature = "http")]
pub mod http;
pub mod registry;
pub mod transcriber;

#[cfg(feature = "http")]
pub use http::{HttpTranscriber, HttpTranscriberConfig, registry_from_config};
pub use registry::TranscriberRegistry;
pub use transcriber::{
    ChunkPayload, MockTranscriber, ProviderTranscript, TranscribeOptions, Transcriber,
    WordTimestamp,
};
