//! Transcription pipeline: job types, orchestration, and manifests.
//!
//! A job flows `Segmenting → Dispatching → Collecting → Assembling`, with
//! chunks processed by a bounded worker pool and reassembled in index order.

pub mod manifest;
pub mod orchestrator;
pub mod progress;
pub mod types;

pub use manifest::{
    ChunkReport, ChunkSizes, JobOutcome, Manifest, ManifestBuilder, TranscriptionResult,
};
pub use orchestrator::{JobHandle, Orchestrator};
pub use progress::{LogProgress, NullProgress, ProgressObserver};
pub use types::{AudioJob, ChunkStatus, JobState, TranscriptSegment};
