//! Data types for transcription jobs.

use crate::audio::segmenter::SegmenterConfig;
use crate::defaults;
use crate::error::{LongscribeError, Result};
use crate::output::OutputFormat;
use crate::stt::transcriber::WordTimestamp;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Terminal status of one chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkStatus {
    /// Transcribed by the requested provider.
    Ok,
    /// Transcribed, but only after falling back to another provider.
    Degraded,
    /// Every provider in the chain exhausted its retries.
    Failed,
    /// The job was cancelled before this chunk was dispatched.
    Cancelled,
}

impl fmt::Display for ChunkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ChunkStatus::Ok => "ok",
            ChunkStatus::Degraded => "degraded",
            ChunkStatus::Failed => "failed",
            ChunkStatus::Cancelled => "cancelled",
        };
        write!(f, "{}", s)
    }
}

/// Orchestrator state machine for one job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Segmenting,
    Dispatching,
    Collecting,
    Assembling,
    Done,
    Failed,
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobState::Segmenting => "segmenting",
            JobState::Dispatching => "dispatching",
            JobState::Collecting => "collecting",
            JobState::Assembling => "assembling",
            JobState::Done => "done",
            JobState::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

/// A chunk's terminal answer.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptSegment {
    pub index: usize,
    pub start_ms: u64,
    pub end_ms: u64,
    pub text: String,
    pub timestamps: Option<Vec<WordTimestamp>>,
    /// Provider that actually produced the text; absent for chunks that
    /// never produced one.
    pub provider: Option<String>,
    pub status: ChunkStatus,
    pub error: Option<String>,
}

/// Input descriptor for one transcription job.
///
/// Immutable once submitted; the orchestrator owns all derived state.
#[derive(Debug, Clone)]
pub struct AudioJob {
    /// Source audio file (16-bit mono PCM WAV).
    pub source: PathBuf,
    /// Requested provider id.
    pub provider: String,
    /// Ordered fallback providers tried after the primary exhausts.
    pub fallbacks: Vec<String>,
    /// Transcript output path. The manifest lands next to it.
    pub output: PathBuf,
    pub format: OutputFormat,
    pub language: String,
    pub max_chunk_ms: u64,
    pub max_chunk_bytes: u64,
    pub silence_gap_ms: u64,
    pub silence_threshold: f32,
    /// Worker pool size for concurrent chunk dispatch.
    pub workers: usize,
    /// Separator between chunk transcripts in the final text.
    pub separator: String,
}

impl AudioJob {
    pub fn new(
        source: impl Into<PathBuf>,
        provider: &str,
        output: impl Into<PathBuf>,
    ) -> Self {
        Self {
            source: source.into(),
            provider: provider.to_string(),
            fallbacks: Vec::new(),
            output: output.into(),
            format: OutputFormat::Txt,
            language: defaults::DEFAULT_LANGUAGE.to_string(),
            max_chunk_ms: defaults::MAX_CHUNK_MS,
            max_chunk_bytes: defaults::MAX_CHUNK_BYTES,
            silence_gap_ms: defaults::SILENCE_GAP_MS,
            silence_threshold: defaults::SILENCE_THRESHOLD,
            workers: defaults::WORKERS,
            separator: defaults::SEGMENT_SEPARATOR.to_string(),
        }
    }

    pub fn with_fallbacks(mut self, fallbacks: Vec<String>) -> Self {
        self.fallbacks = fallbacks;
        self
    }

    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_language(mut self, language: &str) -> Self {
        self.language = language.to_string();
        self
    }

    pub fn with_max_chunk_ms(mut self, max_chunk_ms: u64) -> Self {
        self.max_chunk_ms = max_chunk_ms;
        self
    }

    pub fn with_max_chunk_bytes(mut self, max_chunk_bytes: u64) -> Self {
        self.max_chunk_bytes = max_chunk_bytes;
        self
    }

    pub fn with_silence_gap_ms(mut self, silence_gap_ms: u64) -> Self {
        self.silence_gap_ms = silence_gap_ms;
        self
    }

    pub fn with_silence_threshold(mut self, silence_threshold: f32) -> Self {
        self.silence_threshold = silence_threshold;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_separator(mut self, separator: &str) -> Self {
        self.separator = separator.to_string();
        self
    }

    /// The full provider chain: requested provider first, then fallbacks.
    pub fn chain(&self) -> Vec<String> {
        std::iter::once(self.provider.clone())
            .chain(self.fallbacks.iter().cloned())
            .collect()
    }

    pub fn segmenter_config(&self) -> SegmenterConfig {
        SegmenterConfig {
            max_chunk_ms: self.max_chunk_ms,
            max_chunk_bytes: self.max_chunk_bytes,
            silence_gap_ms: self.silence_gap_ms,
            silence_threshold: self.silence_threshold,
        }
    }

    /// Validates job parameters. A job that fails validation never starts.
    pub fn validate(&self) -> Result<()> {
        if self.provider.trim().is_empty() {
            return Err(LongscribeError::ConfigInvalidValue {
                key: "provider".to_string(),
                message: "must not be empty".to_string(),
            });
        }
        if self.fallbacks.iter().any(|f| f.trim().is_empty()) {
            return Err(LongscribeError::ConfigInvalidValue {
                key: "fallbacks".to_string(),
                message: "fallback provider ids must not be empty".to_string(),
            });
        }
        if self.workers == 0 {
            return Err(LongscribeError::ConfigInvalidValue {
                key: "workers".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.max_chunk_ms == 0 {
            return Err(LongscribeError::ConfigInvalidValue {
                key: "max_chunk_ms".to_string(),
                message: "must be positive".to_string(),
            });
        }
        if self.max_chunk_bytes == 0 {
            return Err(LongscribeError::ConfigInvalidValue {
                key: "max_chunk_bytes".to_string(),
                message: "must be positive".to_string(),
            });
        }
        if !(0.0..1.0).contains(&self.silence_threshold) {
            return Err(LongscribeError::ConfigInvalidValue {
                key: "silence_threshold".to_string(),
                message: format!("{} is outside 0.0..1.0", self.silence_threshold),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job() -> AudioJob {
        AudioJob::new("talk.wav", "azure", "talk.txt")
    }

    #[test]
    fn test_job_defaults() {
        let job = job();
        assert_eq!(job.max_chunk_ms, 60_000);
        assert_eq!(job.max_chunk_bytes, 10 * 1024 * 1024);
        assert_eq!(job.silence_gap_ms, 1_000);
        assert_eq!(job.workers, 4);
        assert_eq!(job.language, "auto");
        assert_eq!(job.format, OutputFormat::Txt);
        assert!(job.fallbacks.is_empty());
    }

    #[test]
    fn test_chain_puts_primary_first() {
        let job = job().with_fallbacks(vec!["whisper".to_string(), "volc".to_string()]);
        assert_eq!(job.chain(), vec!["azure", "whisper", "volc"]);
    }

    #[test]
    fn test_validate_accepts_defaults() {
        job().validate().unwrap();
    }

    #[test]
    fn test_validate_rejects_empty_provider() {
        let job = AudioJob::new("talk.wav", " ", "talk.txt");
        assert!(matches!(
            job.validate(),
            Err(LongscribeError::ConfigInvalidValue { key, .. }) if key == "provider"
        ));
    }

    #[test]
    fn test_validate_rejects_zero_workers() {
        let job = job().with_workers(0);
        assert!(job.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_out_of_range_threshold() {
        assert!(job().with_silence_threshold(1.5).validate().is_err());
        assert!(job().with_silence_threshold(-0.1).validate().is_err());
    }

    #[test]
    fn test_validate_rejects_empty_fallback_entry() {
        let job = job().with_fallbacks(vec!["".to_string()]);
        assert!(job.validate().is_err());
    }

    #[test]
    fn test_segmenter_config_mirrors_job() {
        let job = job()
            .with_max_chunk_ms(30_000)
            .with_silence_gap_ms(500)
            .with_silence_threshold(0.05);
        let config = job.segmenter_config();
        assert_eq!(config.max_chunk_ms, 30_000);
        assert_eq!(config.silence_gap_ms, 500);
        assert_eq!(config.silence_threshold, 0.05);
    }

    #[test]
    fn test_chunk_status_display() {
        assert_eq!(ChunkStatus::Ok.to_string(), "ok");
        assert_eq!(ChunkStatus::Degraded.to_string(), "degraded");
        assert_eq!(ChunkStatus::Failed.to_string(), "failed");
        assert_eq!(ChunkStatus::Cancelled.to_string(), "cancelled");
    }

    #[test]
    fn test_chunk_status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&ChunkStatus::Degraded).unwrap(),
            "\"degraded\""
        );
    }
}
