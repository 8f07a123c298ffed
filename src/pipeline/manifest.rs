//! Manifest assembly: per-chunk results into the job's final record.

use crate::defaults;
use crate::pipeline::types::{ChunkStatus, TranscriptSegment};
use serde::{Deserialize, Serialize};

/// Terminal outcome of a job.
///
/// `Failed` is reserved for job-level conditions (cancellation); chunk
/// failures leave the job `Done` and surface in the per-chunk table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum JobOutcome {
    Done,
    Failed { reason: String },
}

/// Byte accounting for one chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkSizes {
    pub index: usize,
    pub bytes_original: u64,
    /// Size of the staged object, when the chunk was staged.
    pub bytes_staged: Option<u64>,
}

/// One row of the manifest's chunk table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkReport {
    pub index: usize,
    pub start_ms: u64,
    pub end_ms: u64,
    pub duration_ms: u64,
    pub bytes_original: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bytes_staged: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compression_ratio: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    pub status: ChunkStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Structured record of a job's outcome, persisted next to the transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub source: String,
    pub requested_provider: String,
    pub source_duration_ms: u64,
    pub chunk_count: usize,
    pub text_chars: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average_compression_ratio: Option<f64>,
    pub outcome: JobOutcome,
    pub chunks: Vec<ChunkReport>,
}

/// A job's final output: ordered text, the segments behind it, and the
/// manifest.
#[derive(Debug, Clone)]
pub struct TranscriptionResult {
    pub text: String,
    /// Segments in chunk index order.
    pub segments: Vec<TranscriptSegment>,
    pub manifest: Manifest,
}

impl TranscriptionResult {
    pub fn status_count(&self, status: ChunkStatus) -> usize {
        self.segments.iter().filter(|s| s.status == status).count()
    }
}

/// Pure assembler from segments and byte sizes to a `TranscriptionResult`.
///
/// Deterministic given identical inputs; never mutates its arguments beyond
/// sorting its own copy of the segments into index order.
pub struct ManifestBuilder {
    separator: String,
}

impl ManifestBuilder {
    pub fn new() -> Self {
        Self {
            separator: defaults::SEGMENT_SEPARATOR.to_string(),
        }
    }

    pub fn with_separator(mut self, separator: &str) -> Self {
        self.separator = separator.to_string();
        self
    }

    pub fn build(
        &self,
        source: &str,
        requested_provider: &str,
        source_duration_ms: u64,
        mut segments: Vec<TranscriptSegment>,
        sizes: &[ChunkSizes],
        outcome: JobOutcome,
    ) -> TranscriptionResult {
        // Final ordering is always by chunk index, never arrival order.
        segments.sort_by_key(|s| s.index);

        let text = segments
            .iter()
            .filter(|s| {
                matches!(s.status, ChunkStatus::Ok | ChunkStatus::Degraded) && !s.text.is_empty()
            })
            .map(|s| s.text.as_str())
            .collect::<Vec<_>>()
            .join(&self.separator);

        let chunks: Vec<ChunkReport> = segments
            .iter()
            .map(|segment| {
                let size = sizes.iter().find(|s| s.index == segment.index);
                let bytes_original = size.map(|s| s.bytes_original).unwrap_or(0);
                let bytes_staged = size.and_then(|s| s.bytes_staged);
                let compression_ratio = match (bytes_original, bytes_staged) {
                    (original, Some(staged)) if original > 0 => {
                        Some(staged as f64 / original as f64)
                    }
                    _ => None,
                };
                ChunkReport {
                    index: segment.index,
                    start_ms: segment.start_ms,
                    end_ms: segment.end_ms,
                    duration_ms: segment.end_ms - segment.start_ms,
                    bytes_original,
                    bytes_staged,
                    compression_ratio,
                    provider: segment.provider.clone(),
                    status: segment.status,
                    error: segment.error.clone(),
                }
            })
            .collect();

        let ratios: Vec<f64> = chunks.iter().filter_map(|c| c.compression_ratio).collect();
        let average_compression_ratio = if ratios.is_empty() {
            None
        } else {
            Some(ratios.iter().sum::<f64>() / ratios.len() as f64)
        };

        let manifest = Manifest {
            source: source.to_string(),
            requested_provider: requested_provider.to_string(),
            source_duration_ms,
            chunk_count: segments.len(),
            text_chars: text.chars().count(),
            average_compression_ratio,
            outcome,
            chunks,
        };

        TranscriptionResult {
            text,
            segments,
            manifest,
        }
    }
}

impl Default for ManifestBuilder {
    fn default() -> Self {
        Self::new()
    }
}
