//! Default configuration constants for longscribe.
//!
//! This module provides shared constants used across different configuration types
//! to ensure consistency and eliminate duplication.

/// Default audio sample rate in Hz.
///
/// 16kHz is the standard for speech recognition and provides a good balance
/// between quality and computational efficiency for voice applications.
pub const SAMPLE_RATE: u32 = 16000;

/// Default maximum chunk duration in milliseconds.
///
/// Remote speech providers reject audio beyond a duration threshold;
/// 60 seconds stays comfortably under the common one-request limits.
pub const MAX_CHUNK_MS: u64 = 60_000;

/// Default maximum chunk payload size in bytes (10 MiB).
///
/// Matches the upload ceiling enforced by the common transcription endpoints.
pub const MAX_CHUNK_BYTES: u64 = 10 * 1024 * 1024;

/// Default minimum silence run length in milliseconds for a cut candidate.
///
/// A full second of silence almost always marks a sentence boundary, so
/// cutting there avoids splitting mid-word.
pub const SILENCE_GAP_MS: u64 = 1_000;

/// Default RMS threshold below which a frame counts as silence (0.0 to 1.0).
pub const SILENCE_THRESHOLD: f32 = 0.01;

/// Frame length used when scanning for silence, in milliseconds.
pub const FRAME_MS: u64 = 10;

/// Default number of worker threads dispatching chunks concurrently.
pub const WORKERS: usize = 4;

/// Default language code for transcription.
///
/// "auto" lets the provider detect the spoken language.
/// Set to a specific code (e.g., "en", "de") to force a language.
pub const DEFAULT_LANGUAGE: &str = "auto";

/// Default separator placed between chunk transcripts in the final text.
pub const SEGMENT_SEPARATOR: &str = "\n";

/// Default maximum attempts per provider (first try + retries).
pub const MAX_ATTEMPTS: u32 = 5;

/// Default minimum backoff between retries, in seconds.
pub const BACKOFF_MIN_SECS: u64 = 4;

/// Default maximum backoff between retries, in seconds.
pub const BACKOFF_MAX_SECS: u64 = 30;

/// Default rate limit budget: requests allowed per window.
pub const RATE_LIMIT_REQUESTS: u32 = 20;

/// Default rate limit window in seconds.
pub const RATE_LIMIT_WINDOW_SECS: u64 = 60;

/// Default deadline for one unit of work (stage + transcribe), in seconds.
pub const DEADLINE_SECS: u64 = 300;

/// Default time-to-live for staged objects, in seconds (2 hours).
///
/// Providers with an asynchronous completion model need a replay window
/// to fetch the staged audio; two hours covers the slowest batch queues.
pub const STAGING_TTL_SECS: u64 = 2 * 60 * 60;

/// Suffix appended to the transcript path for the manifest sidecar file.
pub const MANIFEST_SUFFIX: &str = ".manifest.json";
