//! End-to-end pipeline tests using the public API with mock providers.

use longscribe::audio::decoder::MemoryDecoder;
use longscribe::output::manifest_path;
use longscribe::pipeline::manifest::{JobOutcome, Manifest};
use longscribe::pipeline::types::{AudioJob, ChunkStatus};
use longscribe::resilience::{MockClock, RateLimitConfig, ResilienceConfig};
use longscribe::staging::{MockBlobStore, StagingStore};
use longscribe::stt::transcriber::MockTranscriber;
use longscribe::{Orchestrator, TranscriberRegistry};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

// 1 sample per millisecond keeps test audio small
const RATE: u32 = 1000;
const LOUD: i16 = 10_000;

fn fast_resilience(max_attempts: u32) -> ResilienceConfig {
    ResilienceConfig {
        max_attempts,
        backoff_min: Duration::from_secs(4),
        backoff_max: Duration::from_secs(30),
        rate_limit: RateLimitConfig {
            max_requests: 10_000,
            window: Duration::from_secs(60),
        },
        deadline: Duration::from_secs(300),
    }
}

/// Audio with silence runs so the segmenter cuts at natural boundaries.
fn speech_with_pauses() -> Box<MemoryDecoder> {
    // 10s total, 1.2s pauses starting at 3s and 6.5s, 4s ceiling
    let mut samples = vec![LOUD; 10_000];
    samples[3_000..4_200].fill(0);
    samples[6_500..7_700].fill(0);
    Box::new(MemoryDecoder::new(samples, RATE))
}

fn read_manifest(output: &std::path::Path) -> Manifest {
    let raw = std::fs::read_to_string(manifest_path(output)).unwrap();
    serde_json::from_str(&raw).unwrap()
}

#[test]
fn transcribes_long_audio_across_silence_aligned_chunks() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("talk.txt");

    let provider = Arc::new(MockTranscriber::new("whisper").with_response("spoken words"));
    let registry = Arc::new(TranscriberRegistry::new().with_provider(provider.clone()));

    let orchestrator = Orchestrator::new(registry)
        .with_resilience(fast_resilience(1))
        .with_clock(Arc::new(MockClock::new()));

    let job = AudioJob::new("talk.wav", "whisper", &output)
        .with_max_chunk_ms(4_000)
        .with_workers(2);

    let result = orchestrator
        .submit_with_decoder(job, speech_with_pauses())
        .unwrap()
        .wait()
        .unwrap();

    // Cuts land on the silence starts, not the 4s ceiling
    assert_eq!(result.manifest.chunk_count, 3);
    assert_eq!(result.segments[0].end_ms, 3_000);
    assert_eq!(result.segments[1].end_ms, 6_500);
    assert_eq!(result.segments[2].end_ms, 10_000);
    assert_eq!(provider.calls(), 3);

    // Chunk boundaries are contiguous over the whole source
    for pair in result.segments.windows(2) {
        assert_eq!(pair[0].end_ms, pair[1].start_ms);
    }

    assert_eq!(result.text, "spoken words\nspoken words\nspoken words");
    assert_eq!(result.manifest.outcome, JobOutcome::Done);
    assert_eq!(result.manifest.source_duration_ms, 10_000);

    // Both artifacts are on disk
    let transcript = std::fs::read_to_string(&output).unwrap();
    assert!(transcript.contains("spoken words"));
    assert_eq!(read_manifest(&output).chunk_count, 3);
}

#[test]
fn staged_provider_with_inline_fallback_degrades_gracefully() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("talk.txt");

    // Primary needs staging but always times out; fallback accepts inline
    let primary = Arc::new(
        MockTranscriber::new("batch")
            .requiring_staging()
            .failing_transient(),
    );
    let fallback = Arc::new(MockTranscriber::new("realtime").with_response("rescued text"));
    let registry = Arc::new(
        TranscriberRegistry::new()
            .with_provider(primary.clone())
            .with_provider(fallback.clone()),
    );

    let store = Arc::new(MockBlobStore::new());
    let staging = Arc::new(StagingStore::new(store.clone()));

    let orchestrator = Orchestrator::new(registry)
        .with_staging(staging)
        .with_resilience(fast_resilience(2))
        .with_clock(Arc::new(MockClock::new()));

    let job = AudioJob::new("talk.wav", "batch", &output)
        .with_fallbacks(vec!["realtime".to_string()])
        .with_max_chunk_ms(5_000)
        .with_workers(1);

    let result = orchestrator
        .submit_with_decoder(job, speech_with_pauses())
        .unwrap()
        .wait()
        .unwrap();

    assert_eq!(result.manifest.outcome, JobOutcome::Done);
    assert_eq!(result.status_count(ChunkStatus::Degraded), 3);
    for segment in &result.segments {
        assert_eq!(segment.provider.as_deref(), Some("realtime"));
    }

    // Primary consumed its retry budget per chunk, staging once per chunk
    assert_eq!(primary.calls(), 6);
    assert_eq!(primary.staged_calls(), 6);
    assert_eq!(store.puts(), 3);
    // Staged objects cleaned up after completion
    assert_eq!(store.object_count(), 0);

    let manifest = read_manifest(&output);
    assert!(
        manifest
            .chunks
            .iter()
            .all(|c| c.status == ChunkStatus::Degraded)
    );
}

#[test]
fn mixed_chunk_failures_are_recorded_not_fatal() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("talk.srt");

    // Fails the first two calls; with 1 attempt per chunk and 1 worker,
    // chunks 0 and 1 fail while chunk 2 succeeds.
    let provider = Arc::new(
        MockTranscriber::new("flaky")
            .with_response("survived")
            .transient_failures(2),
    );
    let registry = Arc::new(TranscriberRegistry::new().with_provider(provider.clone()));

    let orchestrator = Orchestrator::new(registry)
        .with_resilience(fast_resilience(1))
        .with_clock(Arc::new(MockClock::new()));

    let job = AudioJob::new("talk.wav", "flaky", &output)
        .with_format("srt".parse().unwrap())
        .with_max_chunk_ms(4_000)
        .with_workers(1);

    let result = orchestrator
        .submit_with_decoder(job, speech_with_pauses())
        .unwrap()
        .wait()
        .unwrap();

    assert_eq!(result.manifest.outcome, JobOutcome::Done);
    assert_eq!(result.status_count(ChunkStatus::Failed), 2);
    assert_eq!(result.status_count(ChunkStatus::Ok), 1);
    assert_eq!(result.text, "survived");

    // Failed chunks carry their error reason in the manifest
    let manifest = read_manifest(&output);
    let failed: Vec<_> = manifest
        .chunks
        .iter()
        .filter(|c| c.status == ChunkStatus::Failed)
        .collect();
    assert_eq!(failed.len(), 2);
    assert!(failed.iter().all(|c| c.error.is_some()));

    // SRT output contains only the surviving chunk
    let transcript = std::fs::read_to_string(&output).unwrap();
    assert!(transcript.contains("survived"));
    assert!(transcript.starts_with("1\n"));
    assert!(!transcript.contains("2\n00:"));
}

#[test]
fn empty_audio_completes_immediately_with_empty_manifest() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("empty.txt");

    let registry = Arc::new(
        TranscriberRegistry::new().with_provider(Arc::new(MockTranscriber::new("whisper"))),
    );
    let orchestrator = Orchestrator::new(registry);

    let job = AudioJob::new("empty.wav", "whisper", &output);
    let result = orchestrator
        .submit_with_decoder(job, Box::new(MemoryDecoder::new(Vec::new(), RATE)))
        .unwrap()
        .wait()
        .unwrap();

    assert!(result.text.is_empty());
    assert_eq!(result.manifest.chunk_count, 0);
    assert_eq!(result.manifest.outcome, JobOutcome::Done);

    let manifest = read_manifest(&output);
    assert_eq!(manifest.source_duration_ms, 0);
    assert!(manifest.chunks.is_empty());
}
