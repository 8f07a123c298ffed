//! Transcriber capability: one audio chunk in, text out.

use crate::defaults;
use crate::error::{LongscribeError, Result};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

/// Payload handed to a provider.
///
/// Providers that accept inline bytes receive the chunk as an in-memory WAV
/// file; providers that require a remote reference receive the staged URL.
#[derive(Debug, Clone)]
pub enum ChunkPayload {
    Inline { wav: Vec<u8> },
    Staged { url: String },
}

/// Per-call transcription options.
#[derive(Debug, Clone)]
pub struct TranscribeOptions {
    /// Language code, or "auto" for provider-side detection.
    pub language: String,
}

impl Default for TranscribeOptions {
    fn default() -> Self {
        Self {
            language: defaults::DEFAULT_LANGUAGE.to_string(),
        }
    }
}

/// One recognized token with its position on the chunk timeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WordTimestamp {
    pub start_ms: u64,
    pub end_ms: u64,
    pub token: String,
}

/// A provider's answer for one chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderTranscript {
    pub text: String,
    pub timestamps: Option<Vec<WordTimestamp>>,
}

/// Trait for speech-to-text providers.
///
/// This trait allows swapping implementations (real HTTP providers vs mock).
/// Errors use the crate taxonomy the resilience policy switches on:
/// `Auth`/`Permanent` fail immediately, `RateLimited`/`Transient`/`Timeout`
/// are retried.
pub trait Transcriber: Send + Sync {
    /// Transcribes one chunk.
    fn transcribe(
        &self,
        payload: &ChunkPayload,
        options: &TranscribeOptions,
    ) -> Result<ProviderTranscript>;

    /// Stable identifier used in configuration and manifests.
    fn provider_id(&self) -> &str;

    /// Whether this provider needs a fetchable reference instead of
    /// inline bytes.
    fn requires_staging(&self) -> bool {
        false
    }
}

/// Implement Transcriber for Arc<T> to allow sharing across workers.
impl<T: Transcriber> Transcriber for Arc<T> {
    fn transcribe(
        &self,
        payload: &ChunkPayload,
        options: &TranscribeOptions,
    ) -> Result<ProviderTranscript> {
        (**self).transcribe(payload, options)
    }

    fn provider_id(&self) -> &str {
        (**self).provider_id()
    }

    fn requires_staging(&self) -> bool {
        (**self).requires_staging()
    }
}

/// Scripted failure behavior for the mock.
#[derive(Debug, Clone, Copy)]
enum MockBehavior {
    Succeed,
    FailTransient,
    FailAuth,
    FailPermanent,
    /// Fail the first N calls with a transient error, then succeed.
    TransientThenSucceed(u32),
}

/// Mock transcriber for testing.
pub struct MockTranscriber {
    id: String,
    response: String,
    requires_staging: bool,
    behavior: MockBehavior,
    calls: AtomicU32,
    staged_calls: AtomicU32,
}

impl MockTranscriber {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            response: "mock transcription".to_string(),
            requires_staging: false,
            behavior: MockBehavior::Succeed,
            calls: AtomicU32::new(0),
            staged_calls: AtomicU32::new(0),
        }
    }

    /// Configure the mock to return a specific response.
    pub fn with_response(mut self, response: &str) -> Self {
        self.response = response.to_string();
        self
    }

    /// Configure the mock to demand staged payloads.
    pub fn requiring_staging(mut self) -> Self {
        self.requires_staging = true;
        self
    }

    /// Fail every call with a transient error.
    pub fn failing_transient(mut self) -> Self {
        self.behavior = MockBehavior::FailTransient;
        self
    }

    /// Fail every call with an auth error.
    pub fn failing_auth(mut self) -> Self {
        self.behavior = MockBehavior::FailAuth;
        self
    }

    /// Fail every call with a permanent error.
    pub fn failing_permanent(mut self) -> Self {
        self.behavior = MockBehavior::FailPermanent;
        self
    }

    /// Fail the first `n` calls transiently, then succeed.
    pub fn transient_failures(mut self, n: u32) -> Self {
        self.behavior = MockBehavior::TransientThenSucceed(n);
        self
    }

    /// Total calls received.
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Calls that carried a staged reference rather than inline bytes.
    pub fn staged_calls(&self) -> u32 {
        self.staged_calls.load(Ordering::SeqCst)
    }
}

impl Transcriber for MockTranscriber {
    fn transcribe(
        &self,
        payload: &ChunkPayload,
        _options: &TranscribeOptions,
    ) -> Result<ProviderTranscript> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if matches!(payload, ChunkPayload::Staged { .. }) {
            self.staged_calls.fetch_add(1, Ordering::SeqCst);
        }

        match self.behavior {
            MockBehavior::Succeed => {}
            MockBehavior::FailTransient => {
                return Err(LongscribeError::Transient {
                    message: "mock transient failure".to_string(),
                });
            }
            MockBehavior::FailAuth => {
                return Err(LongscribeError::Auth {
                    provider: self.id.clone(),
                    message: "mock auth failure".to_string(),
                });
            }
            MockBehavior::FailPermanent => {
                return Err(LongscribeError::Permanent {
                    message: "mock permanent failure".to_string(),
                });
            }
            MockBehavior::TransientThenSucceed(n) => {
                if call <= n {
                    return Err(LongscribeError::Transient {
                        message: format!("mock transient failure {}", call),
                    });
                }
            }
        }

        Ok(ProviderTranscript {
            text: self.response.clone(),
            timestamps: None,
        })
    }

    fn provider_id(&self) -> &str {
        &self.id
    }

    fn requires_staging(&self) -> bool {
        self.requires_staging
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inline() -> ChunkPayload {
        ChunkPayload::Inline { wav: vec![0; 44] }
    }

    #[test]
    fn test_mock_returns_response() {
        let transcriber = MockTranscriber::new("test").with_response("hello world");
        let result = transcriber
            .transcribe(&inline(), &TranscribeOptions::default())
            .unwrap();
        assert_eq!(result.text, "hello world");
        assert_eq!(transcriber.calls(), 1);
    }

    #[test]
    fn test_mock_transient_failures_then_success() {
        let transcriber = MockTranscriber::new("test").transient_failures(2);
        let options = TranscribeOptions::default();

        assert!(transcriber.transcribe(&inline(), &options).is_err());
        assert!(transcriber.transcribe(&inline(), &options).is_err());
        assert!(transcriber.transcribe(&inline(), &options).is_ok());
        assert_eq!(transcriber.calls(), 3);
    }

    #[test]
    fn test_mock_auth_failure_is_not_retryable() {
        let transcriber = MockTranscriber::new("test").failing_auth();
        let err = transcriber
            .transcribe(&inline(), &TranscribeOptions::default())
            .unwrap_err();
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_mock_counts_staged_calls() {
        let transcriber = MockTranscriber::new("test").requiring_staging();
        assert!(transcriber.requires_staging());

        let staged = ChunkPayload::Staged {
            url: "mock://abc.wav".to_string(),
        };
        transcriber
            .transcribe(&staged, &TranscribeOptions::default())
            .unwrap();
        transcriber
            .transcribe(&inline(), &TranscribeOptions::default())
            .unwrap();

        assert_eq!(transcriber.staged_calls(), 1);
        assert_eq!(transcriber.calls(), 2);
    }

    #[test]
    fn test_transcriber_trait_is_object_safe() {
        let transcriber: Box<dyn Transcriber> =
            Box::new(MockTranscriber::new("boxed").with_response("boxed test"));
        assert_eq!(transcriber.provider_id(), "boxed");
        assert!(!transcriber.requires_staging());
    }

    #[test]
    fn test_default_options_use_auto_language() {
        assert_eq!(TranscribeOptions::default().language, "auto");
    }
}
