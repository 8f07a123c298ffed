//! HTTP transcription provider for OpenAI-compatible endpoints.
//!
//! Inline providers receive the chunk as a multipart WAV upload; providers
//! that work from a staged reference receive a JSON body carrying the URL.
//! HTTP status codes map onto the crate error taxonomy so the resilience
//! policy can decide what to retry.

use crate::config::Config;
use crate::error::{LongscribeError, Result};
use crate::stt::registry::TranscriberRegistry;
use crate::stt::transcriber::{
    ChunkPayload, ProviderTranscript, TranscribeOptions, Transcriber, WordTimestamp,
};
use std::sync::Arc;
use std::time::Duration;

/// Configuration for one HTTP provider.
///
/// Validated once at construction; there is no implicit defaulting at call
/// time.
#[derive(Debug, Clone)]
pub struct HttpTranscriberConfig {
    pub provider_id: String,
    /// Full endpoint URL, e.g. `https://host/v1/audio/transcriptions`.
    pub endpoint: String,
    pub model: String,
    pub api_key: Option<String>,
    pub requires_staging: bool,
    /// Request timeout; the unit-of-work deadline.
    pub timeout: Duration,
}

impl HttpTranscriberConfig {
    pub fn validate(&self) -> Result<()> {
        if self.provider_id.trim().is_empty() {
            return Err(LongscribeError::ConfigInvalidValue {
                key: "provider_id".to_string(),
                message: "must not be empty".to_string(),
            });
        }
        if !self.endpoint.starts_with("http://") && !self.endpoint.starts_with("https://") {
            return Err(LongscribeError::ConfigInvalidValue {
                key: format!("providers.{}.endpoint", self.provider_id),
                message: format!("'{}' is not an http(s) URL", self.endpoint),
            });
        }
        Ok(())
    }
}

/// Transcriber backed by an OpenAI-compatible HTTP endpoint.
pub struct HttpTranscriber {
    config: HttpTranscriberConfig,
    client: reqwest::blocking::Client,
}

impl HttpTranscriber {
    pub fn new(config: HttpTranscriberConfig) -> Result<Self> {
        config.validate()?;
        let client = reqwest::blocking::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LongscribeError::ConfigInvalidValue {
                key: format!("providers.{}", config.provider_id),
                message: format!("cannot build HTTP client: {}", e),
            })?;
        Ok(Self { config, client })
    }

    fn transport_error(&self, e: reqwest::Error) -> LongscribeError {
        if e.is_timeout() {
            LongscribeError::Timeout {
                message: format!(
                    "{} did not answer within {:?}",
                    self.config.provider_id, self.config.timeout
                ),
            }
        } else {
            LongscribeError::Transient {
                message: e.to_string(),
            }
        }
    }
}

impl Transcriber for HttpTranscriber {
    fn transcribe(
        &self,
        payload: &ChunkPayload,
        options: &TranscribeOptions,
    ) -> Result<ProviderTranscript> {
        let request = match payload {
            ChunkPayload::Inline { wav } => {
                let part = reqwest::blocking::multipart::Part::bytes(wav.clone())
                    .file_name("chunk.wav")
                    .mime_str("audio/wav")
                    .map_err(|e| LongscribeError::Permanent {
                        message: format!("cannot build upload part: {}", e),
                    })?;
                let mut form = reqwest::blocking::multipart::Form::new()
                    .part("file", part)
                    .text("model", self.config.model.clone());
                if options.language != crate::defaults::DEFAULT_LANGUAGE {
                    form = form.text("language", options.language.clone());
                }
                self.client.post(&self.config.endpoint).multipart(form)
            }
            ChunkPayload::Staged { url } => {
                let mut body = serde_json::json!({
                    "model": self.config.model,
                    "contentUrl": url,
                });
                if options.language != crate::defaults::DEFAULT_LANGUAGE
                    && let Some(map) = body.as_object_mut()
                {
                    map.insert(
                        "language".to_string(),
                        serde_json::Value::String(options.language.clone()),
                    );
                }
                self.client.post(&self.config.endpoint).json(&body)
            }
        };

        let request = match &self.config.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        };

        let response = request.send().map_err(|e| self.transport_error(e))?;
        let status = response.status().as_u16();
        if !(200..300).contains(&status) {
            let body = response.text().unwrap_or_default();
            return Err(classify_status(&self.config.provider_id, status, &body));
        }

        let json: serde_json::Value =
            response.json().map_err(|e| LongscribeError::Permanent {
                message: format!("malformed response from {}: {}", self.config.provider_id, e),
            })?;

        let text = json
            .get("text")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string();

        Ok(ProviderTranscript {
            text,
            timestamps: parse_word_timestamps(&json),
        })
    }

    fn provider_id(&self) -> &str {
        &self.config.provider_id
    }

    fn requires_staging(&self) -> bool {
        self.config.requires_staging
    }
}

/// Maps a non-success HTTP status onto the error taxonomy.
fn classify_status(provider: &str, status: u16, body: &str) -> LongscribeError {
    let detail = truncate(body, 200);
    match status {
        401 | 403 => LongscribeError::Auth {
            provider: provider.to_string(),
            message: format!("{}: {}", status, detail),
        },
        429 => LongscribeError::RateLimited {
            provider: provider.to_string(),
        },
        500..=599 => LongscribeError::Transient {
            message: format!("{} returned {}: {}", provider, status, detail),
        },
        _ => LongscribeError::Permanent {
            message: format!("{} returned {}: {}", provider, status, detail),
        },
    }
}

/// Extracts `words: [{word, start, end}]` timestamps when present.
///
/// Providers report word offsets in seconds (fractional); the pipeline
/// works in milliseconds.
fn parse_word_timestamps(json: &serde_json::Value) -> Option<Vec<WordTimestamp>> {
    let words = json.get("words")?.as_array()?;
    let parsed: Vec<WordTimestamp> = words
        .iter()
        .filter_map(|w| {
            Some(WordTimestamp {
                token: w.get("word")?.as_str()?.to_string(),
                start_ms: (w.get("start")?.as_f64()? * 1000.0) as u64,
                end_ms: (w.get("end")?.as_f64()? * 1000.0) as u64,
            })
        })
        .collect();
    if parsed.is_empty() { None } else { Some(parsed) }
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        let mut end = max;
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}…", &s[..end])
    }
}

/// Builds the provider registry from configuration.
///
/// Every configured provider becomes an `HttpTranscriber`; API keys are read
/// from the environment variable each entry names, and a named-but-missing
/// variable is a configuration error rather than a call-time surprise.
pub fn registry_from_config(config: &Config) -> Result<TranscriberRegistry> {
    let mut registry = TranscriberRegistry::new();
    let timeout = config.resilience.deadline();

    for (id, entry) in &config.providers {
        let api_key = match &entry.api_key_env {
            Some(var) => match std::env::var(var) {
                Ok(value) if !value.is_empty() => Some(value),
                _ => {
                    return Err(LongscribeError::ConfigInvalidValue {
                        key: format!("providers.{}.api_key_env", id),
                        message: format!("environment variable {} is not set", var),
                    });
                }
            },
            None => None,
        };

        let transcriber = HttpTranscriber::new(HttpTranscriberConfig {
            provider_id: id.clone(),
            endpoint: entry.endpoint.clone(),
            model: entry.model.clone(),
            api_key,
            requires_staging: entry.requires_staging,
            timeout,
        })?;
        registry.register(Arc::new(transcriber));
    }

    Ok(registry)
}
