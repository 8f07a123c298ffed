use crate::error::{LongscribeError, Result};
use crate::output::OutputFormat;
use crate::pipeline::types::AudioJob;
use crate::resilience::{RateLimitConfig, ResilienceConfig};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub job: JobConfig,
    pub resilience: ResilienceSection,
    pub staging: StagingConfig,
    /// Provider table, keyed by provider id.
    pub providers: BTreeMap<String, ProviderEntry>,
}

/// Job parameter defaults
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct JobConfig {
    pub provider: String,
    pub fallbacks: Vec<String>,
    pub language: String,
    pub format: String,
    pub max_chunk_secs: u64,
    pub max_chunk_bytes: u64,
    pub silence_gap_ms: u64,
    pub silence_threshold: f32,
    pub workers: usize,
    pub separator: String,
}

/// Retry, backoff, and rate-limit settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ResilienceSection {
    pub max_attempts: u32,
    pub backoff_min_secs: u64,
    pub backoff_max_secs: u64,
    pub rate_limit_requests: u32,
    pub rate_limit_window_secs: u64,
    pub deadline_secs: u64,
}

/// Staging store settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StagingConfig {
    /// Directory for the filesystem-backed store. Resolved by the caller
    /// when absent.
    pub dir: Option<PathBuf>,
    pub ttl_secs: u64,
}

/// One configured provider.
///
/// API keys are never stored in the file; `api_key_env` names the
/// environment variable holding the key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct ProviderEntry {
    pub endpoint: String,
    pub model: String,
    pub api_key_env: Option<String>,
    pub requires_staging: bool,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            provider: String::new(),
            fallbacks: Vec::new(),
            language: crate::defaults::DEFAULT_LANGUAGE.to_string(),
            format: "txt".to_string(),
            max_chunk_secs: crate::defaults::MAX_CHUNK_MS / 1000,
            max_chunk_bytes: crate::defaults::MAX_CHUNK_BYTES,
            silence_gap_ms: crate::defaults::SILENCE_GAP_MS,
            silence_threshold: crate::defaults::SILENCE_THRESHOLD,
            workers: crate::defaults::WORKERS,
            separator: crate::defaults::SEGMENT_SEPARATOR.to_string(),
        }
    }
}

impl Default for ResilienceSection {
    fn default() -> Self {
        Self {
            max_attempts: crate::defaults::MAX_ATTEMPTS,
            backoff_min_secs: crate::defaults::BACKOFF_MIN_SECS,
            backoff_max_secs: crate::defaults::BACKOFF_MAX_SECS,
            rate_limit_requests: crate::defaults::RATE_LIMIT_REQUESTS,
            rate_limit_window_secs: crate::defaults::RATE_LIMIT_WINDOW_SECS,
            deadline_secs: crate::defaults::DEADLINE_SECS,
        }
    }
}

impl Default for StagingConfig {
    fn default() -> Self {
        Self {
            dir: None,
            ttl_secs: crate::defaults::STAGING_TTL_SECS,
        }
    }
}

impl ResilienceSection {
    pub fn deadline(&self) -> Duration {
        Duration::from_secs(self.deadline_secs)
    }

    pub fn to_config(&self) -> ResilienceConfig {
        ResilienceConfig {
            max_attempts: self.max_attempts,
            backoff_min: Duration::from_secs(self.backoff_min_secs),
            backoff_max: Duration::from_secs(self.backoff_max_secs),
            rate_limit: RateLimitConfig {
                max_requests: self.rate_limit_requests,
                window: Duration::from_secs(self.rate_limit_window_secs),
            },
            deadline: self.deadline(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Returns an error if the file contains invalid TOML.
    /// Missing fields will use default values.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from a file or return defaults if file doesn't exist
    ///
    /// Only returns defaults if the file is missing.
    /// Returns errors for invalid TOML.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                if e.downcast_ref::<std::io::Error>()
                    .map(|io_err| io_err.kind() == std::io::ErrorKind::NotFound)
                    .unwrap_or(false)
                {
                    Self::default()
                } else {
                    panic!("Failed to load config from {}: {}", path.display(), e);
                }
            }
        }
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - LONGSCRIBE_PROVIDER → job.provider
    /// - LONGSCRIBE_LANGUAGE → job.language
    /// - LONGSCRIBE_STAGING_DIR → staging.dir
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(provider) = std::env::var("LONGSCRIBE_PROVIDER")
            && !provider.is_empty()
        {
            self.job.provider = provider;
        }

        if let Ok(language) = std::env::var("LONGSCRIBE_LANGUAGE")
            && !language.is_empty()
        {
            self.job.language = language;
        }

        if let Ok(dir) = std::env::var("LONGSCRIBE_STAGING_DIR")
            && !dir.is_empty()
        {
            self.staging.dir = Some(PathBuf::from(dir));
        }

        self
    }

    /// Get the default configuration file path
    ///
    /// Returns ~/.config/longscribe/config.toml on Linux
    #[cfg(feature = "cli")]
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .expect("Could not determine config directory")
            .join("longscribe")
            .join("config.toml")
    }

    /// Builds a job from these settings for the given source/output paths.
    pub fn audio_job(&self, source: &Path, output: &Path) -> Result<AudioJob> {
        if self.job.provider.trim().is_empty() {
            return Err(LongscribeError::ConfigInvalidValue {
                key: "job.provider".to_string(),
                message: "no provider configured (set job.provider or pass --provider)"
                    .to_string(),
            });
        }
        let format: OutputFormat = self.job.format.parse()?;

        Ok(AudioJob::new(source, &self.job.provider, output)
            .with_fallbacks(self.job.fallbacks.clone())
            .with_format(format)
            .with_language(&self.job.language)
            .with_max_chunk_ms(self.job.max_chunk_secs * 1000)
            .with_max_chunk_bytes(self.job.max_chunk_bytes)
            .with_silence_gap_ms(self.job.silence_gap_ms)
            .with_silence_threshold(self.job.silence_threshold)
            .with_workers(self.job.workers)
            .with_separator(&self.job.separator))
    }

    pub fn resilience_config(&self) -> ResilienceConfig {
        self.resilience.to_config()
    }

    pub fn staging_ttl(&self) -> Duration {
        Duration::from_secs(self.staging.ttl_secs)
    }
}
