//! Retry, backoff, and fallback policy wrapping one unit of remote work.

use crate::error::{LongscribeError, Result};
use crate::resilience::clock::{Clock, SystemClock};
use crate::resilience::limiter::{RateLimitConfig, RateLimiter};
use std::sync::Arc;
use std::time::Duration;

/// Configuration for the resilience policy.
#[derive(Debug, Clone, Copy)]
pub struct ResilienceConfig {
    /// Maximum attempts per provider (first try included).
    pub max_attempts: u32,
    /// Initial backoff between retries; doubles per retry.
    pub backoff_min: Duration,
    /// Backoff ceiling.
    pub backoff_max: Duration,
    /// Request budget shared by every worker of a job.
    pub rate_limit: RateLimitConfig,
    /// Deadline for one unit of work. Transports enforce this as their
    /// request timeout; an overrun surfaces as a retryable `Timeout` error.
    pub deadline: Duration,
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            max_attempts: crate::defaults::MAX_ATTEMPTS,
            backoff_min: Duration::from_secs(crate::defaults::BACKOFF_MIN_SECS),
            backoff_max: Duration::from_secs(crate::defaults::BACKOFF_MAX_SECS),
            rate_limit: RateLimitConfig::default(),
            deadline: Duration::from_secs(crate::defaults::DEADLINE_SECS),
        }
    }
}

/// Outcome of a single attempt, as seen by the observer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    Succeeded,
    /// Failed but eligible for retry or fallback.
    Retryable(String),
    /// Failed with no chance of success on retry.
    Fatal(String),
}

/// Receives one event per attempt for audit and metrics.
///
/// The policy itself holds no persistent log.
pub trait AttemptObserver: Send + Sync {
    fn on_attempt(&self, provider: &str, outcome: &AttemptOutcome, latency: Duration);
}

/// Attempt observer that logs failures to stderr.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogAttemptObserver;

impl AttemptObserver for LogAttemptObserver {
    fn on_attempt(&self, provider: &str, outcome: &AttemptOutcome, latency: Duration) {
        match outcome {
            AttemptOutcome::Succeeded => {}
            AttemptOutcome::Retryable(msg) => {
                eprintln!(
                    "longscribe: [{}] retryable failure after {:?}: {}",
                    provider, latency, msg
                );
            }
            AttemptOutcome::Fatal(msg) => {
                eprintln!(
                    "longscribe: [{}] fatal failure after {:?}: {}",
                    provider, latency, msg
                );
            }
        }
    }
}

/// A successfully executed unit of work with its provenance.
#[derive(Debug)]
pub struct Executed<T> {
    pub value: T,
    /// Provider that actually produced the result.
    pub provider: String,
    /// True when a fallback provider produced the result.
    pub fell_back: bool,
    /// Attempts consumed against the winning provider.
    pub attempts: u32,
}

/// Rate limiter + retry-with-backoff + ordered fallback chain around a
/// zero-argument unit of work.
pub struct ResiliencePolicy {
    config: ResilienceConfig,
    limiter: RateLimiter,
    clock: Arc<dyn Clock>,
    observer: Arc<dyn AttemptObserver>,
}

impl ResiliencePolicy {
    /// Creates a policy with the system clock and stderr failure logging.
    pub fn new(config: ResilienceConfig) -> Self {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        Self {
            limiter: RateLimiter::new(config.rate_limit, clock.clone()),
            config,
            clock,
            observer: Arc::new(LogAttemptObserver),
        }
    }

    /// Sets a custom clock (for deterministic testing).
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.limiter = RateLimiter::new(self.config.rate_limit, clock.clone());
        self.clock = clock;
        self
    }

    /// Sets a custom attempt observer.
    pub fn with_observer(mut self, observer: Arc<dyn AttemptObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn config(&self) -> &ResilienceConfig {
        &self.config
    }

    /// Executes `work` against an ordered provider chain.
    ///
    /// For each provider in order: rate-limit, attempt, retry with
    /// exponential backoff on retryable failures up to `max_attempts`. A
    /// non-retryable failure exhausts that provider immediately without
    /// consuming retries. The next provider starts with a fresh retry
    /// budget. The error of the last attempt is returned once every
    /// provider has exhausted.
    pub fn execute<T, F>(&self, providers: &[&str], mut work: F) -> Result<Executed<T>>
    where
        F: FnMut(&str) -> Result<T>,
    {
        if providers.is_empty() {
            return Err(LongscribeError::ConfigInvalidValue {
                key: "providers".to_string(),
                message: "provider chain is empty".to_string(),
            });
        }

        let mut last_error = None;

        for (position, provider) in providers.iter().copied().enumerate() {
            let mut backoff = self.config.backoff_min;

            for attempt in 1..=self.config.max_attempts {
                self.limiter.acquire();
                let start = self.clock.now();

                match work(provider) {
                    Ok(value) => {
                        let latency = self.clock.now().duration_since(start);
                        self.observer
                            .on_attempt(provider, &AttemptOutcome::Succeeded, latency);
                        return Ok(Executed {
                            value,
                            provider: provider.to_string(),
                            fell_back: position > 0,
                            attempts: attempt,
                        });
                    }
                    Err(e) if e.is_retryable() => {
                        let latency = self.clock.now().duration_since(start);
                        self.observer.on_attempt(
                            provider,
                            &AttemptOutcome::Retryable(e.to_string()),
                            latency,
                        );
                        last_error = Some(e);
                        if attempt < self.config.max_attempts {
                            self.clock.sleep(backoff);
                            backoff = (backoff * 2).min(self.config.backoff_max);
                        }
                    }
                    Err(e) => {
                        let latency = self.clock.now().duration_since(start);
                        self.observer.on_attempt(
                            provider,
                            &AttemptOutcome::Fatal(e.to_string()),
                            latency,
                        );
                        last_error = Some(e);
                        break;
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| LongscribeError::Permanent {
            message: "no attempts were made".to_string(),
        }))
    }
}
