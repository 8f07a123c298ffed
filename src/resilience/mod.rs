//! Resilience layer: rate limiting, retry with backoff, and provider fallback.
//!
//! One `ResiliencePolicy` wraps each chunk's unit of work (stage + transcribe)
//! and is shared across all workers of a job.

pub mod clock;
pub mod limiter;
pub mod policy;

pub use clock::{Clock, MockClock, SystemClock};
pub use limiter::{RateLimitConfig, RateLimiter};
pub use policy::{
    AttemptObserver, AttemptOutcome, Executed, LogAttemptObserver, ResilienceConfig,
    ResiliencePolicy,
};
