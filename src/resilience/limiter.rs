//! Sliding-window rate limiter shared by all workers of a job.

use crate::resilience::clock::Clock;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Rate limit budget: at most `max_requests` acquisitions per `window`.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: crate::defaults::RATE_LIMIT_REQUESTS,
            window: Duration::from_secs(crate::defaults::RATE_LIMIT_WINDOW_SECS),
        }
    }
}

/// Blocking sliding-window rate limiter.
///
/// `acquire` blocks the calling thread until a slot is available under the
/// configured budget. The limiter is shared across all chunks of a job so
/// total throughput respects the provider's limit no matter how many workers
/// run concurrently.
pub struct RateLimiter {
    config: RateLimitConfig,
    clock: Arc<dyn Clock>,
    recent: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            recent: Mutex::new(VecDeque::new()),
        }
    }

    /// Blocks until a request slot is available, then consumes it.
    pub fn acquire(&self) {
        loop {
            let wait = {
                let mut recent = self.recent.lock().unwrap_or_else(|e| e.into_inner());
                let now = self.clock.now();
                while let Some(oldest) = recent.front() {
                    if now.duration_since(*oldest) >= self.config.window {
                        recent.pop_front();
                    } else {
                        break;
                    }
                }
                if (recent.len() as u32) < self.config.max_requests {
                    recent.push_back(now);
                    return;
                }
                // Oldest entry is within the window here, or the branch above
                // would have consumed a slot.
                match recent.front() {
                    Some(oldest) => self.config.window - now.duration_since(*oldest),
                    None => return,
                }
            };
            self.clock.sleep(wait);
        }
    }
}
