//! Sliding-window rate limiter
//!
//! Admission control at the orchestrator's entry point: each (caller, domain)
//! pair may make at most `per_minute` requests within any trailing 60-second
//! window. Buckets are pruned on every check, so memory is bounded by the
//! number of active pairs rather than by request volume. No background cleanup
//! task is needed.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

const WINDOW: Duration = Duration::from_secs(60);

/// Per-(caller, domain) sliding-window rate limiter
pub struct RateLimiter {
    per_minute: usize,
    buckets: Mutex<HashMap<(String, String), Vec<Instant>>>,
}

impl RateLimiter {
    /// Create a limiter allowing `per_minute` requests per pair per minute
    pub fn new(per_minute: usize) -> Self {
        Self {
            per_minute,
            buckets: Mutex::new(HashMap::new()),
        }
    }

    /// Admit or reject one request for `(caller, domain)`.
    ///
    /// On admission the current timestamp is recorded against the pair.
    pub fn check(&self, caller: &str, domain: &str) -> crate::Result<()> {
        self.check_at(caller, domain, Instant::now())
    }

    fn check_at(&self, caller: &str, domain: &str, now: Instant) -> crate::Result<()> {
        let mut buckets = self
            .buckets
            .lock()
            .map_err(|_| crate::Error::internal("rate limiter bucket map poisoned"))?;
        let bucket = buckets
            .entry((caller.to_string(), domain.to_string()))
            .or_default();

        // Prune before the length check so stale entries never count
        bucket.retain(|stamp| now.duration_since(*stamp) < WINDOW);

        if bucket.len() >= self.per_minute {
            tracing::warn!(caller, domain, "Rate limit exceeded");
            return Err(crate::Error::rate_limited(caller));
        }
        bucket.push(now);
        Ok(())
    }
}
