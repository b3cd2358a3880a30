//! Core sliding-window rate limiter.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tracing::{debug, trace};

use super::cleanup::{CleanupTrigger, ProbabilisticTrigger};
use super::clock::{Clock, SystemClock};
use super::window::ClientWindow;
use crate::config::{CleanupStrategy, RateLimitingConfig};

/// Default trailing window length.
pub const DEFAULT_WINDOW_MS: u64 = 60_000;
/// Default number of admitted requests per client per window.
pub const DEFAULT_MAX_REQUESTS: usize = 100;
/// Default per-request probability of a full registry sweep.
pub const DEFAULT_CLEANUP_PROBABILITY: f64 = 0.01;

/// Outcome of a single admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Admit,
    Reject,
}

impl Decision {
    pub fn is_admit(&self) -> bool {
        matches!(self, Decision::Admit)
    }
}

/// A decision together with the quota figures the HTTP layer advertises.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitStatus {
    pub decision: Decision,
    /// Configured maximum per window
    pub limit: usize,
    /// Requests still admissible in the current window
    pub remaining: usize,
    /// Time until the oldest counted request leaves the window
    pub reset_after: Duration,
}

/// The per-client sliding-window rate limiter.
///
/// Each client owns a list of the timestamps of its admitted requests. A
/// request is admitted while fewer than `max_requests` of those fall inside
/// the trailing `window_ms`. Rejected requests are never recorded.
///
/// The registry is a sharded map; a check holds the write lock of the
/// client's shard for the whole read-filter-write sequence, so concurrent
/// checks for one client are serialized while other clients proceed.
pub struct SlidingWindowLimiter {
    /// Admitted-request timestamps indexed by client identifier
    windows: DashMap<String, ClientWindow>,
    window_ms: u64,
    max_requests: usize,
    trigger: Box<dyn CleanupTrigger>,
    clock: Arc<dyn Clock>,
}

impl SlidingWindowLimiter {
    /// Create a limiter with the system clock and probabilistic cleanup.
    pub fn new(window_ms: u64, max_requests: usize) -> Self {
        Self {
            windows: DashMap::new(),
            window_ms,
            max_requests,
            trigger: Box::new(ProbabilisticTrigger::new(DEFAULT_CLEANUP_PROBABILITY)),
            clock: Arc::new(SystemClock),
        }
    }

    /// Build a limiter from configuration.
    ///
    /// With the periodic strategy no sweep runs on the request path; the
    /// caller is expected to start [`spawn_sweeper`](super::spawn_sweeper).
    pub fn from_config(config: &RateLimitingConfig) -> Self {
        let limiter = Self::new(config.window_ms, config.max_requests);
        match config.cleanup {
            CleanupStrategy::Probabilistic => {
                limiter.with_trigger(ProbabilisticTrigger::new(config.cleanup_probability))
            }
            CleanupStrategy::Periodic => limiter.with_trigger(super::cleanup::NeverSweep),
        }
    }

    /// Replace the cleanup trigger.
    pub fn with_trigger(mut self, trigger: impl CleanupTrigger + 'static) -> Self {
        self.trigger = Box::new(trigger);
        self
    }

    /// Replace the clock used by [`now_ms`](Self::now_ms).
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Current time according to the limiter's clock.
    pub fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    pub fn window_ms(&self) -> u64 {
        self.window_ms
    }

    pub fn max_requests(&self) -> usize {
        self.max_requests
    }

    /// Admit or reject a request from `client_id` at `now_ms`.
    pub fn check(&self, client_id: &str, now_ms: u64) -> Decision {
        self.check_status(client_id, now_ms).decision
    }

    /// Admit or reject a request and report the remaining quota.
    pub fn check_status(&self, client_id: &str, now_ms: u64) -> RateLimitStatus {
        // The shard guard must be released before a sweep touches the map.
        let status = {
            let mut window = self.windows.entry(client_id.to_owned()).or_default();

            window.prune(now_ms, self.window_ms);

            let decision = if window.len() >= self.max_requests {
                Decision::Reject
            } else {
                window.record(now_ms);
                Decision::Admit
            };

            trace!(
                client = %client_id,
                count = window.len(),
                limit = self.max_requests,
                decision = ?decision,
                "Checked rate limit"
            );

            RateLimitStatus {
                decision,
                limit: self.max_requests,
                remaining: self.max_requests.saturating_sub(window.len()),
                reset_after: window.reset_after(now_ms, self.window_ms),
            }
        };

        if status.decision == Decision::Reject {
            debug!(client = %client_id, limit = self.max_requests, "Rate limit exceeded");
        }

        if self.trigger.should_sweep() {
            self.sweep(now_ms);
        }

        status
    }

    /// Report what [`check`](Self::check) would decide at `now_ms` without
    /// recording a request or creating a registry entry.
    pub fn peek(&self, client_id: &str, now_ms: u64) -> RateLimitStatus {
        let (count, reset_after) = match self.windows.get(client_id) {
            Some(window) => (
                window.live_count(now_ms, self.window_ms),
                window.reset_after(now_ms, self.window_ms),
            ),
            None => (0, Duration::ZERO),
        };

        let decision = if count >= self.max_requests {
            Decision::Reject
        } else {
            Decision::Admit
        };

        RateLimitStatus {
            decision,
            limit: self.max_requests,
            remaining: self.max_requests.saturating_sub(count),
            reset_after,
        }
    }

    /// Prune every client window at `now_ms` and drop the ones left empty.
    ///
    /// Returns the number of clients removed.
    pub fn sweep(&self, now_ms: u64) -> usize {
        let mut removed = 0;
        self.windows.retain(|_, window| {
            window.prune(now_ms, self.window_ms);
            if window.is_empty() {
                removed += 1;
                false
            } else {
                true
            }
        });

        debug!(
            removed = removed,
            remaining = self.windows.len(),
            "Swept rate limit registry"
        );
        removed
    }

    /// Number of clients currently tracked.
    pub fn client_count(&self) -> usize {
        self.windows.len()
    }

    /// Number of stored timestamps for a client, stale ones included.
    ///
    /// Returns `None` if the client has no registry entry.
    pub fn window_len(&self, client_id: &str) -> Option<usize> {
        self.windows.get(client_id).map(|w| w.len())
    }

    /// Forget every client.
    pub fn clear(&self) {
        self.windows.clear();
    }
}

impl Default for SlidingWindowLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_MS, DEFAULT_MAX_REQUESTS)
    }
}

impl std::fmt::Debug for SlidingWindowLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlidingWindowLimiter")
            .field("window_ms", &self.window_ms)
            .field("max_requests", &self.max_requests)
            .field("clients", &self.windows.len())
            .finish()
    }
}
