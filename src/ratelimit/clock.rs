//! Millisecond time sources for the limiter.

use std::sync::atomic::{AtomicU64, Ordering};

/// A source of "now" in milliseconds.
///
/// The limiter only needs values to be non-decreasing across calls for its
/// window arithmetic to hold; absolute epoch is irrelevant.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> u64;
}

/// Wall-clock milliseconds since the Unix epoch.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        // Clamp pre-epoch clocks to zero rather than wrapping.
        chrono::Utc::now().timestamp_millis().max(0) as u64
    }
}

/// A clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    pub fn new(start_ms: u64) -> Self {
        Self {
            now: AtomicU64::new(start_ms),
        }
    }

    pub fn set(&self, now_ms: u64) {
        self.now.store(now_ms, Ordering::SeqCst);
    }

    /// Move the clock forward and return the new time.
    pub fn advance(&self, delta_ms: u64) -> u64 {
        self.now.fetch_add(delta_ms, Ordering::SeqCst) + delta_ms
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}
