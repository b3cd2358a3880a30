//! Rate limiting logic and state management.

mod backend;
mod cleanup;
mod client;
mod clock;
mod limiter;
mod window;

pub use backend::RateLimiterBackend;
pub use cleanup::{spawn_sweeper, AlwaysSweep, CleanupTrigger, NeverSweep, ProbabilisticTrigger};
pub use client::{ClientId, UNKNOWN_CLIENT};
pub use clock::{Clock, ManualClock, SystemClock};
pub use limiter::{
    Decision, RateLimitStatus, SlidingWindowLimiter, DEFAULT_CLEANUP_PROBABILITY,
    DEFAULT_MAX_REQUESTS, DEFAULT_WINDOW_MS,
};
pub use window::ClientWindow;
