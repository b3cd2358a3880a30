//! Rate limiter trait consumed by the HTTP layer.

use async_trait::async_trait;

use super::client::ClientId;
use super::limiter::{RateLimitStatus, SlidingWindowLimiter};

/// Trait for rate limiter implementations.
///
/// The HTTP middleware only sees this trait, so it does not care where "now"
/// comes from or how the registry is stored.
#[async_trait]
pub trait RateLimiterBackend: Send + Sync {
    /// Admit or reject one request from `client`, recording it if admitted.
    async fn check(&self, client: &ClientId) -> RateLimitStatus;

    /// Report the client's quota without recording a request.
    async fn peek(&self, client: &ClientId) -> RateLimitStatus;

    /// Length of the trailing window in milliseconds.
    fn window_ms(&self) -> u64;
}

#[async_trait]
impl RateLimiterBackend for SlidingWindowLimiter {
    async fn check(&self, client: &ClientId) -> RateLimitStatus {
        self.check_status(client.as_str(), self.now_ms())
    }

    async fn peek(&self, client: &ClientId) -> RateLimitStatus {
        SlidingWindowLimiter::peek(self, client.as_str(), self.now_ms())
    }

    fn window_ms(&self) -> u64 {
        SlidingWindowLimiter::window_ms(self)
    }
}
