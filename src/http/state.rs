//! Shared state handed to middleware and handlers.

use std::sync::Arc;

use crate::config::{Environment, ServerConfig};
use crate::ratelimit::RateLimiterBackend;

/// Application state shared across routes.
pub struct AppState<R: RateLimiterBackend + ?Sized> {
    /// The limiter instance every request goes through
    pub limiter: Arc<R>,
    /// Whether `X-Forwarded-For` identifies the client
    pub trust_forwarded_for: bool,
    pub environment: Environment,
}

impl<R: RateLimiterBackend + ?Sized> AppState<R> {
    pub fn new(limiter: Arc<R>, config: &ServerConfig) -> Self {
        Self {
            limiter,
            trust_forwarded_for: config.trust_forwarded_for,
            environment: config.environment,
        }
    }
}

// Derived Clone would require `R: Clone`.
impl<R: RateLimiterBackend + ?Sized> Clone for AppState<R> {
    fn clone(&self) -> Self {
        Self {
            limiter: Arc::clone(&self.limiter),
            trust_forwarded_for: self.trust_forwarded_for,
            environment: self.environment,
        }
    }
}
