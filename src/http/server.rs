//! HTTP server implementation.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::middleware;
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use super::middleware::{handle_errors, rate_limit, security_headers};
use super::routes;
use super::state::AppState;
use crate::config::ServerConfig;
use crate::error::{Result, WindowGuardError};
use crate::ratelimit::RateLimiterBackend;

/// HTTP front end that puts every request through the rate limiter.
pub struct HttpServer<R: RateLimiterBackend + ?Sized + 'static> {
    /// Address to bind to
    addr: SocketAddr,
    state: AppState<R>,
}

impl<R: RateLimiterBackend + ?Sized + 'static> HttpServer<R> {
    /// Create a new server around a limiter instance.
    pub fn new(config: &ServerConfig, rate_limiter: Arc<R>) -> Self {
        Self {
            addr: config.listen_addr,
            state: AppState::new(rate_limiter, config),
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Build the router with the full middleware stack.
    ///
    /// Layer order, outermost first: tracing, security headers, rate limit,
    /// error mapping. Rejections therefore still carry the security headers.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/health", get(routes::health))
            .route("/api/rate-limit", get(routes::quota::<R>))
            .fallback(routes::not_found)
            .layer(middleware::from_fn_with_state(
                self.state.clone(),
                handle_errors::<R>,
            ))
            .layer(middleware::from_fn_with_state(
                self.state.clone(),
                rate_limit::<R>,
            ))
            .layer(middleware::from_fn(security_headers))
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Bind the configured address and serve until the process exits.
    pub async fn serve(self) -> Result<()> {
        self.serve_with_shutdown(std::future::pending()).await
    }

    /// Bind the configured address and serve until `signal` resolves.
    pub async fn serve_with_shutdown<F>(self, signal: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(self.addr).await?;
        self.serve_listener(listener, signal).await
    }

    /// Serve on an already-bound listener until `signal` resolves.
    pub async fn serve_listener<F>(self, listener: TcpListener, signal: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let local_addr = listener.local_addr()?;
        let app = self.router();

        info!(addr = %local_addr, "Server is running on http://{}", local_addr);

        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(signal)
        .await
        .map_err(|e| {
            error!(error = %e, "HTTP server failed");
            WindowGuardError::Server(e.to_string())
        })
    }
}
