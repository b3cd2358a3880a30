//! Route handlers served behind the limiter.

use axum::extract::{Extension, State};
use axum::http::{Method, Uri};
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::error::ApiError;
use super::state::AppState;
use crate::ratelimit::{ClientId, RateLimiterBackend, UNKNOWN_CLIENT};

/// Quota report for the calling client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaReport {
    pub client: String,
    pub limit: usize,
    pub remaining: usize,
    pub reset_after_ms: u64,
    pub window_ms: u64,
}

pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// Report the caller's quota without consuming any.
///
/// Behind the rate-limit middleware the request that asks has already been
/// counted, so `remaining` reflects it.
pub async fn quota<R>(
    State(state): State<AppState<R>>,
    client: Option<Extension<ClientId>>,
) -> Json<QuotaReport>
where
    R: RateLimiterBackend + ?Sized + 'static,
{
    let client = client
        .map(|Extension(id)| id)
        .unwrap_or_else(|| ClientId::new(UNKNOWN_CLIENT));
    let status = state.limiter.peek(&client).await;

    debug!(client = %client, remaining = status.remaining, "Reporting quota");

    Json(QuotaReport {
        client: client.to_string(),
        limit: status.limit,
        remaining: status.remaining,
        reset_after_ms: status.reset_after.as_millis() as u64,
        window_ms: state.limiter.window_ms(),
    })
}

pub async fn not_found(method: Method, uri: Uri) -> ApiError {
    debug!(method = %method, path = %uri.path(), "No route matched");
    ApiError::NotFound(format!("Route {} {} not found", method, uri.path()))
}
