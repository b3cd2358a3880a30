//! Request-pipeline steps: per-client admission, error mapping and security
//! headers.

use std::any::Any;
use std::net::SocketAddr;
use std::panic::AssertUnwindSafe;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::{header, HeaderMap, HeaderName, HeaderValue};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use futures::FutureExt;
use tracing::{error, warn};

use super::error::{ceil_secs, ApiError};
use super::state::AppState;
use crate::ratelimit::{ClientId, RateLimitStatus, RateLimiterBackend};

pub const RATELIMIT_POLICY: HeaderName = HeaderName::from_static("ratelimit-policy");
pub const RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("ratelimit-limit");
pub const RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("ratelimit-remaining");
pub const RATELIMIT_RESET: HeaderName = HeaderName::from_static("ratelimit-reset");

const X_FORWARDED_FOR: &str = "x-forwarded-for";

const CONTENT_SECURITY_POLICY: &str = "default-src 'self'; style-src 'self'; script-src 'self'";

/// Admit the request or answer 429.
///
/// Admitted requests carry the resolved [`ClientId`] as an extension and get
/// the `RateLimit-*` headers added to their response.
pub async fn rate_limit<R>(
    State(state): State<AppState<R>>,
    mut request: Request,
    next: Next,
) -> Response
where
    R: RateLimiterBackend + ?Sized + 'static,
{
    let client = client_id(&request, state.trust_forwarded_for);
    let status = state.limiter.check(&client).await;
    let window_ms = state.limiter.window_ms();

    if !status.decision.is_admit() {
        warn!(
            client = %client,
            method = %request.method(),
            path = %request.uri().path(),
            "Rejected request over rate limit"
        );
        let mut response = ApiError::TooManyRequests {
            retry_after: status.reset_after,
        }
        .into_response();
        apply_rate_limit_headers(response.headers_mut(), &status, window_ms);
        return response;
    }

    request.extensions_mut().insert(client);
    let mut response = next.run(request).await;
    apply_rate_limit_headers(response.headers_mut(), &status, window_ms);
    response
}

/// Turn a handler panic into the JSON error envelope and log server errors.
///
/// The panic message is classified by keyword; in production an internal
/// message is replaced with a generic one.
pub async fn handle_errors<R>(
    State(state): State<AppState<R>>,
    request: Request,
    next: Next,
) -> Response
where
    R: RateLimiterBackend + ?Sized + 'static,
{
    let method = request.method().clone();
    let path = request.uri().path().to_owned();

    match AssertUnwindSafe(next.run(request)).catch_unwind().await {
        Ok(response) => {
            if response.status().is_server_error() {
                error!(
                    method = %method,
                    path = %path,
                    status = response.status().as_u16(),
                    "Error occurred"
                );
            }
            response
        }
        Err(panic) => {
            let message = panic_message(panic.as_ref());
            error!(method = %method, path = %path, message = %message, "Error occurred");
            ApiError::classify(&message, state.environment).into_response()
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "Unknown error".to_string()
    }
}

/// Add Helmet-style hardening headers unless a handler already set them.
pub async fn security_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    let defaults = [
        (header::CONTENT_SECURITY_POLICY, CONTENT_SECURITY_POLICY),
        (header::X_CONTENT_TYPE_OPTIONS, "nosniff"),
        (header::X_FRAME_OPTIONS, "SAMEORIGIN"),
        (header::REFERRER_POLICY, "no-referrer"),
        (HeaderName::from_static("cross-origin-opener-policy"), "same-origin"),
    ];
    for (name, value) in defaults {
        if !headers.contains_key(&name) {
            headers.insert(name, HeaderValue::from_static(value));
        }
    }

    response
}

fn client_id(request: &Request, trust_forwarded_for: bool) -> ClientId {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let forwarded = request
        .headers()
        .get(X_FORWARDED_FOR)
        .and_then(|v| v.to_str().ok());

    ClientId::from_request_parts(peer, forwarded, trust_forwarded_for)
}

/// Standard `RateLimit-*` headers (IETF draft, as emitted by express-rate-limit).
pub fn apply_rate_limit_headers(headers: &mut HeaderMap, status: &RateLimitStatus, window_ms: u64) {
    let window_secs = ceil_secs(std::time::Duration::from_millis(window_ms));
    if let Ok(policy) = HeaderValue::from_str(&format!("{};w={}", status.limit, window_secs)) {
        headers.insert(RATELIMIT_POLICY, policy);
    }
    headers.insert(RATELIMIT_LIMIT, HeaderValue::from(status.limit));
    headers.insert(RATELIMIT_REMAINING, HeaderValue::from(status.remaining));
    headers.insert(RATELIMIT_RESET, HeaderValue::from(ceil_secs(status.reset_after)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ratelimit::Decision;
    use axum::body::Body;
    use std::time::Duration;

    #[test]
    fn test_rate_limit_headers() {
        let mut headers = HeaderMap::new();
        let status = RateLimitStatus {
            decision: Decision::Admit,
            limit: 100,
            remaining: 42,
            reset_after: Duration::from_millis(12_300),
        };

        apply_rate_limit_headers(&mut headers, &status, 60_000);

        assert_eq!(headers[RATELIMIT_POLICY], "100;w=60");
        assert_eq!(headers[RATELIMIT_LIMIT], "100");
        assert_eq!(headers[RATELIMIT_REMAINING], "42");
        assert_eq!(headers[RATELIMIT_RESET], "13");
    }

    #[test]
    fn test_client_id_from_connect_info() {
        let mut request = Request::new(Body::empty());
        let addr: SocketAddr = "192.0.2.7:40000".parse().unwrap();
        request.extensions_mut().insert(ConnectInfo(addr));
        request
            .headers_mut()
            .insert(X_FORWARDED_FOR, HeaderValue::from_static("198.51.100.1"));

        assert_eq!(client_id(&request, false).as_str(), "192.0.2.7");
        assert_eq!(client_id(&request, true).as_str(), "198.51.100.1");
    }

    #[test]
    fn test_panic_message_payloads() {
        let literal: Box<dyn Any + Send> = Box::new("Price must be a number");
        let owned: Box<dyn Any + Send> = Box::new(String::from("Subscription not found"));
        let other: Box<dyn Any + Send> = Box::new(7_u8);

        assert_eq!(panic_message(literal.as_ref()), "Price must be a number");
        assert_eq!(panic_message(owned.as_ref()), "Subscription not found");
        assert_eq!(panic_message(other.as_ref()), "Unknown error");
    }

    #[test]
    fn test_client_id_without_connect_info() {
        let request = Request::new(Body::empty());
        assert_eq!(client_id(&request, false).as_str(), crate::ratelimit::UNKNOWN_CLIENT);
    }
}
