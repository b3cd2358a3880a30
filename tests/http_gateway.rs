//! End-to-end checks against a running server on an ephemeral port.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use windowguard::config::{Environment, ServerConfig};
use windowguard::http::{ErrorBody, HttpServer, QuotaReport};
use windowguard::ratelimit::{NeverSweep, SlidingWindowLimiter};

struct TestServer {
    addr: SocketAddr,
    stop: Option<oneshot::Sender<()>>,
    handle: JoinHandle<windowguard::error::Result<()>>,
}

impl TestServer {
    async fn start(max_requests: usize, trust_forwarded_for: bool) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let config = ServerConfig {
            listen_addr: addr,
            trust_forwarded_for,
            environment: Environment::Development,
        };
        let limiter =
            Arc::new(SlidingWindowLimiter::new(60_000, max_requests).with_trigger(NeverSweep));
        let server = HttpServer::new(&config, limiter);

        let (stop, stopped) = oneshot::channel::<()>();
        let handle = tokio::spawn(server.serve_listener(listener, async move {
            let _ = stopped.await;
        }));

        Self {
            addr,
            stop: Some(stop),
            handle,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    async fn shutdown(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        self.handle.await.unwrap().unwrap();
    }
}

#[tokio::test]
async fn test_admits_up_to_quota_then_rejects() {
    let server = TestServer::start(3, false).await;
    let client = reqwest::Client::new();

    for expected_remaining in ["2", "1", "0"] {
        let response = client.get(server.url("/health")).send().await.unwrap();
        assert_eq!(response.status(), 200);
        assert_eq!(response.headers()["ratelimit-limit"], "3");
        assert_eq!(response.headers()["ratelimit-remaining"], expected_remaining);
        assert_eq!(response.headers()["ratelimit-policy"], "3;w=60");
        assert_eq!(response.headers()["ratelimit-reset"], "60");

        let body: serde_json::Value = response.json().await.unwrap();
        assert_eq!(body["status"], "healthy");
    }

    let response = client.get(server.url("/health")).send().await.unwrap();
    assert_eq!(response.status(), 429);
    assert!(response.headers().contains_key("retry-after"));
    assert_eq!(response.headers()["ratelimit-remaining"], "0");
    assert_eq!(
        response.headers()["content-security-policy"],
        "default-src 'self'; style-src 'self'; script-src 'self'"
    );

    let body: ErrorBody = response.json().await.unwrap();
    assert_eq!(body.error, "Too Many Requests");
    assert_eq!(body.message, "Please try again later");

    drop(client);
    server.shutdown().await;
}

#[tokio::test]
async fn test_security_headers_on_admitted_responses() {
    let server = TestServer::start(10, false).await;

    let response = reqwest::get(server.url("/health")).await.unwrap();
    let headers = response.headers();
    assert_eq!(headers["x-content-type-options"], "nosniff");
    assert_eq!(headers["x-frame-options"], "SAMEORIGIN");
    assert_eq!(headers["referrer-policy"], "no-referrer");
    assert_eq!(headers["cross-origin-opener-policy"], "same-origin");

    server.shutdown().await;
}

#[tokio::test]
async fn test_unknown_route_is_json_not_found() {
    let server = TestServer::start(10, false).await;

    let response = reqwest::get(server.url("/subscriptions/missing")).await.unwrap();
    assert_eq!(response.status(), 404);
    assert_eq!(response.headers()["ratelimit-remaining"], "9");

    let body: ErrorBody = response.json().await.unwrap();
    assert_eq!(body.error, "Not Found");
    assert_eq!(body.message, "Route GET /subscriptions/missing not found");

    server.shutdown().await;
}

#[tokio::test]
async fn test_quota_report_reflects_counted_request() {
    let server = TestServer::start(5, false).await;
    let client = reqwest::Client::new();

    client.get(server.url("/health")).send().await.unwrap();
    let report: QuotaReport = client
        .get(server.url("/api/rate-limit"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(report.client, "127.0.0.1");
    assert_eq!(report.limit, 5);
    assert_eq!(report.remaining, 3);
    assert_eq!(report.window_ms, 60_000);
    assert!(report.reset_after_ms > 0 && report.reset_after_ms <= 60_000);

    drop(client);
    server.shutdown().await;
}

#[tokio::test]
async fn test_trusted_forwarded_for_separates_clients() {
    let server = TestServer::start(1, true).await;
    let client = reqwest::Client::new();

    let first = client
        .get(server.url("/health"))
        .header("x-forwarded-for", "203.0.113.1")
        .send()
        .await
        .unwrap();
    assert_eq!(first.status(), 200);

    let repeat = client
        .get(server.url("/health"))
        .header("x-forwarded-for", "203.0.113.1")
        .send()
        .await
        .unwrap();
    assert_eq!(repeat.status(), 429);

    let other = client
        .get(server.url("/health"))
        .header("x-forwarded-for", "203.0.113.2, 10.0.0.1")
        .send()
        .await
        .unwrap();
    assert_eq!(other.status(), 200);

    drop(client);
    server.shutdown().await;
}

#[tokio::test]
async fn test_untrusted_forwarded_for_is_ignored() {
    let server = TestServer::start(1, false).await;
    let client = reqwest::Client::new();

    let first = client
        .get(server.url("/health"))
        .header("x-forwarded-for", "203.0.113.1")
        .send()
        .await
        .unwrap();
    assert_eq!(first.status(), 200);

    let spoofed = client
        .get(server.url("/health"))
        .header("x-forwarded-for", "203.0.113.2")
        .send()
        .await
        .unwrap();
    assert_eq!(spoofed.status(), 429);

    drop(client);
    server.shutdown().await;
}
