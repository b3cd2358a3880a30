//! HTTP admission layer: middleware, routes and server.

mod error;
mod middleware;
mod routes;
mod server;
mod state;

pub use error::{ApiError, ErrorBody};
pub use middleware::{
    apply_rate_limit_headers, handle_errors, rate_limit, security_headers, RATELIMIT_LIMIT,
    RATELIMIT_POLICY, RATELIMIT_REMAINING, RATELIMIT_RESET,
};
pub use routes::QuotaReport;
pub use server::HttpServer;
pub use state::AppState;
