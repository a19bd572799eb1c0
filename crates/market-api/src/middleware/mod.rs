//! API 서버용 HTTP middleware.

mod cors;
mod metrics;
mod rate_limit;

pub use cors::cors_layer;
pub use metrics::metrics_layer;
pub use rate_limit::{
    client_identity, rate_limit_middleware, RateLimitDecision, RateLimiter, ANONYMOUS,
    HEADER_LIMIT, HEADER_REMAINING, HEADER_RESET,
};
