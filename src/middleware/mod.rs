mod auth;
mod error_handler;
mod rate_limit;

pub use auth::{API_KEY_HEADER, auth_middleware};
pub use error_handler::log_errors;
pub use rate_limit::{RateLimitConfig, RateLimitState, RateLimiter, client_identity, rate_limit};

/// 不经过限流与鉴权的路径
pub const EXEMPT_PATHS: [&str; 5] = ["/", "/health", "/ready", "/docs", "/openapi.json"];

pub fn is_exempt(path: &str) -> bool {
    EXEMPT_PATHS.contains(&path)
}
