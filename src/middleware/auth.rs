use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::{AppState, error::AppError};

pub const API_KEY_HEADER: &str = "x-api-key";

pub async fn auth_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if !state.config.require_api_key || super::is_exempt(request.uri().path()) {
        return next.run(request).await;
    }

    let api_key = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|header| header.to_str().ok());

    match api_key {
        Some(key) if is_valid_key(key, &state.config.api_key) => next.run(request).await,
        _ => AppError::Unauthorized.into_response(),
    }
}

// 逐字节比较，耗时与首个不同字节的位置无关
fn is_valid_key(provided: &str, expected: &str) -> bool {
    let (provided, expected) = (provided.as_bytes(), expected.as_bytes());
    if provided.len() != expected.len() {
        return false;
    }
    provided
        .iter()
        .zip(expected)
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}

#[cfg(test)]
mod tests {
    use super::is_valid_key;

    #[test]
    fn key_comparison() {
        assert!(is_valid_key("s3cret", "s3cret"));
        assert!(!is_valid_key("s3cret", "s3cre"));
        assert!(!is_valid_key("s3creT", "s3cret"));
        assert!(is_valid_key("", ""));
    }
}
