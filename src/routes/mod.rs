mod meta;
mod query;
mod video;

use axum::{
    Router,
    middleware::{from_fn, from_fn_with_state},
    routing::get,
};
use tower::ServiceBuilder;
use tower_http::{
    compression::{CompressionLayer, DefaultPredicate, Predicate, predicate::SizeAbove},
    cors::{Any, CorsLayer},
};

use crate::{
    AppState,
    middleware::{RateLimitState, auth_middleware, log_errors, rate_limit},
};

pub use video::read_through;

// 小于该字节数的响应不压缩
const COMPRESSION_MIN_SIZE: u16 = 512;

pub fn create_router(state: AppState) -> Router {
    let rate_limit_state = RateLimitState {
        limiter: state.limiter.clone(),
        trust_forwarded_for: state.config.trust_forwarded_for,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);
    let compression = CompressionLayer::new()
        .compress_when(DefaultPredicate::new().and(SizeAbove::new(COMPRESSION_MIN_SIZE)));

    // 外层先执行：CORS -> 压缩 -> 错误日志 -> 限流 -> 鉴权
    let layers = ServiceBuilder::new()
        .layer(cors)
        .layer(compression)
        .layer(from_fn(log_errors))
        .layer(from_fn_with_state(rate_limit_state, rate_limit))
        .layer(from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .route("/", get(meta::root))
        .route("/health", get(meta::health))
        .route("/ready", get(meta::ready))
        .route("/search", get(video::search))
        .route("/info", get(video::info))
        .route("/streams", get(video::streams))
        .route("/trending", get(video::trending))
        .layer(layers)
        .with_state(state)
}
