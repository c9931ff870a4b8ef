use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;
use tokio::time::Instant;

use crate::error::AppError;

/// 令牌桶参数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateLimitConfig {
    pub capacity: u32,
    /// 每秒补充的令牌数
    pub refill_rate: f64,
    pub burst: u32,
}

impl RateLimitConfig {
    /// 桶内令牌上限
    pub fn ceiling(&self) -> f64 {
        f64::from(self.capacity) + f64::from(self.burst)
    }

    /// 从空桶补满所需的时间
    pub fn time_to_fill(&self) -> Duration {
        Duration::try_from_secs_f64(self.ceiling() / self.refill_rate).unwrap_or(Duration::MAX)
    }
}

#[derive(Debug, Clone, Copy)]
struct Bucket {
    tokens: f64,
    // None 表示从未补充过，首次补充直接补满
    last_refill: Option<Instant>,
}

impl Bucket {
    const fn new() -> Self {
        Self {
            tokens: 0.0,
            last_refill: None,
        }
    }

    fn refill(&mut self, now: Instant, config: &RateLimitConfig) {
        let ceiling = config.ceiling();
        self.tokens = match self.last_refill {
            Some(last) => {
                let elapsed = now.saturating_duration_since(last).as_secs_f64();
                (self.tokens + elapsed * config.refill_rate).min(ceiling)
            }
            None => ceiling,
        };
        self.last_refill = Some(now);
    }

    fn try_consume(&mut self) -> bool {
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// 按 (客户端, 资源) 维度的令牌桶限流器
#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimitConfig,
    buckets: DashMap<String, Bucket>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            buckets: DashMap::new(),
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    pub fn admit(&self, identity: &str, resource: &str) -> bool {
        let key = bucket_key(identity, resource);
        let now = Instant::now();

        // entry 持有分片写锁，补充与扣减在同一临界区内完成
        let mut bucket = self.buckets.entry(key).or_insert_with(Bucket::new);
        bucket.refill(now, &self.config);
        bucket.try_consume()
    }

    /// 清理空闲到足以补满的桶，被清理的桶与新建的桶行为一致
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let idle_limit = self.config.time_to_fill();
        let before = self.buckets.len();

        self.buckets.retain(|_, bucket| match bucket.last_refill {
            Some(last) => now.saturating_duration_since(last) < idle_limit,
            None => false,
        });

        before.saturating_sub(self.buckets.len())
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    pub async fn check_rate_limit(
        self: Arc<Self>,
        trust_forwarded_for: bool,
        req: Request<Body>,
        next: Next,
    ) -> Response {
        if super::is_exempt(req.uri().path()) {
            return next.run(req).await;
        }

        let ip = client_identity(&req, trust_forwarded_for);
        let path = req.uri().path().to_owned();

        if !self.admit(&ip, &path) {
            tracing::debug!(ip = %ip, path = %path, "rate limit exceeded");
            return AppError::TooManyRequests.into_response();
        }

        next.run(req).await
    }
}

fn bucket_key(identity: &str, resource: &str) -> String {
    format!("{}:{}", identity, resource)
}

/// 取客户端标识：可选信任代理头，否则使用连接地址
pub fn client_identity(req: &Request<Body>, trust_forwarded_for: bool) -> String {
    let remote_ip = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0.ip().to_string());

    let forwarded = if trust_forwarded_for {
        req.headers()
            .get("x-real-ip")
            .and_then(|h| h.to_str().ok())
            .filter(|s| !s.trim().is_empty())
            .or_else(|| {
                req.headers()
                    .get("x-forwarded-for")
                    .and_then(|h| h.to_str().ok())
                    .and_then(|s| s.split(',').find(|ip| !ip.trim().is_empty()))
            })
    } else {
        None
    };

    forwarded
        .or(remote_ip.as_deref())
        .unwrap_or("unknown")
        .trim()
        .to_string()
}

#[derive(Clone)]
pub struct RateLimitState {
    pub limiter: Arc<RateLimiter>,
    pub trust_forwarded_for: bool,
}

pub async fn rate_limit(
    State(state): State<RateLimitState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    state
        .limiter
        .check_rate_limit(state.trust_forwarded_for, req, next)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(capacity: u32, refill_rate: f64, burst: u32) -> RateLimiter {
        RateLimiter::new(RateLimitConfig {
            capacity,
            refill_rate,
            burst,
        })
    }

    fn drain(limiter: &RateLimiter, identity: &str, resource: &str) -> usize {
        let mut admitted = 0;
        while limiter.admit(identity, resource) {
            admitted += 1;
            assert!(admitted <= 10_000, "bucket never ran dry");
        }
        admitted
    }

    #[tokio::test(start_paused = true)]
    async fn exhausts_then_refills_after_half_second() {
        let limiter = limiter(40, 2.0, 15);

        for i in 0..55 {
            assert!(limiter.admit("1.2.3.4", "/search"), "admit #{i} rejected");
        }
        assert!(!limiter.admit("1.2.3.4", "/search"));

        tokio::time::advance(Duration::from_millis(500)).await;
        assert!(limiter.admit("1.2.3.4", "/search"));
        assert!(!limiter.admit("1.2.3.4", "/search"));
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_call_still_advances_timestamp() {
        let limiter = limiter(1, 2.0, 0);
        assert!(limiter.admit("a", "/x"));

        // 0.25s 只积累半个令牌，失败后时间戳前移但令牌保留
        tokio::time::advance(Duration::from_millis(250)).await;
        assert!(!limiter.admit("a", "/x"));
        tokio::time::advance(Duration::from_millis(250)).await;
        assert!(limiter.admit("a", "/x"));
    }

    #[tokio::test(start_paused = true)]
    async fn long_idle_never_exceeds_ceiling() {
        let limiter = limiter(40, 2.0, 15);
        drain(&limiter, "1.2.3.4", "/search");

        tokio::time::advance(Duration::from_secs(3600)).await;
        assert_eq!(drain(&limiter, "1.2.3.4", "/search"), 55);
    }

    #[tokio::test(start_paused = true)]
    async fn buckets_are_independent() {
        let limiter = limiter(2, 1.0, 0);
        assert_eq!(drain(&limiter, "1.2.3.4", "/search"), 2);

        assert!(limiter.admit("1.2.3.4", "/info"));
        assert!(limiter.admit("5.6.7.8", "/search"));
        assert!(!limiter.admit("1.2.3.4", "/search"));
    }

    #[test]
    fn concurrent_callers_never_over_admit() {
        // 极低补充速率，测试期间不会积累新令牌
        let limiter = Arc::new(limiter(10, 0.0001, 5));
        let admitted = std::sync::atomic::AtomicUsize::new(0);

        std::thread::scope(|scope| {
            for _ in 0..16 {
                scope.spawn(|| {
                    for _ in 0..20 {
                        if limiter.admit("9.9.9.9", "/streams") {
                            admitted.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                        }
                    }
                });
            }
        });

        assert_eq!(admitted.into_inner(), 15);
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_only_drops_saturated_buckets() {
        let limiter = limiter(4, 2.0, 0);
        drain(&limiter, "old", "/search");

        tokio::time::advance(Duration::from_secs(1)).await;
        drain(&limiter, "recent", "/search");
        assert_eq!(limiter.sweep(), 0);

        // "old" 已空闲 2s，足以补满 4 个令牌
        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(limiter.sweep(), 1);
        assert_eq!(limiter.bucket_count(), 1);

        assert_eq!(drain(&limiter, "old", "/search"), 4);
    }

    #[test]
    fn identity_prefers_forwarded_headers_only_when_trusted() {
        let req = Request::builder()
            .uri("/search")
            .header("x-forwarded-for", " , 10.0.0.7, 10.0.0.8")
            .extension(ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 5000))))
            .body(Body::empty())
            .unwrap();

        assert_eq!(client_identity(&req, true), "10.0.0.7");
        assert_eq!(client_identity(&req, false), "127.0.0.1");
    }

    #[test]
    fn identity_falls_back_to_unknown() {
        let req = Request::builder().uri("/").body(Body::empty()).unwrap();
        assert_eq!(client_identity(&req, true), "unknown");
    }
}
