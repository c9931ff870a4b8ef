use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;

use cache::{RemoteError, ResponseCache};
use config::Config;
use middleware::RateLimiter;
use services::{TrendingSource, VideoExtractor};

pub mod cache;
pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod services;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub limiter: Arc<RateLimiter>,
    pub cache: Arc<ResponseCache>,
    pub extractor: Arc<dyn VideoExtractor>,
    pub trending: Arc<dyn TrendingSource>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(
        config: Config,
        extractor: Arc<dyn VideoExtractor>,
        trending: Arc<dyn TrendingSource>,
    ) -> Result<Self, RemoteError> {
        let cache = ResponseCache::from_config(&config)?;
        Ok(Self::with_cache(config, cache, extractor, trending))
    }

    pub fn with_cache(
        config: Config,
        cache: ResponseCache,
        extractor: Arc<dyn VideoExtractor>,
        trending: Arc<dyn TrendingSource>,
    ) -> Self {
        Self {
            limiter: Arc::new(RateLimiter::new(config.rate_limit())),
            cache: Arc::new(cache),
            config: Arc::new(config),
            extractor,
            trending,
            started_at: Instant::now(),
        }
    }
}

/// 定期清理限流桶与本地缓存的过期条目
pub fn spawn_sweeper(
    limiter: Arc<RateLimiter>,
    cache: Arc<ResponseCache>,
    every: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // 第一次 tick 立即返回
        interval.tick().await;

        loop {
            interval.tick().await;
            let buckets = limiter.sweep();
            let entries = cache.sweep();
            if buckets > 0 || entries > 0 {
                tracing::debug!(buckets, entries, "evicted idle rate-limit buckets and expired cache entries");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::RateLimitConfig;
    use serde_json::json;

    #[tokio::test(start_paused = true)]
    async fn sweeper_evicts_on_interval() {
        let limiter = Arc::new(RateLimiter::new(RateLimitConfig {
            capacity: 1,
            refill_rate: 1.0,
            burst: 0,
        }));
        let cache = Arc::new(ResponseCache::local_only(16));

        assert!(limiter.admit("a", "/search"));
        cache.set("k", &json!(1), Duration::from_secs(5)).await;

        let handle = spawn_sweeper(limiter.clone(), cache.clone(), Duration::from_secs(10));
        tokio::time::sleep(Duration::from_secs(11)).await;

        assert_eq!(limiter.bucket_count(), 0);
        assert!(cache.local().is_empty());
        handle.abort();
    }
}
