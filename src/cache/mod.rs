//! 响应缓存：优先使用远程存储，失败或未配置时退回进程内缓存

pub mod keys;
mod local;
mod remote;

use std::time::Duration;

use serde::Serialize;
use serde_json::Value;

use crate::config::Config;

pub use local::LocalStore;
pub use remote::{RedisStore, RemoteError, RemoteStore, RestStore};

#[derive(Debug)]
pub struct ResponseCache {
    remote: Option<RemoteStore>,
    local: LocalStore,
    remote_timeout: Duration,
}

impl ResponseCache {
    pub fn local_only(max_entries: usize) -> Self {
        Self {
            remote: None,
            local: LocalStore::new(max_entries),
            remote_timeout: Duration::from_secs(2),
        }
    }

    pub fn with_remote(remote: RemoteStore, max_entries: usize, remote_timeout: Duration) -> Self {
        Self {
            remote: Some(remote),
            local: LocalStore::new(max_entries),
            remote_timeout,
        }
    }

    /// REST 地址与令牌同时设置时用 REST，否则看 REDIS_URL，都没有则只用本地
    pub fn from_config(config: &Config) -> Result<Self, RemoteError> {
        let timeout = config.cache_remote_timeout();
        let max_entries = config.cache_local_max_entries;

        if !config.upstash_rest_url.is_empty() && !config.upstash_rest_token.is_empty() {
            let store = RestStore::new(&config.upstash_rest_url, &config.upstash_rest_token, timeout)?;
            tracing::info!("Response cache using REST remote store");
            return Ok(Self::with_remote(RemoteStore::Rest(store), max_entries, timeout));
        }

        if !config.redis_url.is_empty() {
            let store = RedisStore::new(&config.redis_url)?;
            tracing::info!("Response cache using Redis remote store");
            return Ok(Self::with_remote(RemoteStore::Redis(store), max_entries, timeout));
        }

        tracing::info!("Response cache using in-process store only");
        Ok(Self::local_only(max_entries))
    }

    pub fn has_remote(&self) -> bool {
        self.remote.is_some()
    }

    pub async fn get(&self, key: &str) -> Option<Value> {
        if let Some(remote) = &self.remote {
            match remote.get(key, self.remote_timeout).await {
                Ok(Some(value)) => return Some(value),
                Ok(None) => {}
                Err(err) => {
                    tracing::warn!(key, error = %err, "remote cache get failed, using local store");
                }
            }
        }

        self.local.get(key)
    }

    pub async fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T, ttl: Duration) {
        let value = match serde_json::to_value(value) {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!(key, error = %err, "value is not serializable, skipping cache");
                return;
            }
        };

        if let Some(remote) = &self.remote {
            match remote.set(key, &value, ttl, self.remote_timeout).await {
                Ok(()) => return,
                Err(err) => {
                    tracing::warn!(key, error = %err, "remote cache set failed, writing local store");
                }
            }
        }

        self.local.set(key, value, ttl);
    }

    /// 清理本地过期条目，远程存储自行过期
    pub fn sweep(&self) -> usize {
        self.local.sweep()
    }

    pub fn local(&self) -> &LocalStore {
        &self.local
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn unreachable_remote() -> ResponseCache {
        // 端口 9 (discard) 本地通常无人监听，连接立即被拒绝
        let store = RestStore::new("http://127.0.0.1:9", "token", Duration::from_millis(500)).unwrap();
        ResponseCache::with_remote(RemoteStore::Rest(store), 64, Duration::from_millis(500))
    }

    #[tokio::test]
    async fn local_round_trip_and_overwrite() {
        let cache = ResponseCache::local_only(64);
        assert!(!cache.has_remote());

        cache.set("k", &json!({"a": 1}), Duration::from_secs(5)).await;
        assert_eq!(cache.get("k").await, Some(json!({"a": 1})));

        cache.set("k", &json!({"a": 2}), Duration::from_secs(5)).await;
        assert_eq!(cache.get("k").await, Some(json!({"a": 2})));
    }

    #[tokio::test(start_paused = true)]
    async fn local_entries_expire() {
        let cache = ResponseCache::local_only(64);
        cache.set("k", &json!("v"), Duration::from_secs(1)).await;

        tokio::time::advance(Duration::from_millis(1500)).await;
        assert_eq!(cache.get("k").await, None);
    }

    #[tokio::test]
    async fn unreachable_remote_falls_back_to_local() {
        let cache = unreachable_remote();
        assert!(cache.has_remote());

        assert_eq!(cache.get("k").await, None);
        cache.set("k", &vec!["a", "b"], Duration::from_secs(5)).await;
        assert_eq!(cache.get("k").await, Some(json!(["a", "b"])));
        assert_eq!(cache.local().len(), 1);
    }

    #[tokio::test]
    async fn serializes_typed_values() {
        #[derive(Serialize)]
        struct Item {
            id: &'static str,
            duration: Option<f64>,
        }

        let cache = ResponseCache::local_only(64);
        let items = vec![Item { id: "abc", duration: None }];
        cache.set("search:x", &items, Duration::from_secs(5)).await;
        assert_eq!(
            cache.get("search:x").await,
            Some(json!([{"id": "abc", "duration": null}]))
        );
    }

    #[test]
    fn from_config_picks_backend() {
        let mut config = Config::default();
        assert!(!ResponseCache::from_config(&config).unwrap().has_remote());

        // 只有地址没有令牌，仍然只用本地
        config.upstash_rest_url = "https://cache.example.com".into();
        assert!(!ResponseCache::from_config(&config).unwrap().has_remote());

        config.upstash_rest_token = "secret".into();
        assert!(ResponseCache::from_config(&config).unwrap().has_remote());

        let mut config = Config::default();
        config.redis_url = "redis://127.0.0.1:6379".into();
        assert!(ResponseCache::from_config(&config).unwrap().has_remote());
    }
}
