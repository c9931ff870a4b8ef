use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use redis::{AsyncCommands, aio::ConnectionManager};
use reqwest::Url;
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::OnceCell;

#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("remote store request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("redis command failed: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("remote store payload is not valid JSON: {0}")]
    Payload(#[from] serde_json::Error),
    #[error("remote store rejected the command: {0}")]
    Rejected(String),
    #[error("remote store timed out after {0:?}")]
    Timeout(Duration),
    #[error("invalid remote store endpoint: {0}")]
    InvalidEndpoint(String),
}

/// 共享的远程缓存层：Upstash REST 或原生 Redis
#[derive(Debug, Clone)]
pub enum RemoteStore {
    Rest(RestStore),
    Redis(RedisStore),
}

impl RemoteStore {
    pub async fn get(&self, key: &str, timeout: Duration) -> Result<Option<Value>, RemoteError> {
        let raw = match self {
            RemoteStore::Rest(store) => bounded(timeout, store.get(key)).await?,
            RemoteStore::Redis(store) => bounded(timeout, store.get(key)).await?,
        };

        match raw {
            Some(text) => Ok(Some(serde_json::from_str(&text)?)),
            None => Ok(None),
        }
    }

    pub async fn set(
        &self,
        key: &str,
        value: &Value,
        ttl: Duration,
        timeout: Duration,
    ) -> Result<(), RemoteError> {
        let payload = serde_json::to_string(value)?;
        let ttl_secs = ttl_seconds(ttl);

        match self {
            RemoteStore::Rest(store) => bounded(timeout, store.set(key, payload, ttl_secs)).await,
            RemoteStore::Redis(store) => bounded(timeout, store.set(key, payload, ttl_secs)).await,
        }
    }
}

async fn bounded<T, F>(timeout: Duration, fut: F) -> Result<T, RemoteError>
where
    F: Future<Output = Result<T, RemoteError>>,
{
    tokio::time::timeout(timeout, fut)
        .await
        .map_err(|_| RemoteError::Timeout(timeout))?
}

// 过期时间至少 1 秒，不足 1 秒向上取整
fn ttl_seconds(ttl: Duration) -> u64 {
    let secs = ttl.as_secs() + u64::from(ttl.subsec_nanos() > 0);
    secs.max(1)
}

#[derive(Debug, Deserialize)]
struct RestReply {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<String>,
}

/// Upstash 风格的 REST 接口：`/get/<key>`、`/set/<key>?EX=<ttl>`
#[derive(Debug, Clone)]
pub struct RestStore {
    client: reqwest::Client,
    base: Url,
    token: String,
}

impl RestStore {
    pub fn new(endpoint: &str, token: &str, timeout: Duration) -> Result<Self, RemoteError> {
        let base = Url::parse(endpoint.trim_end_matches('/'))
            .map_err(|e| RemoteError::InvalidEndpoint(format!("{endpoint}: {e}")))?;
        if base.cannot_be_a_base() {
            return Err(RemoteError::InvalidEndpoint(endpoint.to_string()));
        }
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            base,
            token: token.to_string(),
        })
    }

    fn command_url(&self, command: &str, key: &str) -> Result<Url, RemoteError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| RemoteError::InvalidEndpoint(self.base.to_string()))?
            .pop_if_empty()
            .push(command)
            .push(key);
        Ok(url)
    }

    async fn get(&self, key: &str) -> Result<Option<String>, RemoteError> {
        let reply: RestReply = self
            .client
            .get(self.command_url("get", key)?)
            .bearer_auth(&self.token)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if let Some(error) = reply.error {
            return Err(RemoteError::Rejected(error));
        }
        match reply.result {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(text)) => Ok(Some(text)),
            Some(other) => Err(RemoteError::Rejected(format!(
                "unexpected GET result: {other}"
            ))),
        }
    }

    // 值放在请求体里，过期时间随 SET 一次写入
    async fn set(&self, key: &str, payload: String, ttl_secs: u64) -> Result<(), RemoteError> {
        let reply: RestReply = self
            .client
            .post(self.command_url("set", key)?)
            .query(&[("EX", ttl_secs)])
            .bearer_auth(&self.token)
            .body(payload)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        match reply.error {
            Some(error) => Err(RemoteError::Rejected(error)),
            None => Ok(()),
        }
    }
}

/// 原生 Redis；连接在首次使用时建立，之后复用并由 ConnectionManager 负责重连
#[derive(Clone)]
pub struct RedisStore {
    client: redis::Client,
    conn: Arc<OnceCell<ConnectionManager>>,
}

impl fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisStore")
            .field("client", &self.client)
            .field("connected", &self.conn.initialized())
            .finish()
    }
}

impl RedisStore {
    pub fn new(redis_url: &str) -> Result<Self, RemoteError> {
        Ok(Self {
            client: redis::Client::open(redis_url)?,
            conn: Arc::new(OnceCell::new()),
        })
    }

    // 建连失败不会写入 OnceCell，下次调用重试
    async fn connection(&self) -> Result<ConnectionManager, RemoteError> {
        let conn = self
            .conn
            .get_or_try_init(|| ConnectionManager::new(self.client.clone()))
            .await?;
        Ok(conn.clone())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, RemoteError> {
        let mut conn = self.connection().await?;
        let result: Option<String> = conn.get(key).await?;
        Ok(result)
    }

    async fn set(&self, key: &str, payload: String, ttl_secs: u64) -> Result<(), RemoteError> {
        let mut conn = self.connection().await?;
        let _: () = conn.set_ex(key, payload, ttl_secs).await?;
        Ok(())
    }
}
