//! 外部数据来源：yt-dlp 提取器与 YouTube Data API

mod streams;
mod youtube_api;
mod ytdlp;

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use streams::{StreamOptions, select_streams};
pub use youtube_api::{TRENDING_REGIONS, YouTubeApi, normalize_region};
pub use ytdlp::YtDlp;

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{program} timed out after {timeout:?}")]
    Timeout { program: String, timeout: Duration },
    #[error("{program} exited with {status}: {stderr}")]
    Exit {
        program: String,
        status: std::process::ExitStatus,
        stderr: String,
    },
    #[error("could not decode upstream output: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("upstream request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Missing YouTube API key")]
    MissingApiKey,
}

/// 搜索结果条目
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchItem {
    pub id: Option<String>,
    pub title: Option<String>,
    pub url: String,
    pub channel: Option<String>,
    pub duration: Option<f64>,
    pub thumbnail: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendingVideo {
    pub id: Option<String>,
    pub title: Option<String>,
    pub channel_title: Option<String>,
    pub channel_id: Option<String>,
    pub thumbnail: Option<String>,
    pub duration: Option<String>,
    pub views: Option<String>,
    pub published_at: Option<String>,
    pub region: String,
}

#[async_trait]
pub trait VideoExtractor: Send + Sync {
    async fn search(&self, query: &str) -> Result<Vec<SearchItem>, FetchError>;

    /// 返回提取器的原始元数据
    async fn info(&self, url: &str) -> Result<Value, FetchError>;
}

#[async_trait]
pub trait TrendingSource: Send + Sync {
    async fn trending(&self, region: &str) -> Result<Vec<TrendingVideo>, FetchError>;
}
