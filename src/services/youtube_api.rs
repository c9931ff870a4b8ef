use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use super::{FetchError, TrendingSource, TrendingVideo};

const BASE_URL: &str = "https://www.googleapis.com/youtube/v3";
const MAX_RESULTS: u32 = 20;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// 支持的热门地区，第一个为默认值
pub const TRENDING_REGIONS: [&str; 2] = ["BD", "IN"];

/// 转大写，不支持的地区回落到默认地区
pub fn normalize_region(region: &str) -> String {
    let region = region.to_uppercase();
    if TRENDING_REGIONS.contains(&region.as_str()) {
        region
    } else {
        TRENDING_REGIONS[0].to_string()
    }
}

#[derive(Debug, Clone)]
pub struct YouTubeApi {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

#[derive(Debug, Default, Deserialize)]
struct VideoListResponse {
    #[serde(default)]
    items: Vec<VideoResource>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoResource {
    id: Option<String>,
    #[serde(default)]
    snippet: Snippet,
    #[serde(default)]
    content_details: ContentDetails,
    #[serde(default)]
    statistics: Statistics,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Snippet {
    title: Option<String>,
    channel_title: Option<String>,
    channel_id: Option<String>,
    published_at: Option<String>,
    #[serde(default)]
    thumbnails: Thumbnails,
}

#[derive(Debug, Default, Deserialize)]
struct Thumbnails {
    high: Option<Thumbnail>,
}

#[derive(Debug, Default, Deserialize)]
struct Thumbnail {
    url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ContentDetails {
    duration: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Statistics {
    view_count: Option<String>,
}

impl VideoResource {
    fn into_trending(self, region: &str) -> TrendingVideo {
        TrendingVideo {
            id: self.id,
            title: self.snippet.title,
            channel_title: self.snippet.channel_title,
            channel_id: self.snippet.channel_id,
            thumbnail: self.snippet.thumbnails.high.and_then(|t| t.url),
            duration: self.content_details.duration,
            views: self.statistics.view_count,
            published_at: self.snippet.published_at,
            region: region.to_string(),
        }
    }
}

impl YouTubeApi {
    pub fn new(api_key: impl Into<String>) -> Result<Self, FetchError> {
        Self::with_base_url(api_key, BASE_URL)
    }

    pub fn with_base_url(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }
}

#[async_trait]
impl TrendingSource for YouTubeApi {
    async fn trending(&self, region: &str) -> Result<Vec<TrendingVideo>, FetchError> {
        if self.api_key.is_empty() {
            return Err(FetchError::MissingApiKey);
        }

        let region = region.to_uppercase();
        let max_results = MAX_RESULTS.to_string();
        let response: VideoListResponse = self
            .client
            .get(format!("{}/videos", self.base_url))
            .query(&[
                ("part", "snippet,contentDetails,statistics"),
                ("chart", "mostPopular"),
                ("regionCode", region.as_str()),
                ("maxResults", max_results.as_str()),
                ("key", self.api_key.as_str()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(response
            .items
            .into_iter()
            .map(|item| item.into_trending(&region))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn regions_normalize() {
        assert_eq!(normalize_region("in"), "IN");
        assert_eq!(normalize_region("BD"), "BD");
        assert_eq!(normalize_region("us"), "BD");
    }

    #[test]
    fn video_resource_reshapes() {
        let raw = serde_json::json!({
            "items": [{
                "id": "vid1",
                "snippet": {
                    "title": "T",
                    "channelTitle": "C",
                    "channelId": "cid",
                    "publishedAt": "2024-01-01T00:00:00Z",
                    "thumbnails": {"default": {"url": "d"}, "high": {"url": "h"}}
                },
                "contentDetails": {"duration": "PT3M"},
                "statistics": {"viewCount": "42"}
            }, {
                "id": "vid2"
            }]
        });
        let response: VideoListResponse = serde_json::from_value(raw).unwrap();
        let videos: Vec<TrendingVideo> = response
            .items
            .into_iter()
            .map(|item| item.into_trending("IN"))
            .collect();

        assert_eq!(videos[0].thumbnail.as_deref(), Some("h"));
        assert_eq!(videos[0].views.as_deref(), Some("42"));
        assert_eq!(videos[0].duration.as_deref(), Some("PT3M"));
        assert_eq!(videos[1].title, None);
        assert_eq!(videos[1].region, "IN");

        let json = serde_json::to_value(&videos[0]).unwrap();
        assert_eq!(json["channelTitle"], "C");
        assert_eq!(json["publishedAt"], "2024-01-01T00:00:00Z");
    }

    #[tokio::test]
    async fn missing_key_fails_without_request() {
        let api = YouTubeApi::with_base_url("", "http://127.0.0.1:9").unwrap();
        assert!(matches!(
            api.trending("BD").await,
            Err(FetchError::MissingApiKey)
        ));
    }
}
