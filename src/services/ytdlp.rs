use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tokio::process::Command;

use super::{FetchError, SearchItem, VideoExtractor};

const SEARCH_RESULTS: usize = 10;
const WATCH_URL: &str = "https://www.youtube.com/watch?v=";

/// 调用 yt-dlp 可执行文件
#[derive(Debug, Clone)]
pub struct YtDlp {
    program: String,
    timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct RawThumbnail {
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawEntry {
    id: Option<String>,
    title: Option<String>,
    channel: Option<String>,
    uploader: Option<String>,
    duration: Option<f64>,
    thumbnail: Option<String>,
    #[serde(default)]
    thumbnails: Vec<RawThumbnail>,
}

impl From<RawEntry> for SearchItem {
    fn from(entry: RawEntry) -> Self {
        let url = format!("{}{}", WATCH_URL, entry.id.as_deref().unwrap_or_default());
        let thumbnail = entry
            .thumbnails
            .into_iter()
            .next_back()
            .and_then(|t| t.url)
            .or(entry.thumbnail);

        SearchItem {
            id: entry.id,
            title: entry.title,
            url,
            channel: entry.channel.or(entry.uploader),
            duration: entry.duration,
            thumbnail,
        }
    }
}

impl YtDlp {
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }

    async fn run(&self, args: &[&str]) -> Result<String, FetchError> {
        tracing::debug!(program = %self.program, ?args, "running extractor");

        let child = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| FetchError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        // 超时后 child 被丢弃，进程随之终止
        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| FetchError::Timeout {
                program: self.program.clone(),
                timeout: self.timeout,
            })?
            .map_err(|source| FetchError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(FetchError::Exit {
                program: self.program.clone(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

fn parse_search_lines(stdout: &str) -> Result<Vec<SearchItem>, FetchError> {
    stdout
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            serde_json::from_str::<RawEntry>(line)
                .map(SearchItem::from)
                .map_err(FetchError::from)
        })
        .collect()
}

#[async_trait]
impl VideoExtractor for YtDlp {
    async fn search(&self, query: &str) -> Result<Vec<SearchItem>, FetchError> {
        let target = format!("ytsearch{}:{}", SEARCH_RESULTS, query);
        let stdout = self
            .run(&["-j", "--flat-playlist", "--quiet", "--", &target])
            .await?;
        parse_search_lines(&stdout)
    }

    async fn info(&self, url: &str) -> Result<Value, FetchError> {
        let stdout = self
            .run(&["-j", "--no-playlist", "--quiet", "--", url])
            .await?;
        Ok(serde_json::from_str(stdout.trim())?)
    }
}
