use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::middleware::RateLimitConfig;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {name}: {value:?}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct Config {
    pub server_host: String,
    pub server_port: u16,
    pub api_key: String,
    pub require_api_key: bool,
    pub trust_forwarded_for: bool,
    pub rate_limit_capacity: u32,
    pub rate_limit_refill_rate: f64,
    pub rate_limit_burst: u32,
    pub upstash_rest_url: String,
    pub upstash_rest_token: String,
    pub redis_url: String,
    pub cache_remote_timeout_ms: u64,
    pub cache_local_max_entries: usize,
    pub cache_ttl_secs: u64,
    pub trending_ttl_secs: u64,
    pub sweep_interval_secs: u64,
    pub youtube_api_key: String,
    pub ytdlp_bin: String,
    pub ytdlp_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server_host: "0.0.0.0".into(),
            server_port: 8080,
            api_key: String::new(),
            require_api_key: false,
            trust_forwarded_for: false,
            rate_limit_capacity: 40,
            rate_limit_refill_rate: 2.0,
            rate_limit_burst: 15,
            upstash_rest_url: String::new(),
            upstash_rest_token: String::new(),
            redis_url: String::new(),
            cache_remote_timeout_ms: 2000,
            cache_local_max_entries: 10_000,
            cache_ttl_secs: 600,
            trending_ttl_secs: 1800,
            sweep_interval_secs: 60,
            youtube_api_key: String::new(),
            ytdlp_bin: "yt-dlp".into(),
            ytdlp_timeout_secs: 15,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();

        let defaults = Config::default();
        let config = Config {
            server_host: string_var("SERVER_HOST", defaults.server_host),
            server_port: parse_var("PORT", defaults.server_port)?,
            api_key: string_var("API_KEY", defaults.api_key),
            require_api_key: bool_var("REQUIRE_API_KEY", defaults.require_api_key)?,
            trust_forwarded_for: bool_var("TRUST_FORWARDED_FOR", defaults.trust_forwarded_for)?,
            rate_limit_capacity: parse_var("RATE_LIMIT_CAPACITY", defaults.rate_limit_capacity)?,
            rate_limit_refill_rate: parse_var(
                "RATE_LIMIT_REFILL_RATE",
                defaults.rate_limit_refill_rate,
            )?,
            rate_limit_burst: parse_var("RATE_LIMIT_BURST", defaults.rate_limit_burst)?,
            upstash_rest_url: string_var("UPSTASH_REDIS_REST_URL", defaults.upstash_rest_url),
            upstash_rest_token: string_var("UPSTASH_REDIS_REST_TOKEN", defaults.upstash_rest_token),
            redis_url: string_var("REDIS_URL", defaults.redis_url),
            cache_remote_timeout_ms: parse_var(
                "CACHE_REMOTE_TIMEOUT_MS",
                defaults.cache_remote_timeout_ms,
            )?,
            cache_local_max_entries: parse_var(
                "CACHE_LOCAL_MAX_ENTRIES",
                defaults.cache_local_max_entries,
            )?,
            cache_ttl_secs: parse_var("CACHE_TTL_SECS", defaults.cache_ttl_secs)?,
            trending_ttl_secs: parse_var("TRENDING_TTL_SECS", defaults.trending_ttl_secs)?,
            sweep_interval_secs: parse_var("SWEEP_INTERVAL_SECS", defaults.sweep_interval_secs)?,
            youtube_api_key: string_var("YOUTUBE_API_KEY", defaults.youtube_api_key),
            ytdlp_bin: string_var("YTDLP_BIN", defaults.ytdlp_bin),
            ytdlp_timeout_secs: parse_var("YTDLP_TIMEOUT_SECS", defaults.ytdlp_timeout_secs)?,
        };
        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rate_limit_capacity == 0 {
            return Err(invalid("RATE_LIMIT_CAPACITY", self.rate_limit_capacity));
        }
        if !(self.rate_limit_refill_rate.is_finite() && self.rate_limit_refill_rate > 0.0) {
            return Err(invalid("RATE_LIMIT_REFILL_RATE", self.rate_limit_refill_rate));
        }
        if self.cache_remote_timeout_ms == 0 {
            return Err(invalid("CACHE_REMOTE_TIMEOUT_MS", self.cache_remote_timeout_ms));
        }
        if self.cache_local_max_entries == 0 {
            return Err(invalid("CACHE_LOCAL_MAX_ENTRIES", self.cache_local_max_entries));
        }
        if self.sweep_interval_secs == 0 {
            return Err(invalid("SWEEP_INTERVAL_SECS", self.sweep_interval_secs));
        }
        if self.ytdlp_timeout_secs == 0 {
            return Err(invalid("YTDLP_TIMEOUT_SECS", self.ytdlp_timeout_secs));
        }
        Ok(())
    }

    pub fn rate_limit(&self) -> RateLimitConfig {
        RateLimitConfig {
            capacity: self.rate_limit_capacity,
            refill_rate: self.rate_limit_refill_rate,
            burst: self.rate_limit_burst,
        }
    }

    pub fn cache_remote_timeout(&self) -> Duration {
        Duration::from_millis(self.cache_remote_timeout_ms)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn trending_ttl(&self) -> Duration {
        Duration::from_secs(self.trending_ttl_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn ytdlp_timeout(&self) -> Duration {
        Duration::from_secs(self.ytdlp_timeout_secs)
    }
}

fn invalid(name: &'static str, value: impl ToString) -> ConfigError {
    ConfigError::Invalid {
        name,
        value: value.to_string(),
    }
}

// 未设置或为空时使用默认值
fn string_var(name: &'static str, default: String) -> String {
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => value.trim().to_string(),
        _ => default,
    }
}

fn parse_var<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => {
            value.trim().parse().map_err(|_| invalid(name, value))
        }
        _ => Ok(default),
    }
}

fn bool_var(name: &'static str, default: bool) -> Result<bool, ConfigError> {
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => match value.trim().to_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(true),
            "false" | "0" | "no" => Ok(false),
            _ => Err(invalid(name, value)),
        },
        _ => Ok(default),
    }
}
