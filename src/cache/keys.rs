/// 搜索结果缓存键前缀
const SEARCH_PREFIX: &str = "search:";

/// 视频信息缓存键前缀
const INFO_PREFIX: &str = "info:";

/// 流选择缓存键前缀
const STREAMS_PREFIX: &str = "streams:";

/// 热门视频缓存键前缀
const TRENDING_PREFIX: &str = "trending:";

/// 未指定偏好时的占位
const DEFAULT_PREFERENCE: &str = "auto";

pub fn search_key(query: &str) -> String {
    format!("{}{}", SEARCH_PREFIX, query)
}

pub fn info_key(url: &str) -> String {
    format!("{}{}", INFO_PREFIX, url)
}

pub fn streams_key(prefer: Option<&str>, url: &str) -> String {
    let prefer = prefer.filter(|p| !p.is_empty()).unwrap_or(DEFAULT_PREFERENCE);
    format!("{}{}:{}", STREAMS_PREFIX, prefer, url)
}

pub fn trending_key(region: &str) -> String {
    format!("{}{}", TRENDING_PREFIX, region)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_namespaced() {
        assert_eq!(search_key("lofi"), "search:lofi");
        assert_eq!(info_key("https://youtu.be/x"), "info:https://youtu.be/x");
        assert_eq!(trending_key("BD"), "trending:BD");
    }

    #[test]
    fn streams_key_defaults_preference() {
        assert_eq!(streams_key(None, "u"), "streams:auto:u");
        assert_eq!(streams_key(Some(""), "u"), "streams:auto:u");
        assert_eq!(streams_key(Some("audio"), "u"), "streams:audio:u");
    }
}
