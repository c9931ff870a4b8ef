use std::cmp::Ordering;

use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StreamOptions {
    pub title: Option<Value>,
    pub best_muxed: Option<Value>,
    pub best_audio: Option<Value>,
}

fn codec_is_none(format: &Value, field: &str) -> bool {
    format.get(field).and_then(Value::as_str) == Some("none")
}

// 缺失或为 null 的数值按 0 处理
fn number(format: &Value, field: &str) -> f64 {
    format.get(field).and_then(Value::as_f64).unwrap_or(0.0)
}

/// 取指定字段最大的格式，并列时取最靠前的
fn best_by<'a>(
    formats: impl DoubleEndedIterator<Item = &'a Value>,
    field: &str,
) -> Option<&'a Value> {
    formats
        .rev()
        .max_by(|a, b| {
            number(a, field)
                .partial_cmp(&number(b, field))
                .unwrap_or(Ordering::Equal)
        })
}

/// 从视频信息中选出最佳音视频合流与最佳纯音频
pub fn select_streams(info: &Value) -> StreamOptions {
    let formats: &[Value] = info
        .get("formats")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    let muxed: Vec<&Value> = formats
        .iter()
        .filter(|f| !codec_is_none(f, "acodec") && !codec_is_none(f, "vcodec"))
        .collect();
    let audio: Vec<&Value> = formats
        .iter()
        .filter(|f| codec_is_none(f, "vcodec"))
        .collect();

    StreamOptions {
        title: info.get("title").cloned(),
        best_muxed: best_by(muxed.into_iter(), "height").cloned(),
        best_audio: best_by(audio.into_iter(), "abr").cloned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn picks_tallest_muxed_and_richest_audio() {
        let info = json!({
            "title": "Clip",
            "formats": [
                {"format_id": "18", "acodec": "mp4a", "vcodec": "avc1", "height": 360},
                {"format_id": "22", "acodec": "mp4a", "vcodec": "avc1", "height": 720},
                {"format_id": "137", "acodec": "none", "vcodec": "avc1", "height": 1080},
                {"format_id": "140", "acodec": "mp4a", "vcodec": "none", "abr": 129.5},
                {"format_id": "251", "acodec": "opus", "vcodec": "none", "abr": 160.0},
            ]
        });

        let streams = select_streams(&info);
        assert_eq!(streams.title, Some(json!("Clip")));
        assert_eq!(streams.best_muxed.unwrap()["format_id"], "22");
        assert_eq!(streams.best_audio.unwrap()["format_id"], "251");
    }

    #[test]
    fn ties_and_missing_numbers_prefer_first() {
        let info = json!({
            "formats": [
                {"format_id": "a", "acodec": "mp4a", "vcodec": "avc1"},
                {"format_id": "b", "acodec": "mp4a", "vcodec": "avc1", "height": null},
                {"format_id": "c", "vcodec": "none"},
                {"format_id": "d", "vcodec": "none", "abr": 0},
            ]
        });

        let streams = select_streams(&info);
        assert_eq!(streams.best_muxed.unwrap()["format_id"], "a");
        assert_eq!(streams.best_audio.unwrap()["format_id"], "c");
        assert_eq!(streams.title, None);
    }

    #[test]
    fn no_formats() {
        let streams = select_streams(&json!({"title": "x", "formats": null}));
        assert_eq!(streams.best_muxed, None);
        assert_eq!(streams.best_audio, None);
    }
}
