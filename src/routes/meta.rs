use axum::{Json, extract::State};
use serde_json::{Value, json};

use crate::AppState;

pub async fn root() -> Json<Value> {
    Json(json!({
        "ok": true,
        "service": "yt-dlp-backend",
        "ts": chrono::Utc::now().timestamp(),
    }))
}

pub async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "uptime": state.started_at.elapsed().as_secs(),
    }))
}

pub async fn ready() -> Json<Value> {
    Json(json!({ "ready": true }))
}
