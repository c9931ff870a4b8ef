use std::future::Future;
use std::time::Duration;

use axum::{
    Json,
    extract::State,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{
    AppState,
    cache::{ResponseCache, keys},
    error::AppError,
    services::{FetchError, normalize_region, select_streams},
};

use super::query::LastQuery;

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    q: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UrlQuery {
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StreamsQuery {
    url: Option<String>,
    prefer: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TrendingQuery {
    region: Option<String>,
}

fn required(value: Option<String>, name: &str) -> Result<String, AppError> {
    value.ok_or_else(|| AppError::Validation(format!("missing query parameter: {name}")))
}

fn cached_body(field: &str, cached: bool, value: Value) -> Json<Value> {
    let mut body = Map::new();
    body.insert("cached".into(), Value::Bool(cached));
    body.insert(field.into(), value);
    Json(Value::Object(body))
}

/// 先查缓存，未命中时调用上游并写回缓存；返回 (是否命中, 数据)
pub async fn read_through<T, F, Fut>(
    cache: &ResponseCache,
    key: &str,
    ttl: Duration,
    fetch: F,
) -> Result<(bool, Value), FetchError>
where
    T: Serialize,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
{
    if let Some(hit) = cache.get(key).await {
        return Ok((true, hit));
    }

    let fresh = fetch().await.inspect_err(|err| {
        tracing::error!(key, error = %err, "upstream fetch failed");
    })?;
    let value = serde_json::to_value(&fresh)?;
    cache.set(key, &value, ttl).await;

    Ok((false, value))
}

pub async fn search(
    State(state): State<AppState>,
    LastQuery(query): LastQuery<SearchQuery>,
) -> Result<Json<Value>, AppError> {
    let q = required(query.q, "q")?;
    let key = keys::search_key(&q);
    let extractor = state.extractor.clone();

    let (cached, items) = read_through(&state.cache, &key, state.config.cache_ttl(), move || async move {
        extractor.search(&q).await
    })
    .await?;

    Ok(cached_body("items", cached, items))
}

pub async fn info(
    State(state): State<AppState>,
    LastQuery(query): LastQuery<UrlQuery>,
) -> Result<Json<Value>, AppError> {
    let url = required(query.url, "url")?;
    let key = keys::info_key(&url);
    let extractor = state.extractor.clone();

    let (cached, info) = read_through(&state.cache, &key, state.config.cache_ttl(), move || async move {
        extractor.info(&url).await
    })
    .await?;

    Ok(cached_body("info", cached, info))
}

pub async fn streams(
    State(state): State<AppState>,
    LastQuery(query): LastQuery<StreamsQuery>,
) -> Result<Json<Value>, AppError> {
    let url = required(query.url, "url")?;
    let key = keys::streams_key(query.prefer.as_deref(), &url);
    let extractor = state.extractor.clone();

    let (cached, streams) = read_through(&state.cache, &key, state.config.cache_ttl(), move || async move {
        let info = extractor.info(&url).await?;
        Ok::<_, FetchError>(select_streams(&info))
    })
    .await?;

    Ok(cached_body("streams", cached, streams))
}

pub async fn trending(
    State(state): State<AppState>,
    LastQuery(query): LastQuery<TrendingQuery>,
) -> Result<Json<Value>, AppError> {
    let region = query.region.unwrap_or_else(|| "BD".to_string());
    if region.chars().count() != 2 {
        return Err(AppError::Validation(
            "region must be exactly 2 characters".into(),
        ));
    }
    let region = normalize_region(&region);
    let key = keys::trending_key(&region);
    let source = state.trending.clone();

    let (cached, items) = read_through(&state.cache, &key, state.config.trending_ttl(), move || async move {
        source.trending(&region).await
    })
    .await?;

    Ok(cached_body("items", cached, items))
}
