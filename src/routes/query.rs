use axum::{
    extract::{FromRequestParts, Query},
    http::request::Parts,
};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::AppError;

/// 查询参数提取器：重复参数取最后一个值，解析失败返回 422 JSON
///
/// 目标类型的字段须为字符串（或 `Option<String>`）。
#[derive(Debug, Clone)]
pub struct LastQuery<T>(pub T);

impl<T, S> FromRequestParts<S> for LastQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Query(pairs) = Query::<Vec<(String, String)>>::try_from_uri(&parts.uri)
            .map_err(|rejection| AppError::Validation(rejection.body_text()))?;

        let mut params = Map::new();
        for (name, value) in pairs {
            params.insert(name, Value::String(value));
        }

        serde_json::from_value(Value::Object(params))
            .map(LastQuery)
            .map_err(|err| AppError::Validation(format!("invalid query string: {err}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{Request, StatusCode};
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Params {
        q: Option<String>,
        region: Option<String>,
    }

    #[derive(Debug, Deserialize)]
    struct Strict {
        #[allow(dead_code)]
        id: String,
    }

    async fn extract<T: DeserializeOwned>(uri: &str) -> Result<T, AppError> {
        let (mut parts, _) = Request::builder().uri(uri).body(()).unwrap().into_parts();
        LastQuery::<T>::from_request_parts(&mut parts, &())
            .await
            .map(|LastQuery(value)| value)
    }

    #[tokio::test]
    async fn repeated_parameter_keeps_last_value() {
        let params: Params = extract("/search?q=a&q=b&region=BD&region=in").await.unwrap();
        assert_eq!(params.q.as_deref(), Some("b"));
        assert_eq!(params.region.as_deref(), Some("in"));
    }

    #[tokio::test]
    async fn absent_and_unknown_parameters() {
        let params: Params = extract("/search?other=1").await.unwrap();
        assert!(params.q.is_none());

        let params: Params = extract("/search").await.unwrap();
        assert!(params.region.is_none());
    }

    #[tokio::test]
    async fn decoding_failure_is_validation_error() {
        let err = extract::<Strict>("/info?name=x").await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
        assert!(err.to_string().contains("invalid query string"));
    }
}
