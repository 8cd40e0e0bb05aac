//! Per-request view handed to route handlers: method, raw path, cleaned query
//! parameters, headers and the size-capped body.

use crate::error::AppError;
use crate::sanitize;
use crate::service::Record;
use crate::state::AppState;
use async_trait::async_trait;
use axum::{
    body::Bytes,
    extract::{FromRef, FromRequest, Query, Request},
    http::{header, HeaderMap, Method},
    response::Response,
};
use serde_json::Value;

#[derive(Clone, Debug)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    /// Query pairs in order; values are tag-stripped and entity-escaped.
    pub query: Vec<(String, String)>,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl ApiRequest {
    /// Last value for `key` in the query string.
    pub fn query_param(&self, key: &str) -> Option<&str> {
        self.query.iter().rev().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    /// True when Content-Type names JSON, with or without parameters.
    pub fn is_json(&self) -> bool {
        self.headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(';').next())
            .map(|mime| mime.trim().eq_ignore_ascii_case("application/json"))
            .unwrap_or(false)
    }

    /// Decode the body as a JSON object.
    pub fn json_object(&self) -> Result<Record, AppError> {
        if self.body.iter().all(u8::is_ascii_whitespace) {
            return Err(AppError::BadRequest("No data provided".into()));
        }
        match serde_json::from_slice::<Value>(&self.body) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => Err(AppError::BadRequest("Request body must be a JSON object".into())),
            Err(_) => Err(AppError::BadRequest("Invalid JSON format".into())),
        }
    }
}

#[async_trait]
impl<S> FromRequest<S> for ApiRequest
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let app = AppState::from_ref(state);
        let limit = app.config.max_body_bytes;
        let (parts, body) = req.into_parts();

        let declared = parts
            .headers
            .get(header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<usize>().ok());
        if declared.is_some_and(|n| n > limit) {
            return Err(app.emitter.app_error(&AppError::PayloadTooLarge));
        }
        let body = axum::body::to_bytes(body, limit)
            .await
            .map_err(|_| app.emitter.app_error(&AppError::PayloadTooLarge))?;

        let Query(raw) = Query::<Vec<(String, String)>>::try_from_uri(&parts.uri)
            .map_err(|_| app.emitter.bad_request("Invalid query string"))?;
        let query = raw
            .into_iter()
            .map(|(k, v)| (k, sanitize::clean_query_value(&v)))
            .collect();

        Ok(ApiRequest {
            method: parts.method,
            path: parts.uri.path().to_string(),
            query,
            headers: parts.headers,
            body,
        })
    }
}
