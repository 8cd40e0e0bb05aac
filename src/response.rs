//! Standard response envelope and the emitter that renders it.

use crate::error::AppError;
use crate::service::Pagination;
use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

pub const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

/// Uniform wrapper around every response body. `success` is derived from `status`.
#[derive(Serialize, Debug)]
pub struct Envelope<T> {
    pub success: bool,
    pub status: u16,
    pub message: String,
    pub data: Option<T>,
    pub timestamp: String,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<Pagination>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filters: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl<T> Envelope<T> {
    pub fn new(status: StatusCode, message: impl Into<String>, data: Option<T>, version: &str) -> Self {
        Envelope {
            success: status.is_success(),
            status: status.as_u16(),
            message: message.into(),
            data,
            timestamp: chrono::Local::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, false),
            version: version.to_string(),
            pagination: None,
            filters: None,
            error_code: None,
            error_id: None,
            details: None,
        }
    }
}

/// Renders envelopes. Carries the two process-wide facts rendering depends on:
/// whether we run in production (details are withheld) and the API version.
#[derive(Clone, Debug)]
pub struct Emitter {
    production: bool,
    version: String,
}

impl Default for Emitter {
    fn default() -> Self {
        Emitter {
            production: true,
            version: "v1".into(),
        }
    }
}

impl Emitter {
    pub fn new(production: bool, version: impl Into<String>) -> Self {
        Emitter {
            production,
            version: version.into(),
        }
    }

    pub fn is_production(&self) -> bool {
        self.production
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn send<T: Serialize>(&self, data: T, status: StatusCode, message: &str) -> Response {
        self.render(status, &Envelope::new(status, message, Some(data), &self.version))
    }

    pub fn ok<T: Serialize>(&self, data: T) -> Response {
        self.send(data, StatusCode::OK, "Success")
    }

    pub fn paginated<T: Serialize>(
        &self,
        data: Vec<T>,
        pagination: Pagination,
        filters: BTreeMap<String, String>,
    ) -> Response {
        let mut env = Envelope::new(StatusCode::OK, "Success", Some(data), &self.version);
        env.pagination = Some(pagination);
        env.filters = Some(filters);
        self.render(StatusCode::OK, &env)
    }

    /// Error envelope. `details` is dropped in production.
    pub fn error(
        &self,
        message: &str,
        status: StatusCode,
        details: Option<Value>,
        error_code: Option<&str>,
    ) -> Response {
        self.render_error(message, status, details, error_code, None)
    }

    pub fn not_found(&self, resource: &str) -> Response {
        self.error(&format!("{} not found", resource), StatusCode::NOT_FOUND, None, Some("NOT_FOUND"))
    }

    pub fn bad_request(&self, message: &str) -> Response {
        self.error(message, StatusCode::BAD_REQUEST, None, Some("BAD_REQUEST"))
    }

    pub fn unauthorized(&self, message: &str) -> Response {
        self.error(message, StatusCode::UNAUTHORIZED, None, Some("UNAUTHORIZED"))
    }

    pub fn forbidden(&self, message: &str) -> Response {
        self.error(message, StatusCode::FORBIDDEN, None, Some("FORBIDDEN"))
    }

    pub fn too_many_requests(&self, retry_after: u64) -> Response {
        let mut res = self.error(
            "Too many requests",
            StatusCode::TOO_MANY_REQUESTS,
            Some(serde_json::json!({ "retry_after": retry_after })),
            Some("RATE_LIMITED"),
        );
        res.headers_mut()
            .insert(header::RETRY_AFTER, HeaderValue::from(retry_after));
        res
    }

    /// Translate an error into its envelope. Server-side failures get an error id
    /// that is logged with the full cause.
    pub fn app_error(&self, err: &AppError) -> Response {
        self.failure(err, &err.public_message())
    }

    /// Like `app_error`, but server-side failures are reported under `message`
    /// (e.g. "Failed to create resource") instead of the generic text.
    pub fn failure(&self, err: &AppError, message: &str) -> Response {
        if let AppError::TooManyRequests { retry_after } = err {
            return self.too_many_requests(*retry_after);
        }
        if err.is_server_error() && !matches!(err, AppError::Unavailable) {
            let error_id = format!("err_{}", uuid::Uuid::new_v4().simple());
            tracing::error!(error_id = %error_id, error = %err, "request failed");
            let details = Some(serde_json::json!({ "error": err.to_string() }));
            return self.render_error(message, err.status(), details, Some(err.code()), Some(error_id));
        }
        self.error(&err.public_message(), err.status(), None, Some(err.code()))
    }

    fn render_error(
        &self,
        message: &str,
        status: StatusCode,
        details: Option<Value>,
        error_code: Option<&str>,
        error_id: Option<String>,
    ) -> Response {
        let mut env: Envelope<Value> = Envelope::new(status, message, None, &self.version);
        env.error_code = error_code.map(str::to_string);
        env.error_id = error_id;
        if !self.production {
            env.details = details;
        }
        self.render(status, &env)
    }

    fn render<T: Serialize>(&self, status: StatusCode, env: &Envelope<T>) -> Response {
        match serde_json::to_vec(env) {
            Ok(body) => (status, [(header::CONTENT_TYPE, JSON_CONTENT_TYPE)], body).into_response(),
            Err(e) => {
                tracing::error!(error = %e, "envelope serialization failed");
                let body = serde_json::json!({
                    "success": false,
                    "status": 500,
                    "message": "Internal Server Error",
                    "data": null,
                })
                .to_string();
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    [(header::CONTENT_TYPE, JSON_CONTENT_TYPE)],
                    body,
                )
                    .into_response()
            }
        }
    }
}
