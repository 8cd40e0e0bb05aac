//! Request router: an ordered table of (method, pattern, handler). The first
//! matching entry wins, so a later duplicate pattern is never reached. A path
//! that matches only under other methods answers 405 with `Allow`.

use crate::error::{AppError, ConfigError};
use crate::extractors::ApiRequest;
use crate::handlers::discovery;
use crate::state::AppState;
use axum::http::{header, HeaderValue, Method};
use axum::response::Response;
use regex::Regex;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

pub type BoxFuture = Pin<Box<dyn Future<Output = Response> + Send>>;

/// Route callback: shared state, the request, and the path captures in order.
pub type RouteHandler = Arc<dyn Fn(AppState, ApiRequest, Vec<String>) -> BoxFuture + Send + Sync>;

struct Route {
    method: Method,
    pattern: String,
    regex: Regex,
    handler: RouteHandler,
}

pub struct ApiRouter {
    base_path: String,
    routes: Vec<Route>,
}

impl ApiRouter {
    pub fn new(base_path: &str) -> Self {
        ApiRouter {
            base_path: base_path.trim_end_matches('/').to_string(),
            routes: Vec::new(),
        }
    }

    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    /// Register a route. `pattern` is a path template such as `products/{id}`;
    /// each `{name}` segment captures a decimal integer.
    pub fn add_route<F, Fut>(&mut self, method: Method, pattern: &str, handler: F) -> Result<(), ConfigError>
    where
        F: Fn(AppState, ApiRequest, Vec<String>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Response> + Send + 'static,
    {
        let regex = compile_pattern(pattern)?;
        let handler: RouteHandler = Arc::new(move |state, req, captures| Box::pin(handler(state, req, captures)));
        self.routes.push(Route {
            method,
            pattern: pattern.trim_matches('/').to_string(),
            regex,
            handler,
        });
        Ok(())
    }

    /// Registered (method, pattern) pairs in match order.
    pub fn routes(&self) -> impl Iterator<Item = (&Method, &str)> {
        self.routes.iter().map(|r| (&r.method, r.pattern.as_str()))
    }

    /// Strip the base prefix (on a segment boundary) and surrounding slashes.
    pub fn normalize<'a>(&self, path: &'a str) -> &'a str {
        let rest = match path.strip_prefix(self.base_path.as_str()) {
            Some(rest) if !self.base_path.is_empty() && (rest.is_empty() || rest.starts_with('/')) => rest,
            _ => path,
        };
        rest.trim_matches('/')
    }

    /// Index of the first route matching method and normalized path, with its captures.
    pub fn find(&self, method: &Method, path: &str) -> Option<(usize, Vec<String>)> {
        self.routes.iter().enumerate().find_map(|(i, r)| {
            if r.method != *method {
                return None;
            }
            let caps = r.regex.captures(path)?;
            let values = caps
                .iter()
                .skip(1)
                .flatten()
                .map(|m| m.as_str().to_string())
                .collect();
            Some((i, values))
        })
    }

    /// Methods registered for a normalized path, in registration order.
    pub fn allowed_methods(&self, path: &str) -> Vec<Method> {
        let mut methods: Vec<Method> = Vec::new();
        for r in self.routes.iter().filter(|r| r.regex.is_match(path)) {
            if !methods.contains(&r.method) {
                methods.push(r.method.clone());
            }
        }
        methods
    }

    /// Route one request. The empty path and `home` answer with discovery; a
    /// known path under another method answers 405; anything else answers 404
    /// "Endpoint not found".
    pub async fn dispatch(&self, state: AppState, req: ApiRequest) -> Response {
        let path = self.normalize(&req.path).to_string();
        if path.is_empty() || path == "home" {
            return discovery::discovery(&state);
        }
        match self.find(&req.method, &path) {
            Some((i, captures)) => {
                let handler = self.routes[i].handler.clone();
                handler(state, req, captures).await
            }
            None => {
                let allowed = self.allowed_methods(&path);
                if allowed.is_empty() {
                    tracing::debug!(method = %req.method, path = %path, "no route matched");
                    return state.emitter.not_found("Endpoint");
                }
                tracing::debug!(method = %req.method, path = %path, "method not allowed");
                let mut res = state.emitter.app_error(&AppError::MethodNotAllowed);
                let allow = allowed.iter().map(Method::as_str).collect::<Vec<_>>().join(", ");
                if let Ok(value) = HeaderValue::from_str(&allow) {
                    res.headers_mut().insert(header::ALLOW, value);
                }
                res
            }
        }
    }
}

fn compile_pattern(pattern: &str) -> Result<Regex, ConfigError> {
    let trimmed = pattern.trim_matches('/');
    let mut parts = Vec::new();
    for seg in trimmed.split('/') {
        if seg.starts_with('{') && seg.ends_with('}') && seg.len() > 2 {
            parts.push(r"(\d+)".to_string());
        } else if seg.is_empty() || seg.contains(['{', '}']) {
            return Err(ConfigError::InvalidPattern(pattern.to_string()));
        } else {
            parts.push(regex::escape(seg));
        }
    }
    Regex::new(&format!("^{}$", parts.join("/"))).map_err(|_| ConfigError::InvalidPattern(pattern.to_string()))
}
