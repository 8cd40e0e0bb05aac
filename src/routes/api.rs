//! API assembly: resource routes on the request router, the fallback that
//! feeds it, and the middleware stack.

use crate::error::{AppError, ConfigError};
use crate::extractors::ApiRequest;
use crate::handlers;
use crate::rate_limit::client_key;
use crate::registry::ModelRegistry;
use crate::router::ApiRouter;
use crate::routes::common_routes;
use crate::state::AppState;
use axum::{
    extract::State,
    http::{header, HeaderName, HeaderValue, Method},
    response::Response,
    Router,
};
use std::time::{Duration, Instant};
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, CorsLayer},
    set_header::SetResponseHeaderLayer,
};

/// Add the five standard routes for every registered resource, in registration order.
pub fn register_resource_routes(router: &mut ApiRouter, registry: &ModelRegistry) -> Result<(), ConfigError> {
    for entry in registry.resources() {
        let def = entry.definition();
        let collection = def.path_segment.clone();
        let item = format!("{}/{{id}}", collection);
        let table = [
            (Method::GET, &collection),
            (Method::GET, &item),
            (Method::POST, &collection),
            (Method::PUT, &item),
            (Method::DELETE, &item),
        ];
        for (method, pattern) in table {
            let name = def.name.clone();
            router.add_route(method, pattern, move |state, req, captures| {
                handlers::handle(state, name.clone(), req, captures)
            })?;
        }
    }
    Ok(())
}

/// Everything not served by the common routes: maintenance gate, rate limit,
/// then the request router.
async fn api_fallback(State(state): State<AppState>, req: ApiRequest) -> Response {
    let started = Instant::now();
    let method = req.method.clone();
    let path = req.path.clone();

    let res = if state.config.maintenance_mode {
        state.emitter.app_error(&AppError::Unavailable)
    } else if let Some(limiter) = state.rate_limiter.clone() {
        let decision = limiter.check(&client_key(&req.headers));
        let mut res = if decision.allowed {
            state.router.clone().dispatch(state, req).await
        } else {
            tracing::warn!(method = %method, path = %path, "rate limit exceeded");
            state.emitter.too_many_requests(decision.reset_after)
        };
        decision.apply(&mut res);
        res
    } else {
        state.router.clone().dispatch(state, req).await
    };

    tracing::info!(
        method = %method,
        path = %path,
        status = res.status().as_u16(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "request"
    );
    res
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.iter().any(|o| o == "*") {
        AllowOrigin::mirror_request()
    } else {
        AllowOrigin::list(origins.iter().filter_map(|o| HeaderValue::from_str(o).ok()))
    };
    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static("x-requested-with"),
        ])
        .expose_headers([
            HeaderName::from_static(crate::rate_limit::LIMIT_HEADER),
            HeaderName::from_static(crate::rate_limit::REMAINING_HEADER),
            HeaderName::from_static(crate::rate_limit::RESET_HEADER),
        ])
        .max_age(Duration::from_secs(3600))
}

/// The complete application: common routes, the API fallback, CORS, gzip and
/// security/cache headers.
pub fn build_app(state: AppState) -> Router {
    let middleware = ServiceBuilder::new()
        .layer(cors_layer(&state.config.cors_allowed_origins))
        .layer(CompressionLayer::new())
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_XSS_PROTECTION,
            HeaderValue::from_static("1; mode=block"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::STRICT_TRANSPORT_SECURITY,
            HeaderValue::from_static("max-age=31536000; includeSubDomains"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store, no-cache, must-revalidate, max-age=0"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::PRAGMA,
            HeaderValue::from_static("no-cache"),
        ));

    common_routes()
        .fallback(api_fallback)
        .layer(middleware)
        .with_state(state)
}
