//! Resource controller: one request against one registered resource.

use crate::auth::bearer_token;
use crate::error::AppError;
use crate::extractors::ApiRequest;
use crate::service::{FilterSet, PageRequest, Pagination, ResourceHandler};
use crate::state::AppState;
use axum::http::{Method, StatusCode};
use axum::response::Response;
use serde_json::json;

/// Route entry point. `captures` holds the `{id}` path segment when the route has one.
pub async fn handle(state: AppState, resource: String, req: ApiRequest, captures: Vec<String>) -> Response {
    match dispatch(&state, &resource, &req, captures.first().map(String::as_str)).await {
        Ok(res) => res,
        Err(e) => state.emitter.app_error(&e),
    }
}

async fn dispatch(
    state: &AppState,
    resource: &str,
    req: &ApiRequest,
    path_id: Option<&str>,
) -> Result<Response, AppError> {
    if !state.auth.validate(bearer_token(&req.headers)) {
        return Err(AppError::Unauthorized("Invalid or missing authentication token".into()));
    }
    let entry = state.registry.resolve(resource)?;
    let id = request_id(req, path_id)?;

    match req.method {
        Method::GET => {
            let mut handler = entry.handler(state.stores.acquire().await?);
            match id {
                Some(id) => {
                    let record = handler.get(id).await?;
                    Ok(state.emitter.ok(record))
                }
                None => list(state, &mut handler, req).await,
            }
        }
        Method::POST => {
            let body = json_body(req)?;
            let mut handler = entry.handler(state.stores.acquire().await?);
            match handler.create(body).await {
                Ok(id) => Ok(state.emitter.send(json!({ "id": id }), StatusCode::CREATED, "Created successfully")),
                Err(e) => Ok(state.emitter.failure(&e, "Failed to create resource")),
            }
        }
        Method::PUT => {
            let id = id.ok_or_else(|| AppError::InvalidArgument("ID parameter required".into()))?;
            let body = json_body(req)?;
            let mut handler = entry.handler(state.stores.acquire().await?);
            match handler.update(id, body).await {
                Ok(true) => Ok(state.emitter.send(json!({ "id": id }), StatusCode::OK, "Updated successfully")),
                Ok(false) => Err(AppError::NotFound("Resource".into())),
                Err(e) => Ok(state.emitter.failure(&e, "Failed to update resource")),
            }
        }
        Method::DELETE => {
            let id = id.ok_or_else(|| AppError::InvalidArgument("ID parameter required".into()))?;
            let mut handler = entry.handler(state.stores.acquire().await?);
            match handler.delete(id).await {
                Ok(true) => Ok(state.emitter.send(json!({ "id": id }), StatusCode::OK, "Deleted successfully")),
                Ok(false) => Err(AppError::NotFound("Resource".into())),
                Err(e) => Ok(state.emitter.failure(&e, "Failed to delete resource")),
            }
        }
        _ => Err(AppError::MethodNotAllowed),
    }
}

async fn list(state: &AppState, handler: &mut ResourceHandler, req: &ApiRequest) -> Result<Response, AppError> {
    let filters = FilterSet::from_query(&req.query);
    let page = PageRequest::from_query(&req.query);
    let rows = handler.list(&filters, &page).await?;
    let total = handler.count(&filters).await?;
    Ok(state
        .emitter
        .paginated(rows, Pagination::new(&page, total), filters.to_map()))
}

/// The id from the path capture, else from `?id=`. Present but unparsable is an error.
fn request_id(req: &ApiRequest, path_id: Option<&str>) -> Result<Option<i64>, AppError> {
    let Some(raw) = path_id.or_else(|| req.query_param("id")).filter(|s| !s.is_empty()) else {
        return Ok(None);
    };
    match raw.trim().parse::<i64>() {
        Ok(id) if id > 0 => Ok(Some(id)),
        _ => Err(AppError::InvalidArgument("Invalid ID".into())),
    }
}

fn json_body(req: &ApiRequest) -> Result<crate::service::Record, AppError> {
    if !req.is_json() {
        return Err(AppError::UnsupportedMediaType);
    }
    req.json_object()
}
