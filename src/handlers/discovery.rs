//! Discovery listing: every registered resource's standard endpoints.

use crate::registry::ModelRegistry;
use crate::state::AppState;
use axum::http::StatusCode;
use axum::response::Response;
use serde::Serialize;

#[derive(Serialize, Debug, PartialEq)]
pub struct EndpointInfo {
    pub method: &'static str,
    pub path: String,
    pub description: String,
}

#[derive(Serialize, Debug)]
pub struct Discovery {
    pub name: &'static str,
    pub version: String,
    pub endpoints: Vec<EndpointInfo>,
}

/// Five endpoints per resource, in registration order.
pub fn endpoints(registry: &ModelRegistry, base_path: &str) -> Vec<EndpointInfo> {
    let mut out = Vec::with_capacity(registry.len() * 5);
    for entry in registry.resources() {
        let def = entry.definition();
        let collection = format!("{}/{}", base_path, def.path_segment);
        let item = format!("{}/{{id}}", collection);
        let name = &def.name;
        out.push(EndpointInfo {
            method: "GET",
            path: collection.clone(),
            description: format!("List all {}", def.path_segment),
        });
        out.push(EndpointInfo {
            method: "GET",
            path: item.clone(),
            description: format!("Get {} by ID", name),
        });
        out.push(EndpointInfo {
            method: "POST",
            path: collection,
            description: format!("Create new {}", name),
        });
        out.push(EndpointInfo {
            method: "PUT",
            path: item.clone(),
            description: format!("Update {}", name),
        });
        out.push(EndpointInfo {
            method: "DELETE",
            path: item,
            description: format!("Delete {}", name),
        });
    }
    out
}

pub fn discovery(state: &AppState) -> Response {
    let body = Discovery {
        name: "SQL REST API",
        version: state.emitter.version().to_string(),
        endpoints: endpoints(&state.registry, state.router.base_path()),
    };
    state.emitter.send(body, StatusCode::OK, "Available endpoints")
}
