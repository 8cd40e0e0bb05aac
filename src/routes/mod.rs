//! Application routes: common probes and the API surface.

pub mod api;
pub mod common;
pub use api::{build_app, register_resource_routes};
pub use common::common_routes;
