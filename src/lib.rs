//! SQL REST: a small REST-over-SQL framework. Register resource definitions,
//! get list/get/create/update/delete endpoints backed by PostgreSQL.

pub mod auth;
pub mod config;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod rate_limit;
pub mod registry;
pub mod response;
pub mod router;
pub mod routes;
pub mod sanitize;
pub mod service;
pub mod sql;
pub mod state;
pub mod store;

pub use auth::{AcceptAnyToken, TokenValidator};
pub use config::{AppConfig, Environment, FieldKind, ResourceDefinition};
pub use error::{AppError, ConfigError};
pub use registry::ModelRegistry;
pub use response::{Emitter, Envelope};
pub use routes::{build_app, common_routes};
pub use service::{FieldRules, Record, RecordValidator, ResourceHandler, ValidationRule, WriteMode};
pub use state::AppState;
pub use store::{PgStore, RecordStore, StoreProvider};

/// Install the global `tracing` subscriber. `RUST_LOG` overrides the default filter.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("sql_rest=info")),
        )
        .init();
}
