//! Example consumer: serves `product` and `user` resources over PostgreSQL.
//!
//! Create the tables from `schema.sql`, then run from repo root:
//! `cargo run -p example-consumer`

use serde_json::json;
use sql_rest::{
    build_app, init_tracing, AppConfig, AppState, FieldKind, FieldRules, ModelRegistry, ResourceDefinition,
    ValidationRule,
};
use std::sync::Arc;
use tokio::net::TcpListener;

fn registry() -> Result<ModelRegistry, sql_rest::ConfigError> {
    let mut registry = ModelRegistry::new();
    registry.register(
        ResourceDefinition::new("product", "products")
            .field("name", FieldKind::Text)
            .field("description", FieldKind::Text)
            .field("price", FieldKind::Float)
            .field("quantity", FieldKind::Integer)
            .field("active", FieldKind::Boolean)
            .read_only("created_at", FieldKind::Timestamp)
            .validator(
                FieldRules::new()
                    .rule("name", ValidationRule::required().min_length(2).max_length(255))
                    .rule("price", ValidationRule::required().minimum(0.0))
                    .rule("quantity", ValidationRule::default().minimum(0.0)),
            ),
    )?;
    registry.register(
        ResourceDefinition::new("user", "users")
            .field("name", FieldKind::Text)
            .field("email", FieldKind::Text)
            .field("role", FieldKind::Text)
            .read_only("created_at", FieldKind::Timestamp)
            .validator(
                FieldRules::new()
                    .rule("name", ValidationRule::required().max_length(100))
                    .rule("email", ValidationRule::required().format("email"))
                    .rule("role", ValidationRule::default().allowed(vec![json!("user"), json!("admin")])),
            ),
    )?;
    Ok(registry)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = AppConfig::from_env()?;
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .connect(&config.database_url)
        .await?;

    let bind_addr = config.bind_addr.clone();
    let base_path = config.base_path.clone();
    let state = AppState::new(config, registry()?, Arc::new(pool))?;
    let app = build_app(state);

    let listener = TcpListener::bind(&bind_addr).await?;
    tracing::info!("Example consumer listening on http://{}{}", listener.local_addr()?, base_path);
    axum::serve(listener, app).await?;
    Ok(())
}
