//! Shared fixtures: an in-memory record store and helpers that drive the
//! assembled app with `oneshot`.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use sql_rest::service::{FilterSet, PageRequest, SortOrder};
use sql_rest::{
    build_app, AppConfig, AppError, AppState, FieldKind, FieldRules, ModelRegistry, Record, RecordStore,
    ResourceDefinition, StoreProvider, ValidationRule,
};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

#[derive(Clone, Default)]
struct Table {
    last_id: i64,
    rows: BTreeMap<i64, Record>,
}

type Tables = HashMap<String, Table>;

/// Hands out stores over one shared set of tables.
#[derive(Clone, Default)]
pub struct MemoryProvider {
    tables: Arc<Mutex<Tables>>,
    failing: Arc<AtomicBool>,
}

impl MemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent store operation fail like a broken connection.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, AtomicOrdering::SeqCst);
    }

    pub fn row_count(&self, table: &str) -> usize {
        self.tables
            .lock()
            .unwrap()
            .get(table)
            .map(|t| t.rows.len())
            .unwrap_or(0)
    }
}

#[async_trait]
impl StoreProvider for MemoryProvider {
    async fn acquire(&self) -> Result<Box<dyn RecordStore>, AppError> {
        Ok(Box::new(MemoryStore {
            tables: self.tables.clone(),
            failing: self.failing.clone(),
            snapshot: None,
        }))
    }

    async fn ping(&self) -> Result<(), AppError> {
        self.check()
    }
}

impl MemoryProvider {
    fn check(&self) -> Result<(), AppError> {
        if self.failing.load(AtomicOrdering::SeqCst) {
            return Err(AppError::Db(sqlx::Error::Protocol("connection reset".into())));
        }
        Ok(())
    }
}

pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
    failing: Arc<AtomicBool>,
    snapshot: Option<Tables>,
}

impl MemoryStore {
    fn check(&self) -> Result<(), AppError> {
        if self.failing.load(AtomicOrdering::SeqCst) {
            return Err(AppError::Db(sqlx::Error::Protocol("connection reset".into())));
        }
        Ok(())
    }

    fn matching(&self, def: &ResourceDefinition, filters: &FilterSet) -> Vec<Record> {
        let tables = self.tables.lock().unwrap();
        let Some(table) = tables.get(&def.table) else {
            return Vec::new();
        };
        table
            .rows
            .values()
            .filter(|row| {
                filters.iter().all(|(col, raw)| match def.kind_of(col) {
                    Some(kind) => kind
                        .coerce(raw)
                        .is_some_and(|v| values_equal(row.get(col).unwrap_or(&Value::Null), &v)),
                    None => true,
                })
            })
            .cloned()
            .collect()
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

fn compare(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Less,
        (_, Value::Null) => Ordering::Greater,
        _ => a.to_string().cmp(&b.to_string()),
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn list(
        &mut self,
        def: &ResourceDefinition,
        filters: &FilterSet,
        page: &PageRequest,
    ) -> Result<Vec<Record>, AppError> {
        self.check()?;
        let mut rows = self.matching(def, filters);
        let order_by = if def.has_column(&page.order_by) {
            page.order_by.clone()
        } else {
            def.primary_key.clone()
        };
        rows.sort_by(|a, b| {
            let ord = compare(
                a.get(&order_by).unwrap_or(&Value::Null),
                b.get(&order_by).unwrap_or(&Value::Null),
            );
            match page.order {
                SortOrder::Asc => ord,
                SortOrder::Desc => ord.reverse(),
            }
        });
        Ok(rows
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.per_page as usize)
            .collect())
    }

    async fn count(&mut self, def: &ResourceDefinition, filters: &FilterSet) -> Result<u64, AppError> {
        self.check()?;
        Ok(self.matching(def, filters).len() as u64)
    }

    async fn get(&mut self, def: &ResourceDefinition, id: i64) -> Result<Option<Record>, AppError> {
        self.check()?;
        let tables = self.tables.lock().unwrap();
        Ok(tables.get(&def.table).and_then(|t| t.rows.get(&id)).cloned())
    }

    async fn insert(&mut self, def: &ResourceDefinition, fields: &Record) -> Result<i64, AppError> {
        self.check()?;
        let mut tables = self.tables.lock().unwrap();
        let table = tables.entry(def.table.clone()).or_default();
        table.last_id += 1;
        let id = table.last_id;
        let mut row = Record::new();
        for (name, kind) in def.columns() {
            let value = if name == def.primary_key {
                json!(id)
            } else if kind == FieldKind::Timestamp && !def.is_writable(name) {
                json!("2024-01-01T00:00:00+00:00")
            } else {
                fields.get(name).cloned().unwrap_or(Value::Null)
            };
            row.insert(name.to_string(), value);
        }
        table.rows.insert(id, row);
        Ok(id)
    }

    async fn update(&mut self, def: &ResourceDefinition, id: i64, fields: &Record) -> Result<bool, AppError> {
        self.check()?;
        let mut tables = self.tables.lock().unwrap();
        let Some(row) = tables.get_mut(&def.table).and_then(|t| t.rows.get_mut(&id)) else {
            return Ok(false);
        };
        for (k, v) in fields {
            if def.is_writable(k) {
                row.insert(k.clone(), v.clone());
            }
        }
        Ok(true)
    }

    async fn delete(&mut self, def: &ResourceDefinition, id: i64) -> Result<bool, AppError> {
        self.check()?;
        let mut tables = self.tables.lock().unwrap();
        Ok(tables
            .get_mut(&def.table)
            .and_then(|t| t.rows.remove(&id))
            .is_some())
    }

    async fn begin(&mut self) -> Result<(), AppError> {
        self.check()?;
        self.snapshot = Some(self.tables.lock().unwrap().clone());
        Ok(())
    }

    async fn commit(&mut self) -> Result<(), AppError> {
        self.check()?;
        self.snapshot = None;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), AppError> {
        self.check()?;
        if let Some(snapshot) = self.snapshot.take() {
            *self.tables.lock().unwrap() = snapshot;
        }
        Ok(())
    }
}

pub fn product_definition() -> ResourceDefinition {
    ResourceDefinition::new("product", "products")
        .field("name", FieldKind::Text)
        .field("description", FieldKind::Text)
        .field("price", FieldKind::Float)
        .field("quantity", FieldKind::Integer)
        .field("active", FieldKind::Boolean)
        .read_only("created_at", FieldKind::Timestamp)
        .validator(
            FieldRules::new()
                .rule("name", ValidationRule::required().max_length(255))
                .rule("price", ValidationRule::default().minimum(0.0)),
        )
}

pub fn registry() -> ModelRegistry {
    let mut registry = ModelRegistry::new();
    registry.register(product_definition()).unwrap();
    registry
        .register(
            ResourceDefinition::new("user", "users")
                .field("name", FieldKind::Text)
                .field("email", FieldKind::Text)
                .validator(FieldRules::new().rule("email", ValidationRule::required().format("email"))),
        )
        .unwrap();
    registry
}

pub fn test_config() -> AppConfig {
    AppConfig::default()
}

pub fn state_with(config: AppConfig, provider: &MemoryProvider) -> AppState {
    AppState::new(config, registry(), Arc::new(provider.clone())).unwrap()
}

pub fn app_with(config: AppConfig) -> (Router, MemoryProvider) {
    let provider = MemoryProvider::new();
    let app = build_app(state_with(config, &provider));
    (app, provider)
}

pub fn app() -> (Router, MemoryProvider) {
    app_with(test_config())
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

pub async fn send_request(app: &Router, req: Request<Body>) -> TestResponse {
    let res = app.clone().oneshot(req).await.unwrap();
    let status = res.status();
    let headers = res.headers().clone();
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    TestResponse { status, headers, body }
}

/// JSON request; `body` is sent with `Content-Type: application/json`.
pub async fn call(app: &Router, method: Method, uri: &str, body: Option<Value>) -> TestResponse {
    let builder = Request::builder().method(method).uri(uri);
    let req = match body {
        Some(v) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(v.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    send_request(app, req).await
}

pub async fn create_product(app: &Router, name: &str, price: f64) -> i64 {
    let res = call(
        app,
        Method::POST,
        "/api/v1/products",
        Some(json!({ "name": name, "price": price, "quantity": 1 })),
    )
    .await;
    assert_eq!(res.status, StatusCode::CREATED, "{}", res.body);
    res.body["data"]["id"].as_i64().unwrap()
}
