mod common;

use common::*;
use serde_json::json;
use sql_rest::service::{FilterSet, PageRequest};
use sql_rest::{AppError, ModelRegistry, Record, ResourceHandler, StoreProvider};
use std::sync::Arc;

fn record(v: serde_json::Value) -> Record {
    v.as_object().cloned().unwrap()
}

async fn handler(provider: &MemoryProvider) -> ResourceHandler {
    ResourceHandler::new(Arc::new(product_definition()), provider.acquire().await.unwrap())
}

#[tokio::test]
async fn rollback_discards_writes() {
    let provider = MemoryProvider::new();
    let mut h = handler(&provider).await;

    h.begin().await.unwrap();
    let id = h.create(record(json!({"name": "Temp", "price": 1}))).await.unwrap();
    assert_eq!(h.get(id).await.unwrap()["name"], "Temp");
    h.rollback().await.unwrap();

    assert!(matches!(h.get(id).await, Err(AppError::NotFound(_))));
    assert_eq!(provider.row_count("products"), 0);
}

#[tokio::test]
async fn commit_keeps_writes() {
    let provider = MemoryProvider::new();
    let mut h = handler(&provider).await;

    h.begin().await.unwrap();
    h.create(record(json!({"name": "A", "price": 1}))).await.unwrap();
    h.create(record(json!({"name": "B", "price": 2}))).await.unwrap();
    h.commit().await.unwrap();

    let mut fresh = handler(&provider).await;
    assert_eq!(fresh.count(&FilterSet::new()).await.unwrap(), 2);
    let rows = fresh.list(&FilterSet::new(), &PageRequest::default()).await.unwrap();
    assert_eq!(rows[0]["name"], "A");
}

#[tokio::test]
async fn empty_and_invalid_writes_never_reach_the_store() {
    let provider = MemoryProvider::new();
    let mut h = handler(&provider).await;

    let err = h.create(Record::new()).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidArgument(_)));
    assert_eq!(err.to_string(), "No data provided");

    let err = h.update(1, record(json!({"unknown": 1}))).await.unwrap_err();
    assert_eq!(err.to_string(), "No data provided for update");

    let err = h.create(record(json!({"name": "x", "price": -3}))).await.unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    assert!(matches!(h.get(0).await, Err(AppError::InvalidArgument(_))));
    assert!(matches!(h.delete(-1).await, Err(AppError::InvalidArgument(_))));
    assert_eq!(provider.row_count("products"), 0);
}

#[tokio::test]
async fn update_reports_whether_a_row_changed() {
    let provider = MemoryProvider::new();
    let mut h = handler(&provider).await;
    let id = h.create(record(json!({"name": "Pen", "price": 2}))).await.unwrap();

    assert!(h.update(id, record(json!({"quantity": 9}))).await.unwrap());
    assert!(!h.update(id + 100, record(json!({"quantity": 9}))).await.unwrap());
    assert_eq!(h.get(id).await.unwrap()["quantity"], 9);

    assert!(h.delete(id).await.unwrap());
    assert!(!h.delete(id).await.unwrap());
}

#[tokio::test]
async fn registry_builds_a_fresh_handler_per_request() {
    let provider = MemoryProvider::new();
    let registry: ModelRegistry = registry();
    let entry = registry.resolve("Product").unwrap();

    let mut first = entry.handler(provider.acquire().await.unwrap());
    let id = first.create(record(json!({"name": "Cup", "price": 3}))).await.unwrap();

    let mut second = entry.handler(provider.acquire().await.unwrap());
    assert_eq!(second.get(id).await.unwrap()["name"], "Cup");
    assert_eq!(second.definition().table, "products");
}
