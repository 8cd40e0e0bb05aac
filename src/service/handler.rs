//! ResourceHandler: one resource's CRUD operations against the record store.
//! Constructed per request around that request's store handle.

use crate::config::{is_timestamp, FieldKind, ResourceDefinition};
use crate::error::AppError;
use crate::sanitize;
use crate::service::{FilterSet, PageRequest, Record, WriteMode};
use crate::store::RecordStore;
use serde_json::Value;
use std::sync::Arc;

pub struct ResourceHandler {
    def: Arc<ResourceDefinition>,
    store: Box<dyn RecordStore>,
}

impl ResourceHandler {
    pub fn new(def: Arc<ResourceDefinition>, store: Box<dyn RecordStore>) -> Self {
        ResourceHandler { def, store }
    }

    pub fn definition(&self) -> &ResourceDefinition {
        &self.def
    }

    /// One page of rows. Filters on unknown columns are dropped; an unknown
    /// `order_by` falls back to the primary key. A filter value the column type
    /// cannot hold is an `InvalidArgument`.
    pub async fn list(&mut self, filters: &FilterSet, page: &PageRequest) -> Result<Vec<Record>, AppError> {
        let filters = self.known_filters(filters)?;
        let mut page = page.clone();
        if !self.def.has_column(&page.order_by) {
            page.order_by = self.def.primary_key.clone();
        }
        self.store.list(&self.def, &filters, &page).await
    }

    pub async fn count(&mut self, filters: &FilterSet) -> Result<u64, AppError> {
        let filters = self.known_filters(filters)?;
        self.store.count(&self.def, &filters).await
    }

    pub async fn get(&mut self, id: i64) -> Result<Record, AppError> {
        check_id(id)?;
        self.store
            .get(&self.def, id)
            .await?
            .ok_or_else(|| AppError::NotFound("Resource".into()))
    }

    /// Sanitize, validate and insert. Returns the store-assigned id.
    pub async fn create(&mut self, fields: Record) -> Result<i64, AppError> {
        let fields = self.prepare(fields, WriteMode::Create)?;
        self.store.insert(&self.def, &fields).await
    }

    /// Returns whether a row was changed.
    pub async fn update(&mut self, id: i64, fields: Record) -> Result<bool, AppError> {
        check_id(id)?;
        let fields = self.prepare(fields, WriteMode::Update)?;
        self.store.update(&self.def, id, &fields).await
    }

    /// Returns whether a row was removed.
    pub async fn delete(&mut self, id: i64) -> Result<bool, AppError> {
        check_id(id)?;
        self.store.delete(&self.def, id).await
    }

    pub async fn begin(&mut self) -> Result<(), AppError> {
        self.store.begin().await
    }

    pub async fn commit(&mut self) -> Result<(), AppError> {
        self.store.commit().await
    }

    pub async fn rollback(&mut self) -> Result<(), AppError> {
        self.store.rollback().await
    }

    fn known_filters(&self, filters: &FilterSet) -> Result<FilterSet, AppError> {
        let mut out = FilterSet::new();
        for (k, v) in filters.iter() {
            let Some(kind) = self.def.kind_of(k) else {
                tracing::debug!(resource = %self.def.name, column = %k, "ignoring filter on unknown column");
                continue;
            };
            if kind.coerce(v).is_none() {
                return Err(AppError::InvalidArgument(format!("Invalid value for filter '{}'", k)));
            }
            out.insert(k, v);
        }
        Ok(out)
    }

    /// Sanitize keys and values, keep writable columns, then run the resource validator.
    fn prepare(&self, fields: Record, mode: WriteMode) -> Result<Record, AppError> {
        let mut cleaned = Record::new();
        for (key, value) in fields {
            let key = sanitize::field_name(&key);
            let Some(kind) = self.def.kind_of(&key).filter(|_| self.def.is_writable(&key)) else {
                continue;
            };
            let value = clean_value(&key, value, kind)?;
            cleaned.insert(key, value);
        }
        if cleaned.is_empty() {
            return Err(AppError::InvalidArgument(match mode {
                WriteMode::Create => "No data provided".into(),
                WriteMode::Update => "No data provided for update".into(),
            }));
        }
        if let Some(validator) = &self.def.validator {
            validator.validate(&cleaned, mode)?;
        }
        Ok(cleaned)
    }
}

fn check_id(id: i64) -> Result<(), AppError> {
    if id <= 0 {
        return Err(AppError::InvalidArgument("Invalid ID".into()));
    }
    Ok(())
}

/// Sanitize a written value and bring it to the column's kind. Numeric and
/// boolean strings are parsed; anything else the column cannot hold is a
/// validation error. Nested arrays/objects are stored as JSON text unless the
/// column itself holds JSON.
fn clean_value(column: &str, value: Value, kind: FieldKind) -> Result<Value, AppError> {
    let invalid = |what: &str| AppError::Validation(format!("{} must be {}", column, what));
    match (kind, value) {
        (_, Value::Null) => Ok(Value::Null),
        (FieldKind::Text, Value::String(s)) => Ok(Value::String(sanitize::clean_text(&s))),
        (FieldKind::Text, v @ (Value::Array(_) | Value::Object(_))) => Ok(Value::String(v.to_string())),
        (FieldKind::Text, v) => Ok(v),
        (FieldKind::Json, Value::String(s)) => Ok(Value::String(sanitize::clean_text(&s))),
        (FieldKind::Json, v) => Ok(v),
        (FieldKind::Integer, Value::Number(n)) => match n.as_i64() {
            Some(i) => Ok(Value::from(i)),
            None => n
                .as_f64()
                .filter(|f| f.fract() == 0.0 && *f >= i64::MIN as f64 && *f < i64::MAX as f64)
                .map(|f| Value::from(f as i64))
                .ok_or_else(|| invalid("an integer")),
        },
        (FieldKind::Integer, Value::String(s)) => FieldKind::Integer
            .coerce(s.trim())
            .ok_or_else(|| invalid("an integer")),
        (FieldKind::Integer, _) => Err(invalid("an integer")),
        (FieldKind::Float, v @ Value::Number(_)) => Ok(v),
        (FieldKind::Float, Value::String(s)) => FieldKind::Float.coerce(s.trim()).ok_or_else(|| invalid("a number")),
        (FieldKind::Float, _) => Err(invalid("a number")),
        (FieldKind::Boolean, v @ Value::Bool(_)) => Ok(v),
        (FieldKind::Boolean, Value::Number(n)) => match n.as_i64() {
            Some(1) => Ok(Value::Bool(true)),
            Some(0) => Ok(Value::Bool(false)),
            _ => Err(invalid("a boolean")),
        },
        (FieldKind::Boolean, Value::String(s)) => FieldKind::Boolean
            .coerce(s.trim())
            .ok_or_else(|| invalid("a boolean")),
        (FieldKind::Boolean, _) => Err(invalid("a boolean")),
        (FieldKind::Timestamp, Value::String(s)) => {
            let s = s.trim();
            if is_timestamp(s) {
                Ok(Value::String(s.to_string()))
            } else {
                Err(invalid("a timestamp"))
            }
        }
        (FieldKind::Timestamp, _) => Err(invalid("a timestamp")),
    }
}
