//! Resource definitions: one table exposed through the five CRUD endpoints.
//! Declared at startup, immutable afterwards.

use crate::service::RecordValidator;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Column kind. Drives query-string coercion, select-list casts and row decoding.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Integer,
    Float,
    Boolean,
    Json,
    Timestamp,
}

impl FieldKind {
    /// Convert a raw query-string value to the JSON value bound for this column.
    /// `None` when the text is not a valid value of this kind, so it is never
    /// sent to the database under a cast it cannot satisfy.
    pub fn coerce(&self, raw: &str) -> Option<Value> {
        match self {
            FieldKind::Integer => raw.parse::<i64>().ok().map(|n| Value::Number(n.into())),
            FieldKind::Float => raw
                .parse::<f64>()
                .ok()
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number),
            FieldKind::Boolean => {
                if raw.eq_ignore_ascii_case("true") || raw == "1" {
                    Some(Value::Bool(true))
                } else if raw.eq_ignore_ascii_case("false") || raw == "0" {
                    Some(Value::Bool(false))
                } else {
                    None
                }
            }
            FieldKind::Timestamp => is_timestamp(raw).then(|| Value::String(raw.to_string())),
            // Bare words compare against a JSON string.
            FieldKind::Json => Some(serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))),
            FieldKind::Text => Some(Value::String(raw.to_string())),
        }
    }

    /// Canonical PostgreSQL type for this kind. Bound parameters and selected
    /// columns are cast to it so encoding and decoding never guess.
    pub fn sql_type(&self) -> &'static str {
        match self {
            FieldKind::Text => "text",
            FieldKind::Integer => "int8",
            FieldKind::Float => "float8",
            FieldKind::Boolean => "boolean",
            FieldKind::Json => "jsonb",
            FieldKind::Timestamp => "timestamptz",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldDef {
    pub name: String,
    pub kind: FieldKind,
    pub writable: bool,
}

#[derive(Clone)]
pub struct ResourceDefinition {
    /// Lowercase registry name, e.g. "product".
    pub name: String,
    pub table: String,
    /// URL segment, e.g. "products".
    pub path_segment: String,
    pub primary_key: String,
    pub fields: Vec<FieldDef>,
    pub validator: Option<Arc<dyn RecordValidator>>,
}

impl fmt::Debug for ResourceDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceDefinition")
            .field("name", &self.name)
            .field("table", &self.table)
            .field("path_segment", &self.path_segment)
            .field("primary_key", &self.primary_key)
            .field("fields", &self.fields)
            .field("validator", &self.validator.is_some())
            .finish()
    }
}

impl ResourceDefinition {
    /// New definition with primary key `id` and path segment `<name>s`.
    pub fn new(name: &str, table: &str) -> Self {
        let name = name.to_lowercase();
        ResourceDefinition {
            path_segment: format!("{}s", name),
            name,
            table: table.to_string(),
            primary_key: "id".into(),
            fields: Vec::new(),
            validator: None,
        }
    }

    /// Definition named after a Rust type: `ProductModel` becomes "product".
    pub fn for_type<T: ?Sized>(table: &str) -> Self {
        Self::new(&resource_name_from_type(std::any::type_name::<T>()), table)
    }

    pub fn path(mut self, segment: &str) -> Self {
        self.path_segment = segment.to_string();
        self
    }

    pub fn primary_key(mut self, column: &str) -> Self {
        self.primary_key = column.to_string();
        self
    }

    /// Add a writable field.
    pub fn field(mut self, name: &str, kind: FieldKind) -> Self {
        self.fields.push(FieldDef {
            name: name.to_string(),
            kind,
            writable: true,
        });
        self
    }

    /// Add a column that is returned and filterable but never written by the API.
    pub fn read_only(mut self, name: &str, kind: FieldKind) -> Self {
        self.fields.push(FieldDef {
            name: name.to_string(),
            kind,
            writable: false,
        });
        self
    }

    pub fn validator(mut self, validator: impl RecordValidator + 'static) -> Self {
        self.validator = Some(Arc::new(validator));
        self
    }

    pub fn writable_fields(&self) -> impl Iterator<Item = &FieldDef> {
        self.fields.iter().filter(|f| f.writable)
    }

    pub fn is_writable(&self, column: &str) -> bool {
        self.writable_fields().any(|f| f.name == column)
    }

    pub fn has_column(&self, column: &str) -> bool {
        column == self.primary_key || self.fields.iter().any(|f| f.name == column)
    }

    /// Kind of a column; the primary key is always an integer.
    pub fn kind_of(&self, column: &str) -> Option<FieldKind> {
        if column == self.primary_key {
            return Some(FieldKind::Integer);
        }
        self.fields.iter().find(|f| f.name == column).map(|f| f.kind)
    }

    /// Selected columns in order: primary key first, then declared fields.
    pub fn columns(&self) -> Vec<(&str, FieldKind)> {
        std::iter::once((self.primary_key.as_str(), FieldKind::Integer))
            .chain(self.fields.iter().map(|f| (f.name.as_str(), f.kind)))
            .collect()
    }
}

/// Accepts RFC 3339, `YYYY-MM-DD HH:MM:SS[.f]` and `YYYY-MM-DD`, the forms
/// `timestamptz` input takes without ambiguity.
pub fn is_timestamp(raw: &str) -> bool {
    chrono::DateTime::parse_from_rfc3339(raw).is_ok()
        || chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f").is_ok()
        || chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f").is_ok()
        || chrono::NaiveDate::parse_from_str(raw, "%Y-%m-%d").is_ok()
}

/// `my_app::models::ProductModel` -> "product".
pub fn resource_name_from_type(type_name: &str) -> String {
    let short = type_name.rsplit("::").next().unwrap_or(type_name);
    let short = short.strip_suffix("Model").filter(|s| !s.is_empty()).unwrap_or(short);
    short.to_lowercase()
}
