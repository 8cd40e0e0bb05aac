//! Per-resource CRUD handling: query parsing, validation, write sanitization.

mod handler;
mod query;
mod validation;

pub use handler::ResourceHandler;
pub use query::*;
pub use validation::{FieldRules, RecordValidator, ValidationRule, WriteMode};

/// One row: column name to JSON-encodable value.
pub type Record = serde_json::Map<String, serde_json::Value>;
