//! Builds parameterized SELECT, COUNT, INSERT, UPDATE, DELETE for a resource.
//! Identifiers come from the resource definition only; values are always parameters.

use crate::config::{is_identifier, FieldKind, ResourceDefinition};
use crate::error::AppError;
use crate::service::{FilterSet, PageRequest, Record};
use crate::sql::PgBindValue;
use serde_json::Value;

/// Quote identifier for PostgreSQL.
fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

#[derive(Debug, Default)]
pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<PgBindValue>,
}

impl QueryBuf {
    fn new() -> Self {
        Self::default()
    }

    /// Placeholder for a value cast to the column's canonical type. NULL is
    /// written literally so it never needs a parameter type. JSON columns bind
    /// the whole value as jsonb, so a bare string is stored as a JSON string.
    fn placeholder(&mut self, v: &Value, kind: FieldKind) -> String {
        if v.is_null() {
            return "NULL".into();
        }
        self.params.push(match kind {
            FieldKind::Json => PgBindValue::Json(v.clone()),
            _ => PgBindValue::from_json(v),
        });
        format!("${}::{}", self.params.len(), kind.sql_type())
    }

    fn push_param(&mut self, v: PgBindValue) -> String {
        self.params.push(v);
        format!("${}", self.params.len())
    }
}

/// Every column cast to its canonical type so rows decode by kind.
fn select_column_list(def: &ResourceDefinition) -> String {
    def.columns()
        .into_iter()
        .map(|(name, kind)| format!("{q}::{} AS {q}", kind.sql_type(), q = quoted(name)))
        .collect::<Vec<_>>()
        .join(", ")
}

fn where_clause(q: &mut QueryBuf, def: &ResourceDefinition, filters: &FilterSet) -> String {
    let mut parts = Vec::new();
    for (col, raw) in filters.iter() {
        let Some(kind) = def.kind_of(col).filter(|_| is_identifier(col)) else {
            continue;
        };
        let Some(value) = kind.coerce(raw) else {
            continue;
        };
        let ph = q.placeholder(&value, kind);
        parts.push(format!("{} = {}", quoted(col), ph));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", parts.join(" AND "))
    }
}

/// Column to order by: the requested one when the resource has it, else the primary key.
fn order_column<'a>(def: &'a ResourceDefinition, page: &'a PageRequest) -> &'a str {
    if is_identifier(&page.order_by) && def.has_column(&page.order_by) {
        &page.order_by
    } else {
        &def.primary_key
    }
}

/// SELECT ... [WHERE f1 = $1 AND ...] ORDER BY <col> <dir> LIMIT $n OFFSET $m.
pub fn select_list(def: &ResourceDefinition, filters: &FilterSet, page: &PageRequest) -> QueryBuf {
    let mut q = QueryBuf::new();
    let where_sql = where_clause(&mut q, def, filters);
    let limit = q.push_param(PgBindValue::I64(i64::try_from(page.per_page).unwrap_or(i64::MAX)));
    let offset = q.push_param(PgBindValue::I64(i64::try_from(page.offset()).unwrap_or(i64::MAX)));
    q.sql = format!(
        "SELECT {} FROM {}{} ORDER BY {} {} LIMIT {} OFFSET {}",
        select_column_list(def),
        quoted(&def.table),
        where_sql,
        quoted(order_column(def, page)),
        page.order.as_sql(),
        limit,
        offset
    );
    q
}

/// SELECT COUNT(*) with the same WHERE construction as `select_list`.
pub fn count(def: &ResourceDefinition, filters: &FilterSet) -> QueryBuf {
    let mut q = QueryBuf::new();
    let where_sql = where_clause(&mut q, def, filters);
    q.sql = format!("SELECT COUNT(*) AS \"total\" FROM {}{}", quoted(&def.table), where_sql);
    q
}

pub fn select_by_id(def: &ResourceDefinition, id: i64) -> QueryBuf {
    let mut q = QueryBuf::new();
    let ph = q.push_param(PgBindValue::I64(id));
    q.sql = format!(
        "SELECT {} FROM {} WHERE {} = {}",
        select_column_list(def),
        quoted(&def.table),
        quoted(&def.primary_key),
        ph
    );
    q
}

/// Writable columns present in `fields`, in definition order.
fn write_columns<'a>(def: &'a ResourceDefinition, fields: &'a Record) -> Vec<(&'a str, FieldKind, &'a Value)> {
    def.writable_fields()
        .filter(|f| is_identifier(&f.name))
        .filter_map(|f| fields.get(&f.name).map(|v| (f.name.as_str(), f.kind, v)))
        .collect()
}

/// INSERT ... RETURNING <pk>.
pub fn insert(def: &ResourceDefinition, fields: &Record) -> Result<QueryBuf, AppError> {
    let cols = write_columns(def, fields);
    if cols.is_empty() {
        return Err(AppError::InvalidArgument("No data provided".into()));
    }
    let mut q = QueryBuf::new();
    let mut names = Vec::with_capacity(cols.len());
    let mut placeholders = Vec::with_capacity(cols.len());
    for (name, kind, v) in cols {
        names.push(quoted(name));
        placeholders.push(q.placeholder(v, kind));
    }
    q.sql = format!(
        "INSERT INTO {} ({}) VALUES ({}) RETURNING {}::int8",
        quoted(&def.table),
        names.join(", "),
        placeholders.join(", "),
        quoted(&def.primary_key)
    );
    Ok(q)
}

/// UPDATE ... SET only the columns present in `fields`.
pub fn update(def: &ResourceDefinition, id: i64, fields: &Record) -> Result<QueryBuf, AppError> {
    let cols = write_columns(def, fields);
    if cols.is_empty() {
        return Err(AppError::InvalidArgument("No data provided for update".into()));
    }
    let mut q = QueryBuf::new();
    let sets: Vec<String> = cols
        .into_iter()
        .map(|(name, kind, v)| format!("{} = {}", quoted(name), q.placeholder(v, kind)))
        .collect();
    let id_ph = q.push_param(PgBindValue::I64(id));
    q.sql = format!(
        "UPDATE {} SET {} WHERE {} = {}",
        quoted(&def.table),
        sets.join(", "),
        quoted(&def.primary_key),
        id_ph
    );
    Ok(q)
}

pub fn delete(def: &ResourceDefinition, id: i64) -> QueryBuf {
    let mut q = QueryBuf::new();
    let ph = q.push_param(PgBindValue::I64(id));
    q.sql = format!(
        "DELETE FROM {} WHERE {} = {}",
        quoted(&def.table),
        quoted(&def.primary_key),
        ph
    );
    q
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::SortOrder;
    use serde_json::json;

    fn product() -> ResourceDefinition {
        ResourceDefinition::new("product", "products")
            .field("name", FieldKind::Text)
            .field("price", FieldKind::Float)
            .field("quantity", FieldKind::Integer)
            .read_only("created_at", FieldKind::Timestamp)
    }

    fn document() -> ResourceDefinition {
        ResourceDefinition::new("document", "documents").field("meta", FieldKind::Json)
    }

    fn record(v: Value) -> Record {
        v.as_object().cloned().unwrap()
    }

    const COLS: &str = "\"id\"::int8 AS \"id\", \"name\"::text AS \"name\", \"price\"::float8 AS \"price\", \
\"quantity\"::int8 AS \"quantity\", \"created_at\"::timestamptz AS \"created_at\"";

    #[test]
    fn list_without_filters_orders_by_primary_key() {
        let q = select_list(&product(), &FilterSet::new(), &PageRequest::default());
        assert_eq!(
            q.sql,
            format!("SELECT {} FROM \"products\" ORDER BY \"id\" ASC LIMIT $1 OFFSET $2", COLS)
        );
        assert_eq!(q.params, vec![PgBindValue::I64(10), PgBindValue::I64(0)]);
    }

    #[test]
    fn list_binds_filters_and_pages() {
        let mut filters = FilterSet::new();
        filters.insert("name", "Chair");
        filters.insert("quantity", "2");
        let page = PageRequest {
            page: 3,
            per_page: 5,
            order_by: "price".into(),
            order: SortOrder::Desc,
        };
        let q = select_list(&product(), &filters, &page);
        assert!(q.sql.ends_with(
            "FROM \"products\" WHERE \"name\" = $1::text AND \"quantity\" = $2::int8 \
ORDER BY \"price\" DESC LIMIT $3 OFFSET $4"
        ));
        assert_eq!(
            q.params,
            vec![
                PgBindValue::String("Chair".into()),
                PgBindValue::I64(2),
                PgBindValue::I64(5),
                PgBindValue::I64(10),
            ]
        );
    }

    #[test]
    fn hostile_filter_keys_never_reach_sql() {
        let mut filters = FilterSet::new();
        filters.insert("name; DROP TABLE x", "1");
        let page = PageRequest {
            order_by: "name; DROP TABLE x".into(),
            ..Default::default()
        };
        let q = select_list(&product(), &filters, &page);
        assert!(!q.sql.contains("DROP"));
        assert!(!q.sql.contains("WHERE"));
        assert!(q.sql.contains("ORDER BY \"id\" ASC"));

        let q = count(&product(), &filters);
        assert_eq!(q.sql, "SELECT COUNT(*) AS \"total\" FROM \"products\"");
        assert!(q.params.is_empty());
    }

    #[test]
    fn count_shares_where_clause() {
        let mut filters = FilterSet::new();
        filters.insert("price", "9.5");
        let q = count(&product(), &filters);
        assert_eq!(
            q.sql,
            "SELECT COUNT(*) AS \"total\" FROM \"products\" WHERE \"price\" = $1::float8"
        );
        assert_eq!(q.params, vec![PgBindValue::F64(9.5)]);
    }

    #[test]
    fn filters_that_do_not_fit_the_column_type_are_skipped() {
        let mut filters = FilterSet::new();
        filters.insert("quantity", "abc");
        filters.insert("price", "cheap");
        filters.insert("created_at", "yesterday");
        filters.insert("name", "Chair");
        let q = count(&product(), &filters);
        assert_eq!(
            q.sql,
            "SELECT COUNT(*) AS \"total\" FROM \"products\" WHERE \"name\" = $1::text"
        );
        assert_eq!(q.params, vec![PgBindValue::String("Chair".into())]);
    }

    #[test]
    fn out_of_range_offsets_saturate() {
        let page = PageRequest {
            page: u64::MAX,
            per_page: 100,
            ..Default::default()
        };
        let q = select_list(&product(), &FilterSet::new(), &page);
        assert_eq!(q.params, vec![PgBindValue::I64(100), PgBindValue::I64(i64::MAX)]);
    }

    #[test]
    fn json_columns_bind_whole_values_as_jsonb() {
        let q = insert(&document(), &record(json!({"meta": "hello"}))).unwrap();
        assert_eq!(
            q.sql,
            "INSERT INTO \"documents\" (\"meta\") VALUES ($1::jsonb) RETURNING \"id\"::int8"
        );
        assert_eq!(q.params, vec![PgBindValue::Json(json!("hello"))]);

        let q = update(&document(), 2, &record(json!({"meta": 7}))).unwrap();
        assert_eq!(q.params, vec![PgBindValue::Json(json!(7)), PgBindValue::I64(2)]);

        let mut filters = FilterSet::new();
        filters.insert("meta", "{\"k\":1}");
        let q = count(&document(), &filters);
        assert!(q.sql.ends_with("WHERE \"meta\" = $1::jsonb"));
        assert_eq!(q.params, vec![PgBindValue::Json(json!({"k": 1}))]);
    }

    #[test]
    fn insert_uses_writable_columns_in_definition_order() {
        let fields = record(json!({"quantity": 3, "name": "Widget", "price": 9.99, "created_at": "x", "id": 4}));
        let q = insert(&product(), &fields).unwrap();
        assert_eq!(
            q.sql,
            "INSERT INTO \"products\" (\"name\", \"price\", \"quantity\") \
VALUES ($1::text, $2::float8, $3::int8) RETURNING \"id\"::int8"
        );
        assert_eq!(
            q.params,
            vec![
                PgBindValue::String("Widget".into()),
                PgBindValue::F64(9.99),
                PgBindValue::I64(3),
            ]
        );
    }

    #[test]
    fn nulls_are_literal() {
        let q = insert(&product(), &record(json!({"name": "A", "price": null}))).unwrap();
        assert!(q.sql.contains("VALUES ($1::text, NULL)"));
        assert_eq!(q.params.len(), 1);
    }

    #[test]
    fn empty_writes_are_rejected() {
        assert!(matches!(
            insert(&product(), &Record::new()),
            Err(AppError::InvalidArgument(_))
        ));
        assert!(matches!(
            update(&product(), 1, &record(json!({"unknown": 1}))),
            Err(AppError::InvalidArgument(_))
        ));
    }

    #[test]
    fn update_and_delete_by_id() {
        let q = update(&product(), 7, &record(json!({"price": 39.5}))).unwrap();
        assert_eq!(q.sql, "UPDATE \"products\" SET \"price\" = $1::float8 WHERE \"id\" = $2");
        assert_eq!(q.params, vec![PgBindValue::F64(39.5), PgBindValue::I64(7)]);

        let q = delete(&product(), 7);
        assert_eq!(q.sql, "DELETE FROM \"products\" WHERE \"id\" = $1");

        let q = select_by_id(&product(), 7);
        assert_eq!(q.sql, format!("SELECT {} FROM \"products\" WHERE \"id\" = $1", COLS));
    }
}
