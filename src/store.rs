//! Record store: the seam between resource handlers and the relational backend.
//! `PgStore` owns one pooled PostgreSQL connection for the lifetime of a request.

use crate::config::{FieldKind, ResourceDefinition};
use crate::error::AppError;
use crate::service::{FilterSet, PageRequest, Record};
use crate::sql::{self, QueryBuf};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::pool::PoolConnection;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row};

/// Generic CRUD against one table per call, described by a resource definition.
/// Each method issues exactly one statement.
#[async_trait]
pub trait RecordStore: Send {
    async fn list(
        &mut self,
        def: &ResourceDefinition,
        filters: &FilterSet,
        page: &PageRequest,
    ) -> Result<Vec<Record>, AppError>;

    async fn count(&mut self, def: &ResourceDefinition, filters: &FilterSet) -> Result<u64, AppError>;

    async fn get(&mut self, def: &ResourceDefinition, id: i64) -> Result<Option<Record>, AppError>;

    /// Insert and return the backend-assigned id.
    async fn insert(&mut self, def: &ResourceDefinition, fields: &Record) -> Result<i64, AppError>;

    /// True when at least one row was affected.
    async fn update(&mut self, def: &ResourceDefinition, id: i64, fields: &Record) -> Result<bool, AppError>;

    /// True when a row was removed.
    async fn delete(&mut self, def: &ResourceDefinition, id: i64) -> Result<bool, AppError>;

    async fn begin(&mut self) -> Result<(), AppError>;

    async fn commit(&mut self) -> Result<(), AppError>;

    async fn rollback(&mut self) -> Result<(), AppError>;
}

/// Hands out one exclusive store handle per request.
#[async_trait]
pub trait StoreProvider: Send + Sync {
    async fn acquire(&self) -> Result<Box<dyn RecordStore>, AppError>;

    /// Cheap liveness check for readiness probes.
    async fn ping(&self) -> Result<(), AppError>;
}

#[async_trait]
impl StoreProvider for PgPool {
    async fn acquire(&self) -> Result<Box<dyn RecordStore>, AppError> {
        let conn = PgPool::acquire(self).await?;
        Ok(Box::new(PgStore::new(conn)))
    }

    async fn ping(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1").execute(self).await?;
        Ok(())
    }
}

pub struct PgStore {
    conn: PoolConnection<Postgres>,
    in_transaction: bool,
}

impl PgStore {
    pub fn new(conn: PoolConnection<Postgres>) -> Self {
        PgStore {
            conn,
            in_transaction: false,
        }
    }

    async fn fetch_all(&mut self, q: &QueryBuf) -> Result<Vec<PgRow>, AppError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let mut query = sqlx::query(&q.sql);
        for p in &q.params {
            query = query.bind(p.clone());
        }
        Ok(query.fetch_all(&mut *self.conn).await?)
    }

    async fn fetch_optional(&mut self, q: &QueryBuf) -> Result<Option<PgRow>, AppError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let mut query = sqlx::query(&q.sql);
        for p in &q.params {
            query = query.bind(p.clone());
        }
        Ok(query.fetch_optional(&mut *self.conn).await?)
    }

    async fn execute(&mut self, q: &QueryBuf) -> Result<u64, AppError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "execute");
        let mut query = sqlx::query(&q.sql);
        for p in &q.params {
            query = query.bind(p.clone());
        }
        Ok(query.execute(&mut *self.conn).await?.rows_affected())
    }

    async fn raw(&mut self, statement: &'static str) -> Result<(), AppError> {
        tracing::debug!(sql = statement, "execute");
        sqlx::query(statement).execute(&mut *self.conn).await?;
        Ok(())
    }
}

impl Drop for PgStore {
    fn drop(&mut self) {
        // An open transaction must not go back to the pool.
        if self.in_transaction {
            tracing::warn!("store dropped inside an open transaction; closing connection");
            self.conn.close_on_drop();
        }
    }
}

#[async_trait]
impl RecordStore for PgStore {
    async fn list(
        &mut self,
        def: &ResourceDefinition,
        filters: &FilterSet,
        page: &PageRequest,
    ) -> Result<Vec<Record>, AppError> {
        let q = sql::select_list(def, filters, page);
        let rows = self.fetch_all(&q).await?;
        rows.iter().map(|r| row_to_record(def, r)).collect()
    }

    async fn count(&mut self, def: &ResourceDefinition, filters: &FilterSet) -> Result<u64, AppError> {
        let q = sql::count(def, filters);
        let row = self
            .fetch_optional(&q)
            .await?
            .ok_or(AppError::Db(sqlx::Error::RowNotFound))?;
        let total: i64 = row.try_get("total")?;
        Ok(total.max(0) as u64)
    }

    async fn get(&mut self, def: &ResourceDefinition, id: i64) -> Result<Option<Record>, AppError> {
        let q = sql::select_by_id(def, id);
        match self.fetch_optional(&q).await? {
            Some(row) => Ok(Some(row_to_record(def, &row)?)),
            None => Ok(None),
        }
    }

    async fn insert(&mut self, def: &ResourceDefinition, fields: &Record) -> Result<i64, AppError> {
        let q = sql::insert(def, fields)?;
        let row = self
            .fetch_optional(&q)
            .await?
            .ok_or(AppError::Db(sqlx::Error::RowNotFound))?;
        Ok(row.try_get::<i64, _>(0)?)
    }

    async fn update(&mut self, def: &ResourceDefinition, id: i64, fields: &Record) -> Result<bool, AppError> {
        let q = sql::update(def, id, fields)?;
        Ok(self.execute(&q).await? > 0)
    }

    async fn delete(&mut self, def: &ResourceDefinition, id: i64) -> Result<bool, AppError> {
        let q = sql::delete(def, id);
        Ok(self.execute(&q).await? > 0)
    }

    async fn begin(&mut self) -> Result<(), AppError> {
        self.raw("BEGIN").await?;
        self.in_transaction = true;
        Ok(())
    }

    async fn commit(&mut self) -> Result<(), AppError> {
        self.raw("COMMIT").await?;
        self.in_transaction = false;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), AppError> {
        self.raw("ROLLBACK").await?;
        self.in_transaction = false;
        Ok(())
    }
}

/// Decode a row by the definition's column kinds. Selected columns are cast to
/// each kind's canonical type, so every cell decodes to exactly one Rust type.
fn row_to_record(def: &ResourceDefinition, row: &PgRow) -> Result<Record, AppError> {
    let mut map = Record::new();
    for (name, kind) in def.columns() {
        let v = match kind {
            FieldKind::Text => row.try_get::<Option<String>, _>(name)?.map(Value::String),
            FieldKind::Integer => row
                .try_get::<Option<i64>, _>(name)?
                .map(|n| Value::Number(n.into())),
            FieldKind::Float => row
                .try_get::<Option<f64>, _>(name)?
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number),
            FieldKind::Boolean => row.try_get::<Option<bool>, _>(name)?.map(Value::Bool),
            FieldKind::Json => row.try_get::<Option<Value>, _>(name)?,
            FieldKind::Timestamp => row
                .try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(name)?
                .map(|d| Value::String(d.to_rfc3339())),
        };
        map.insert(name.to_string(), v.unwrap_or(Value::Null));
    }
    Ok(map)
}
