//! PostgreSQL Backend Implementation
//!
//! Implements [`DatabaseTransaction`] over a `sqlx` transaction.

use async_trait::async_trait;
use sqlx::{Column, PgPool, Postgres, Row as SqlxRow, TypeInfo, ValueRef};
use crate::error::{OrmError, OrmResult};
use super::core::*;

/// PostgreSQL transaction implementation
pub struct PostgresTransaction<'c> {
    tx: Option<sqlx::Transaction<'c, Postgres>>,
}

impl<'c> PostgresTransaction<'c> {
    pub fn new(tx: sqlx::Transaction<'c, Postgres>) -> Self {
        Self { tx: Some(tx) }
    }

    fn active(&mut self) -> OrmResult<&mut sqlx::Transaction<'c, Postgres>> {
        self.tx
            .as_mut()
            .ok_or_else(|| OrmError::Transaction("Transaction already completed".to_string()))
    }
}

impl PostgresTransaction<'static> {
    /// Open a transaction on the pool
    pub async fn begin(pool: &PgPool) -> OrmResult<Self> {
        let tx = pool
            .begin()
            .await
            .map_err(|e| OrmError::Transaction(format!("Failed to begin transaction: {}", e)))?;
        Ok(Self::new(tx))
    }
}

type PgQuery<'q> = sqlx::query::Query<'q, Postgres, sqlx::postgres::PgArguments>;

fn build_query<'q>(sql: &'q str, params: &[DatabaseValue]) -> OrmResult<PgQuery<'q>> {
    let mut query = sqlx::query(sql);
    for param in params {
        query = bind_database_value(query, param)?;
    }
    Ok(query)
}

#[async_trait]
impl<'c> DatabaseTransaction for PostgresTransaction<'c> {
    async fn execute(&mut self, sql: &str, params: &[DatabaseValue]) -> OrmResult<u64> {
        let query = build_query(sql, params)?;
        let tx = self.active()?;

        tracing::debug!(sql, params = params.len(), "execute");
        let result = query.execute(&mut **tx).await.map_err(OrmError::from)?;

        Ok(result.rows_affected())
    }

    async fn fetch_all(&mut self, sql: &str, params: &[DatabaseValue]) -> OrmResult<Vec<Box<dyn DatabaseRow>>> {
        let query = build_query(sql, params)?;
        let tx = self.active()?;

        tracing::debug!(sql, params = params.len(), "fetch_all");
        let rows = query.fetch_all(&mut **tx).await.map_err(OrmError::from)?;

        Ok(rows
            .into_iter()
            .map(|row| Box::new(PostgresRow::new(row)) as Box<dyn DatabaseRow>)
            .collect())
    }

    async fn fetch_optional(&mut self, sql: &str, params: &[DatabaseValue]) -> OrmResult<Option<Box<dyn DatabaseRow>>> {
        let query = build_query(sql, params)?;
        let tx = self.active()?;

        tracing::debug!(sql, params = params.len(), "fetch_optional");
        let row = query.fetch_optional(&mut **tx).await.map_err(OrmError::from)?;

        Ok(row.map(|r| Box::new(PostgresRow::new(r)) as Box<dyn DatabaseRow>))
    }

    async fn commit(mut self: Box<Self>) -> OrmResult<()> {
        let tx = self
            .tx
            .take()
            .ok_or_else(|| OrmError::Transaction("Transaction already completed".to_string()))?;

        tx.commit()
            .await
            .map_err(|e| OrmError::Transaction(format!("Transaction commit failed: {}", e)))
    }

    async fn rollback(mut self: Box<Self>) -> OrmResult<()> {
        let tx = self
            .tx
            .take()
            .ok_or_else(|| OrmError::Transaction("Transaction already completed".to_string()))?;

        tx.rollback()
            .await
            .map_err(|e| OrmError::Transaction(format!("Transaction rollback failed: {}", e)))
    }
}

/// PostgreSQL row implementation
pub struct PostgresRow {
    row: sqlx::postgres::PgRow,
}

impl PostgresRow {
    pub fn new(row: sqlx::postgres::PgRow) -> Self {
        Self { row }
    }
}

impl DatabaseRow for PostgresRow {
    fn get_by_index(&self, index: usize) -> OrmResult<DatabaseValue> {
        postgres_value_to_database_value(&self.row, index)
    }

    fn get_by_name(&self, name: &str) -> OrmResult<DatabaseValue> {
        let index = self
            .row
            .columns()
            .iter()
            .position(|col| col.name() == name)
            .ok_or_else(|| OrmError::Query(format!("Column '{}' not found", name)))?;

        postgres_value_to_database_value(&self.row, index)
    }

    fn column_count(&self) -> usize {
        self.row.len()
    }

    fn column_names(&self) -> Vec<String> {
        self.row.columns().iter().map(|col| col.name().to_string()).collect()
    }
}

/// Bind a DatabaseValue to a sqlx query
fn bind_database_value<'q>(query: PgQuery<'q>, value: &DatabaseValue) -> OrmResult<PgQuery<'q>> {
    match value {
        DatabaseValue::Null => Ok(query.bind(Option::<String>::None)),
        DatabaseValue::Bool(b) => Ok(query.bind(*b)),
        DatabaseValue::Int32(i) => Ok(query.bind(*i)),
        DatabaseValue::Int64(i) => Ok(query.bind(*i)),
        DatabaseValue::Float32(f) => Ok(query.bind(*f)),
        DatabaseValue::Float64(f) => Ok(query.bind(*f)),
        DatabaseValue::String(s) => Ok(query.bind(s.clone())),
        DatabaseValue::Bytes(b) => Ok(query.bind(b.clone())),
        DatabaseValue::Uuid(u) => Ok(query.bind(*u)),
        DatabaseValue::DateTime(dt) => Ok(query.bind(*dt)),
        DatabaseValue::Date(d) => Ok(query.bind(*d)),
        DatabaseValue::Time(t) => Ok(query.bind(*t)),
        DatabaseValue::Json(j) => Ok(query.bind(j.clone())),
        DatabaseValue::Array(_) => Err(OrmError::Query(
            "Array parameters are expanded into IN lists and cannot be bound directly".to_string(),
        )),
    }
}

fn decode<'r, T>(row: &'r sqlx::postgres::PgRow, index: usize, kind: &str) -> OrmResult<T>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    row.try_get(index)
        .map_err(|e| OrmError::Query(format!("Failed to get {} value: {}", kind, e)))
}

/// Convert a PostgreSQL column value to DatabaseValue
fn postgres_value_to_database_value(row: &sqlx::postgres::PgRow, index: usize) -> OrmResult<DatabaseValue> {
    let raw = row
        .try_get_raw(index)
        .map_err(|e| OrmError::Query(format!("Failed to read column {}: {}", index, e)))?;
    if raw.is_null() {
        return Ok(DatabaseValue::Null);
    }

    let type_name = row.columns()[index].type_info().name().to_string();

    match type_name.as_str() {
        "BOOL" => Ok(DatabaseValue::Bool(decode(row, index, "bool")?)),
        "INT2" => Ok(DatabaseValue::Int32(decode::<i16>(row, index, "int16")? as i32)),
        "INT4" => Ok(DatabaseValue::Int32(decode(row, index, "int32")?)),
        "INT8" => Ok(DatabaseValue::Int64(decode(row, index, "int64")?)),
        "FLOAT4" => Ok(DatabaseValue::Float32(decode(row, index, "float32")?)),
        "FLOAT8" => Ok(DatabaseValue::Float64(decode(row, index, "float64")?)),
        "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" => Ok(DatabaseValue::String(decode(row, index, "string")?)),
        "BYTEA" => Ok(DatabaseValue::Bytes(decode(row, index, "bytes")?)),
        "UUID" => Ok(DatabaseValue::Uuid(decode(row, index, "UUID")?)),
        "TIMESTAMPTZ" => Ok(DatabaseValue::DateTime(decode(row, index, "datetime")?)),
        "TIMESTAMP" => {
            let naive: chrono::NaiveDateTime = decode(row, index, "timestamp")?;
            Ok(DatabaseValue::DateTime(chrono::TimeZone::from_utc_datetime(&chrono::Utc, &naive)))
        }
        "DATE" => Ok(DatabaseValue::Date(decode(row, index, "date")?)),
        "TIME" => Ok(DatabaseValue::Time(decode(row, index, "time")?)),
        "JSON" | "JSONB" => Ok(DatabaseValue::Json(decode(row, index, "JSON")?)),
        _ => {
            // Enums and other text-encoded types
            let value: String = row.try_get_unchecked(index).map_err(|e| {
                OrmError::Query(format!(
                    "Failed to get value as string for type '{}': {}",
                    type_name, e
                ))
            })?;
            Ok(DatabaseValue::String(value))
        }
    }
}
