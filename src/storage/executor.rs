use async_trait::async_trait;
use serde_json::Value;
use sqlx::sqlite::SqliteRow;
use sqlx::{Column, Row as _, SqlitePool};
use tracing::debug;

use crate::core::error::StorageError;
use crate::core::executor::{QueryExecutor, QueryOutput};
use crate::core::row::Row;

/// Runs extracted statements against the dataset and materializes every row.
pub struct SqliteExecutor {
    pool: SqlitePool,
}

impl SqliteExecutor {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl QueryExecutor for SqliteExecutor {
    async fn execute(&self, sql: &str) -> Result<QueryOutput, StorageError> {
        validate_select(sql)?;
        debug!(%sql, "executing query");

        let fetched = sqlx::query(sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StorageError::Database(e.to_string()))?;

        let rows: Vec<Row> = fetched.iter().map(row_to_json).collect();
        let total_rows = rows.len();
        Ok(QueryOutput { rows, total_rows })
    }
}

/// Shallow read-only gate: one statement, SELECT, balanced quotes. Anything
/// deeper (table/column existence, semantics) is the engine's job.
fn validate_select(sql: &str) -> Result<(), StorageError> {
    let trimmed = sql.trim().trim_end_matches(';').trim();
    if !trimmed.to_uppercase().starts_with("SELECT") {
        return Err(StorageError::RejectedQuery(
            "only SELECT statements are allowed".into(),
        ));
    }
    if trimmed.contains(';') {
        return Err(StorageError::RejectedQuery(
            "multiple statements are not allowed".into(),
        ));
    }
    if trimmed.matches('\'').count() % 2 != 0 {
        return Err(StorageError::RejectedQuery(
            "unbalanced single quotes".into(),
        ));
    }
    Ok(())
}

/// Decodes a sqlite row into column-keyed JSON by probing the common scalar
/// types in order. NUMERIC columns come back as INTEGER or REAL depending on
/// what was stored, so both are tried before falling back to text.
fn row_to_json(row: &SqliteRow) -> Row {
    let mut out = Row::new();
    for column in row.columns() {
        let idx = column.ordinal();
        let value = if let Ok(v) = row.try_get::<Option<i64>, _>(idx) {
            v.map(Value::from).unwrap_or(Value::Null)
        } else if let Ok(v) = row.try_get::<Option<f64>, _>(idx) {
            v.and_then(serde_json::Number::from_f64)
                .map(Value::Number)
                .unwrap_or(Value::Null)
        } else if let Ok(v) = row.try_get::<Option<String>, _>(idx) {
            v.map(Value::from).unwrap_or(Value::Null)
        } else {
            Value::Null
        };
        out.insert(column.name().to_string(), value);
    }
    out
}
