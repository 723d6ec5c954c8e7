use async_trait::async_trait;

use crate::core::error::StorageError;
use crate::core::row::Row;

/// Fully materialized output of one SQL execution.
#[derive(Debug, Clone, Default)]
pub struct QueryOutput {
    pub rows: Vec<Row>,
    pub total_rows: usize,
}

/// Seam to the relational collaborator. Implementations own connection
/// handling and any safety gating of the statement they are handed.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    async fn execute(&self, sql: &str) -> Result<QueryOutput, StorageError>;
}
