//! EventStore trait definition.
//!
//! This trait abstracts the wide-column store so the pipeline can run against
//! a real CQL cluster or the in-process `MemoryEventStore`.

use crate::cql_persistence::Table;
use async_trait::async_trait;
use thiserror::Error;

use super::models::{Row, SelectQuery, WriteBatch};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Query error: {0}")]
    Query(String),

    #[error("Batch rejected: {0}")]
    BatchRejected(String),

    #[error("Unconfigured table {0}")]
    UnknownTable(String),

    #[error("Unexpected null in column {0}")]
    UnexpectedNull(String),

    #[error("Unsupported value in column {column}: {detail}")]
    UnsupportedValue { column: String, detail: String },

    #[error("Store session is closed")]
    Closed,
}

/// Trait for wide-column storage backends.
///
/// Table names are qualified with the keyspace the store was created for.
#[cfg_attr(any(test, feature = "mock"), mockall::automock)]
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Creates the keyspace if it does not exist yet.
    async fn ensure_keyspace(&self) -> Result<(), StoreError>;

    /// Creates the table if it does not exist yet.
    async fn ensure_table(&self, table: &'static Table) -> Result<(), StoreError>;

    /// Submits every insert of the batch in one request.
    ///
    /// The batch is not a transaction across partitions: on error some inserts
    /// may still have been applied.
    async fn submit_batch(&self, batch: &WriteBatch) -> Result<(), StoreError>;

    /// Runs an equality lookup, returning the requested columns in order.
    async fn select(&self, query: &SelectQuery) -> Result<Vec<Row>, StoreError>;

    /// Drops the table. Dropping a table that does not exist is an error.
    async fn drop_table(&self, table: &'static Table) -> Result<(), StoreError>;

    /// Releases the session. Calling it more than once is a no-op.
    async fn close(&self) -> Result<(), StoreError>;
}
