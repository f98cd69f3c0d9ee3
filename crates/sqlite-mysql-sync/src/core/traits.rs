//! Core traits for store-agnostic synchronization.
//!
//! - [`SourceReader`]: introspects and streams rows from the source store
//! - [`TargetWriter`]: creates tables and opens write transactions on the target
//! - [`TargetTransaction`]: applies upserts inside one table's transaction
//!
//! The engine only talks to these traits, so the SQLite and MySQL drivers can
//! be swapped for in-memory doubles in tests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::Result;

use super::schema::{SourceColumn, TableSchema};
use super::value::{Batch, Row};

/// Options for reading rows from a table.
#[derive(Debug, Clone)]
pub struct ReadOptions {
    /// Table name.
    pub table: String,
    /// Columns to read, in the order values must appear in each row.
    pub columns: Vec<String>,
    /// Number of rows per batch.
    pub batch_size: usize,
    /// Number of batches buffered ahead of the writer.
    pub read_ahead: usize,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            table: String::new(),
            columns: Vec::new(),
            batch_size: 1_000,
            read_ahead: 4,
        }
    }
}

/// Read schema and data from the source store.
///
/// # Streaming
///
/// [`read_table`](SourceReader::read_table) returns a channel receiver so
/// reads and writes overlap with bounded memory. The stream is finite and can
/// be restarted by calling `read_table` again.
#[async_trait]
pub trait SourceReader: Send + Sync {
    /// List user tables, sorted by name. Internal catalog tables are excluded.
    async fn list_tables(&self) -> Result<Vec<String>>;

    /// Describe a table's columns in declaration order.
    async fn describe_table(&self, table: &str) -> Result<Vec<SourceColumn>>;

    /// Start streaming rows from a table.
    ///
    /// The receiver yields `Result<Batch>` until a batch with `is_last` set
    /// has been sent or an error occurs.
    fn read_table(&self, opts: ReadOptions) -> mpsc::Receiver<Result<Batch>>;

    /// Get the row count for a table.
    async fn get_row_count(&self, table: &str) -> Result<i64>;

    /// Run a trivial query to prove the store is reachable.
    async fn test_connection(&self) -> Result<()>;

    /// Get the database type identifier (e.g., "sqlite").
    fn db_type(&self) -> &str;

    /// Close the connection pool.
    async fn close(&self);
}

/// Result of applying one row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpsertDisposition {
    /// No row with the key existed; the row was inserted.
    Inserted,
    /// A row with the key existed and its non-key columns were overwritten.
    Updated,
    /// A row with the key existed and already held the incoming values.
    Unchanged,
}

/// Write schema and data to the target store.
#[async_trait]
pub trait TargetWriter: Send + Sync {
    /// Create the table if it does not exist.
    ///
    /// Existing tables are left untouched: no column diffing, no type changes.
    async fn ensure_table(&self, table: &TableSchema) -> Result<()>;

    /// Check if a table exists.
    async fn table_exists(&self, table: &str) -> Result<bool>;

    /// Open a transaction for writing one table's rows.
    async fn begin(&self, table: &str) -> Result<Box<dyn TargetTransaction>>;

    /// Get the row count for a table.
    async fn get_row_count(&self, table: &str) -> Result<i64>;

    /// Run a trivial query to prove the store is reachable.
    async fn test_connection(&self) -> Result<()>;

    /// Get the database type identifier (e.g., "mysql").
    fn db_type(&self) -> &str;

    /// Close the connection pool.
    async fn close(&self);
}

/// An open write transaction on the target.
///
/// Dropping a transaction without committing must discard its writes.
#[async_trait]
pub trait TargetTransaction: Send {
    /// Insert the row, or overwrite the non-key columns of the row that
    /// already holds the same key, as one atomic statement.
    async fn upsert(&mut self, table: &TableSchema, row: &Row) -> Result<UpsertDisposition>;

    /// Commit all writes made in this transaction.
    async fn commit(self: Box<Self>) -> Result<()>;

    /// Discard all writes made in this transaction.
    async fn rollback(self: Box<Self>) -> Result<()>;
}
