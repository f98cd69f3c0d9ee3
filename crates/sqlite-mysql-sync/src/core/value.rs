//! SQL value types for store-agnostic row transfer.
//!
//! SQLite values are dynamically typed: the storage class of a cell is only
//! known once it has been read. [`SqlValue`] closes that set into a tagged
//! enum so every binding site matches all five storage classes.

use serde::{Deserialize, Serialize};

/// A single cell read from the source store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SqlValue {
    /// SQL NULL. Passed through to the target untransformed.
    Null,

    /// 64-bit signed integer (SQLite INTEGER storage class).
    Integer(i64),

    /// 64-bit floating point (SQLite REAL storage class).
    Real(f64),

    /// UTF-8 text (SQLite TEXT storage class).
    Text(String),

    /// Raw bytes (SQLite BLOB storage class).
    Blob(Vec<u8>),
}

impl SqlValue {
    /// Check if this value is NULL.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    /// Name of the storage class, as SQLite reports it.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            SqlValue::Null => "NULL",
            SqlValue::Integer(_) => "INTEGER",
            SqlValue::Real(_) => "REAL",
            SqlValue::Text(_) => "TEXT",
            SqlValue::Blob(_) => "BLOB",
        }
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::Integer(v)
    }
}

impl From<i32> for SqlValue {
    fn from(v: i32) -> Self {
        SqlValue::Integer(i64::from(v))
    }
}

impl From<f64> for SqlValue {
    fn from(v: f64) -> Self {
        SqlValue::Real(v)
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Text(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_string())
    }
}

impl From<Vec<u8>> for SqlValue {
    fn from(v: Vec<u8>) -> Self {
        SqlValue::Blob(v)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(SqlValue::Null, Into::into)
    }
}

/// One source row: values positionally aligned with the table's columns.
pub type Row = Vec<SqlValue>;

/// A batch of rows for streaming transfer.
///
/// Readers push batches through a bounded channel so that a large table is
/// never fully materialized in memory.
#[derive(Debug, Default)]
pub struct Batch {
    /// Rows in this batch.
    pub rows: Vec<Row>,

    /// Whether this is the final batch for the table.
    pub is_last: bool,
}

impl Batch {
    /// Create a new batch with the given rows.
    pub fn new(rows: Vec<Row>) -> Self {
        Self {
            rows,
            is_last: false,
        }
    }

    /// Create an empty final batch.
    pub fn empty_final() -> Self {
        Self {
            rows: Vec::new(),
            is_last: true,
        }
    }

    /// Mark this as the final batch.
    pub fn mark_final(mut self) -> Self {
        self.is_last = true;
        self
    }

    /// Get the number of rows in this batch.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Check if the batch is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sql_value_is_null() {
        assert!(SqlValue::Null.is_null());
        assert!(!SqlValue::Integer(0).is_null());
        assert!(!SqlValue::Text(String::new()).is_null());
    }

    #[test]
    fn test_from_option() {
        let v: SqlValue = Option::<i64>::None.into();
        assert_eq!(v, SqlValue::Null);

        let v: SqlValue = Some("Alice").into();
        assert_eq!(v, SqlValue::Text("Alice".to_string()));
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(SqlValue::Real(1.5).kind(), "REAL");
        assert_eq!(SqlValue::Blob(vec![0xde, 0xad]).kind(), "BLOB");
    }

    #[test]
    fn test_batch_operations() {
        let batch = Batch::new(vec![
            vec![SqlValue::Integer(1), "a".into()],
            vec![SqlValue::Integer(2), "b".into()],
        ]);

        assert_eq!(batch.len(), 2);
        assert!(!batch.is_empty());
        assert!(!batch.is_last);
        assert!(batch.mark_final().is_last);
        assert!(Batch::empty_final().is_empty());
    }
}
