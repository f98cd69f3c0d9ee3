//! MySQL/MariaDB SQL dialect.
//!
//! Builds the statements the writer needs: keyed `CREATE TABLE IF NOT EXISTS`,
//! single-row `INSERT ... ON DUPLICATE KEY UPDATE`, and catalog queries.

use crate::core::identifier::quote_mysql;
use crate::core::schema::TableSchema;
use crate::error::{MigrateError, Result};

/// Prefix length used when a TEXT or BLOB column carries the unique index.
const INDEX_PREFIX_LENGTH: usize = 255;

/// MySQL/MariaDB dialect implementation.
#[derive(Debug, Clone, Default)]
pub struct MysqlDialect;

impl MysqlDialect {
    /// Create a new MySQL dialect instance.
    pub fn new() -> Self {
        Self
    }

    pub fn name(&self) -> &str {
        "mysql"
    }

    /// `CREATE TABLE IF NOT EXISTS` with every column in declaration order and
    /// a unique constraint on the key column.
    pub fn create_table_sql(&self, table: &TableSchema) -> Result<String> {
        let key = table.key_column().ok_or_else(|| {
            MigrateError::SchemaExtraction(format!("table {} has no unique key", table.name))
        })?;

        let mut defs = Vec::with_capacity(table.columns.len() + 1);
        for col in &table.columns {
            defs.push(format!("{} {}", quote_mysql(&col.name)?, col.target_type));
        }

        let key_ref = if key.target_type.needs_index_prefix() {
            format!("{}({})", quote_mysql(&key.name)?, INDEX_PREFIX_LENGTH)
        } else {
            quote_mysql(&key.name)?
        };
        defs.push(format!("UNIQUE ({})", key_ref));

        // Binary collation: keys compare byte for byte, as they do in SQLite.
        Ok(format!(
            "CREATE TABLE IF NOT EXISTS {} ({}) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4 COLLATE=utf8mb4_bin",
            quote_mysql(&table.name)?,
            defs.join(", ")
        ))
    }

    /// Single-row upsert that overwrites every non-key column on key conflict.
    ///
    /// A table whose only column is the key gets a self-assignment so the
    /// statement stays valid and reports zero affected rows on a repeat.
    pub fn upsert_sql(&self, table: &TableSchema) -> Result<String> {
        let key = table.unique_key.as_deref().ok_or_else(|| {
            MigrateError::SchemaExtraction(format!("table {} has no unique key", table.name))
        })?;

        let cols = table
            .columns
            .iter()
            .map(|c| quote_mysql(&c.name))
            .collect::<Result<Vec<_>>>()?;
        let placeholders = vec!["?"; cols.len()].join(", ");

        let updates: Vec<String> = table
            .columns
            .iter()
            .zip(&cols)
            .filter(|(c, _)| c.name != key)
            .map(|(_, q)| format!("{} = VALUES({})", q, q))
            .collect();

        let update_set = if updates.is_empty() {
            let key = quote_mysql(key)?;
            format!("{} = {}", key, key)
        } else {
            updates.join(", ")
        };

        Ok(format!(
            "INSERT INTO {} ({}) VALUES ({}) ON DUPLICATE KEY UPDATE {}",
            quote_mysql(&table.name)?,
            cols.join(", "),
            placeholders,
            update_set
        ))
    }

    /// Existence check against the connection's current database. Binds the
    /// table name as its single parameter.
    pub fn table_exists_sql(&self) -> &'static str {
        "SELECT COUNT(*) FROM information_schema.TABLES \
         WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ?"
    }

    pub fn row_count_sql(&self, table: &str) -> Result<String> {
        Ok(format!("SELECT COUNT(*) FROM {}", quote_mysql(table)?))
    }
}
