//! Schema metadata for tables being synchronized.
//!
//! Schemas are rebuilt from the source on every run; nothing here is cached
//! between runs because the source schema may have evolved.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::keys::KeyResolver;
use crate::typemap::map_type;

/// Target column type inferred from a source declared type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TargetType {
    BigInt,
    Text,
    Float,
    Blob,
}

impl TargetType {
    /// MySQL keyword for this type.
    pub fn as_sql(&self) -> &'static str {
        match self {
            TargetType::BigInt => "BIGINT",
            TargetType::Text => "TEXT",
            TargetType::Float => "FLOAT",
            TargetType::Blob => "BLOB",
        }
    }

    /// Whether MySQL needs a prefix length to index a column of this type.
    pub fn needs_index_prefix(&self) -> bool {
        matches!(self, TargetType::Text | TargetType::Blob)
    }
}

impl fmt::Display for TargetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// A column as declared in the source store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceColumn {
    /// Column name.
    pub name: String,

    /// Declared type string (may be empty: SQLite allows untyped columns).
    pub declared_type: String,
}

impl SourceColumn {
    pub fn new(name: impl Into<String>, declared_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            declared_type: declared_type.into(),
        }
    }
}

/// Column metadata with its mapped target type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    /// Column name.
    pub name: String,

    /// Declared source type string.
    pub source_type: String,

    /// Mapped target type.
    pub target_type: TargetType,
}

impl From<SourceColumn> for ColumnSpec {
    fn from(col: SourceColumn) -> Self {
        let target_type = map_type(&col.declared_type);
        Self {
            name: col.name,
            source_type: col.declared_type,
            target_type,
        }
    }
}

/// Table metadata used by the synchronizer.
///
/// `unique_key`, when set, always names one of `columns`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSchema {
    /// Table name.
    pub name: String,

    /// Columns in declaration order.
    pub columns: Vec<ColumnSpec>,

    /// Natural key used for conflict resolution.
    pub unique_key: Option<String>,
}

impl TableSchema {
    /// Build a schema from introspected columns, mapping types and resolving
    /// the natural key.
    pub fn build(name: impl Into<String>, columns: Vec<SourceColumn>, keys: &KeyResolver) -> Self {
        let name = name.into();
        let columns: Vec<ColumnSpec> = columns.into_iter().map(ColumnSpec::from).collect();
        let unique_key = keys.resolve(&name, &columns);
        Self {
            name,
            columns,
            unique_key,
        }
    }

    /// Column names in declaration order.
    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    /// The key column, if the table has one.
    pub fn key_column(&self) -> Option<&ColumnSpec> {
        let key = self.unique_key.as_deref()?;
        self.columns.iter().find(|c| c.name == key)
    }

    /// Whether the table can be synchronized at all.
    pub fn is_syncable(&self) -> bool {
        self.key_column().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn accounts_columns() -> Vec<SourceColumn> {
        vec![
            SourceColumn::new("id", "INTEGER"),
            SourceColumn::new("name", "TEXT"),
            SourceColumn::new("balance", "REAL"),
        ]
    }

    #[test]
    fn test_build_maps_types_in_order() {
        let schema = TableSchema::build("accounts", accounts_columns(), &KeyResolver::default());

        assert_eq!(schema.column_names(), vec!["id", "name", "balance"]);
        let types: Vec<_> = schema.columns.iter().map(|c| c.target_type).collect();
        assert_eq!(
            types,
            vec![TargetType::BigInt, TargetType::Text, TargetType::Float]
        );
        assert_eq!(schema.unique_key.as_deref(), Some("id"));
        assert!(schema.is_syncable());
    }

    #[test]
    fn test_build_without_key() {
        let columns = vec![SourceColumn::new("name", "TEXT")];
        let schema = TableSchema::build("notes", columns, &KeyResolver::default());
        assert!(schema.unique_key.is_none());
        assert!(schema.key_column().is_none());
        assert!(!schema.is_syncable());
    }

    #[test]
    fn test_build_zero_columns() {
        let schema = TableSchema::build("empty", vec![], &KeyResolver::with_builtins());
        assert!(schema.columns.is_empty());
        assert!(!schema.is_syncable());
    }

    #[test]
    fn test_target_type_display() {
        assert_eq!(TargetType::BigInt.to_string(), "BIGINT");
        assert_eq!(TargetType::Float.as_sql(), "FLOAT");
        assert!(TargetType::Text.needs_index_prefix());
        assert!(!TargetType::BigInt.needs_index_prefix());
    }
}
