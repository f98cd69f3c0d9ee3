//! Natural key resolution.
//!
//! Upserts need one column that identifies "the same logical row" across
//! runs. The resolver is a heuristic, not constraint discovery: it never looks
//! at declared PRIMARY KEY or UNIQUE constraints.
//!
//! Policy, in order:
//!
//! 1. A first column named `id` (any case) is the key.
//! 2. Otherwise the table's entry in the override map, if any.
//! 3. Otherwise no key, and the table is skipped.

use std::collections::BTreeMap;

use tracing::warn;

use crate::core::schema::ColumnSpec;

/// Override map with the tables known to need one.
pub fn builtin_overrides() -> BTreeMap<String, String> {
    BTreeMap::from([("schedules_json_paths".to_string(), "schedule_id".to_string())])
}

/// Resolves the natural key of a table.
///
/// The override map is owned by the resolver and supplied by the caller, so
/// each run (or test) can use its own mapping.
#[derive(Debug, Clone, Default)]
pub struct KeyResolver {
    overrides: BTreeMap<String, String>,
}

impl KeyResolver {
    /// Create a resolver with the given table → key column overrides.
    pub fn new(overrides: BTreeMap<String, String>) -> Self {
        Self { overrides }
    }

    /// Create a resolver with the built-in overrides.
    pub fn with_builtins() -> Self {
        Self::new(builtin_overrides())
    }

    /// Decide the key column for `table_name`.
    ///
    /// Returns the column name as declared in `columns`.
    pub fn resolve(&self, table_name: &str, columns: &[ColumnSpec]) -> Option<String> {
        let first = columns.first()?;
        if first.name.eq_ignore_ascii_case("id") {
            return Some(first.name.clone());
        }

        let wanted = self.overrides.get(table_name)?;
        match columns.iter().find(|c| c.name.eq_ignore_ascii_case(wanted)) {
            Some(col) => Some(col.name.clone()),
            None => {
                warn!(
                    "Key override for {} names column '{}', which the table does not have",
                    table_name, wanted
                );
                None
            }
        }
    }
}
