//! Run reports: per-table outcomes, the run aggregate, and health checks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::schema::TableSchema;
use crate::error::Result;
use crate::sync::SyncStats;

/// What happened to one table during a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrationOutcome {
    pub table_name: String,

    /// Resolved natural key, if any.
    pub unique_key: Option<String>,

    pub inserted: u64,
    pub updated: u64,
    pub unchanged: u64,

    /// Source rows left out because their key is NULL.
    pub null_keys: u64,

    /// The table was not synchronized because it has no usable key.
    pub skipped: bool,

    /// Error that aborted the table; its writes were rolled back.
    pub error: Option<String>,

    pub duration_ms: u64,
}

impl MigrationOutcome {
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            unique_key: None,
            inserted: 0,
            updated: 0,
            unchanged: 0,
            null_keys: 0,
            skipped: false,
            error: None,
            duration_ms: 0,
        }
    }

    pub fn apply(&mut self, stats: SyncStats) {
        self.inserted = stats.inserted;
        self.updated = stats.updated;
        self.unchanged = stats.unchanged;
        self.null_keys = stats.null_keys;
    }

    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }

    pub fn is_success(&self) -> bool {
        !self.skipped && self.error.is_none()
    }
}

/// Result of a sync run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationResult {
    /// Unique run identifier.
    pub run_id: String,

    /// Final status: completed, completed_with_errors, cancelled or dry_run.
    pub status: String,

    /// Total duration in seconds.
    pub duration_seconds: f64,

    /// When the run started.
    pub started_at: DateTime<Utc>,

    /// When the run completed.
    pub completed_at: DateTime<Utc>,

    /// Tables selected for the run (after filters).
    pub tables_total: usize,

    /// Tables synchronized without error.
    pub tables_success: usize,

    /// Tables skipped for lack of a key.
    pub tables_skipped: usize,

    /// Tables that failed.
    pub tables_failed: usize,

    pub rows_inserted: u64,
    pub rows_updated: u64,
    pub rows_unchanged: u64,
    pub rows_null_key: u64,

    /// List of failed table names.
    pub failed_tables: Vec<String>,

    /// Per-table outcomes in table order.
    pub tables: Vec<MigrationOutcome>,
}

impl MigrationResult {
    /// Aggregate outcomes into a run result.
    pub fn from_outcomes(
        run_id: String,
        status: impl Into<String>,
        started_at: DateTime<Utc>,
        tables_total: usize,
        tables: Vec<MigrationOutcome>,
    ) -> Self {
        let completed_at = Utc::now();
        let duration_seconds = (completed_at - started_at).num_milliseconds() as f64 / 1000.0;

        let failed_tables: Vec<String> = tables
            .iter()
            .filter(|o| o.is_failed())
            .map(|o| o.table_name.clone())
            .collect();

        Self {
            run_id,
            status: status.into(),
            duration_seconds,
            started_at,
            completed_at,
            tables_total,
            tables_success: tables.iter().filter(|o| o.is_success()).count(),
            tables_skipped: tables.iter().filter(|o| o.skipped).count(),
            tables_failed: failed_tables.len(),
            rows_inserted: tables.iter().map(|o| o.inserted).sum(),
            rows_updated: tables.iter().map(|o| o.updated).sum(),
            rows_unchanged: tables.iter().map(|o| o.unchanged).sum(),
            rows_null_key: tables.iter().map(|o| o.null_keys).sum(),
            failed_tables,
            tables,
        }
    }

    /// Whether any table reported an error.
    pub fn has_errors(&self) -> bool {
        self.tables_failed > 0
    }

    /// Look up a table's outcome.
    pub fn outcome(&self, table: &str) -> Option<&MigrationOutcome> {
        self.tables.iter().find(|o| o.table_name == table)
    }

    /// Convert to JSON string.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Planned work for one table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TablePlan {
    pub schema: TableSchema,

    /// Target DDL, when the table is eligible.
    pub ddl: Option<String>,

    /// Why the table would be skipped.
    pub skip_reason: Option<String>,
}

/// Result of a connectivity check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckResult {
    pub healthy: bool,
    pub source_connected: bool,
    pub source_latency_ms: u64,
    pub source_error: Option<String>,
    pub target_connected: bool,
    pub target_latency_ms: u64,
    pub target_error: Option<String>,
}
