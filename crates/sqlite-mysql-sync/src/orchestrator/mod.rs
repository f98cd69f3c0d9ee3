//! Sync orchestrator - main workflow coordinator.
//!
//! A run lists the source tables, applies the include/exclude filters, and
//! then synchronizes each table independently. A failing table is rolled back
//! and recorded; it never stops the run.

mod result;

pub use result::{HealthCheckResult, MigrationOutcome, MigrationResult, TablePlan};

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::{Config, MigrationConfig};
use crate::core::schema::TableSchema;
use crate::core::traits::{SourceReader, TargetWriter};
use crate::drivers::{MysqlDialect, MysqlWriter, SqliteReader};
use crate::error::{MigrateError, Result};
use crate::keys::KeyResolver;
use crate::sync::TableSynchronizer;

/// Sync orchestrator.
pub struct Orchestrator {
    migration: MigrationConfig,
    source: Arc<dyn SourceReader>,
    target: Arc<dyn TargetWriter>,
    keys: Arc<KeyResolver>,
}

impl Orchestrator {
    /// Connect to both stores. A store that cannot be opened aborts here with
    /// a `Connection` error, before any table is touched.
    pub async fn new(config: Config) -> Result<Self> {
        let workers = config.migration.get_workers();
        let source = SqliteReader::new(&config.source, workers + 1).await?;

        let max_conns = config.migration.get_max_target_connections();
        let target = MysqlWriter::new(&config.target, max_conns).await?;

        Ok(Self::with_stores(
            config.migration,
            Arc::new(source),
            Arc::new(target),
        ))
    }

    /// Build an orchestrator over already opened stores.
    pub fn with_stores(
        migration: MigrationConfig,
        source: Arc<dyn SourceReader>,
        target: Arc<dyn TargetWriter>,
    ) -> Self {
        let keys = KeyResolver::new(migration.key_overrides.clone());
        Self {
            migration,
            source,
            target,
            keys: Arc::new(keys),
        }
    }

    /// Replace the key resolver.
    pub fn with_key_resolver(mut self, keys: KeyResolver) -> Self {
        self.keys = Arc::new(keys);
        self
    }

    /// Run the sync.
    ///
    /// With `dry_run` set, tables are introspected and keys resolved but the
    /// target is never written.
    pub async fn run(&self, cancel: CancellationToken, dry_run: bool) -> Result<MigrationResult> {
        let started_at = Utc::now();
        let run_id = uuid::Uuid::new_v4().to_string();

        info!("Starting sync run: {}", run_id);

        let tables = self.selected_tables().await?;
        let workers = self.migration.get_workers();
        info!(
            "Syncing {} tables from {} to {} with {} workers",
            tables.len(),
            self.source.db_type(),
            self.target.db_type(),
            workers
        );

        let synchronizer = Arc::new(
            TableSynchronizer::new(self.source.clone(), self.target.clone()).with_batching(
                self.migration.get_chunk_size(),
                self.migration.get_read_ahead_buffers(),
            ),
        );
        let worker = Arc::new(TableWorker {
            source: self.source.clone(),
            keys: self.keys.clone(),
            synchronizer,
            dry_run,
        });

        let semaphore = Arc::new(Semaphore::new(workers));
        let mut handles = Vec::with_capacity(tables.len());
        let mut cancelled = false;

        for table_name in &tables {
            let permit = tokio::select! {
                permit = semaphore.clone().acquire_owned() => {
                    permit.map_err(|_| MigrateError::Cancelled)?
                }
                _ = cancel.cancelled() => {
                    cancelled = true;
                    break;
                }
            };
            if cancel.is_cancelled() {
                cancelled = true;
                break;
            }

            let worker = worker.clone();
            let name = table_name.clone();
            let handle = tokio::spawn(async move {
                let _permit = permit;
                worker.process(&name).await
            });
            handles.push((table_name.clone(), handle));
        }

        if cancelled {
            info!("Cancellation requested, no new tables will be started");
        }

        let mut outcomes = Vec::with_capacity(handles.len());
        for (table_name, handle) in handles {
            match handle.await {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => {
                    error!("Task for {} panicked: {}", table_name, e);
                    let mut outcome = MigrationOutcome::new(&table_name);
                    outcome.error = Some(format!("task panicked: {}", e));
                    outcomes.push(outcome);
                }
            }
        }

        let status = if cancelled {
            "cancelled"
        } else if outcomes.iter().any(MigrationOutcome::is_failed) {
            "completed_with_errors"
        } else if dry_run {
            "dry_run"
        } else {
            "completed"
        };

        let result =
            MigrationResult::from_outcomes(run_id, status, started_at, tables.len(), outcomes);

        info!(
            "Sync run {} {}: {} synced, {} skipped, {} failed ({} inserted, {} updated, {} unchanged)",
            result.run_id,
            result.status,
            result.tables_success,
            result.tables_skipped,
            result.tables_failed,
            result.rows_inserted,
            result.rows_updated,
            result.rows_unchanged
        );
        if result.has_errors() {
            warn!("Failed tables: {:?}", result.failed_tables);
        }

        Ok(result)
    }

    /// Describe what a run would do without touching the target.
    pub async fn plan(&self) -> Result<Vec<TablePlan>> {
        let dialect = MysqlDialect::new();
        let mut plans = Vec::new();

        for table_name in self.selected_tables().await? {
            let columns = self.source.describe_table(&table_name).await?;
            let schema = TableSchema::build(&table_name, columns, &self.keys);

            let (ddl, skip_reason) = if schema.columns.is_empty() {
                (None, Some("table has no columns".to_string()))
            } else if !schema.is_syncable() {
                (None, Some("no unique key found".to_string()))
            } else {
                (Some(dialect.create_table_sql(&schema)?), None)
            };

            plans.push(TablePlan {
                schema,
                ddl,
                skip_reason,
            });
        }

        Ok(plans)
    }

    /// Compare source and target row counts for every eligible table.
    pub async fn validate(&self) -> Result<BTreeMap<String, (i64, i64, bool)>> {
        let mut results = BTreeMap::new();

        for table_name in self.selected_tables().await? {
            let columns = self.source.describe_table(&table_name).await?;
            let schema = TableSchema::build(&table_name, columns, &self.keys);
            if !schema.is_syncable() {
                debug!("{}: skipped (no unique key)", table_name);
                continue;
            }

            let source_count = self.source.get_row_count(&table_name).await?;
            let target_count = if self.target.table_exists(&table_name).await? {
                self.target.get_row_count(&table_name).await?
            } else {
                0
            };

            let matches = source_count == target_count;
            if matches {
                info!("{}: {} rows (match)", table_name, source_count);
            } else {
                warn!(
                    "{}: source={} target={} (MISMATCH)",
                    table_name, source_count, target_count
                );
            }
            results.insert(table_name, (source_count, target_count, matches));
        }

        Ok(results)
    }

    /// Ping both stores.
    pub async fn health_check(&self) -> Result<HealthCheckResult> {
        let start = Instant::now();
        let source = self.source.test_connection().await;
        let source_latency_ms = start.elapsed().as_millis() as u64;

        let start = Instant::now();
        let target = self.target.test_connection().await;
        let target_latency_ms = start.elapsed().as_millis() as u64;

        Ok(HealthCheckResult {
            healthy: source.is_ok() && target.is_ok(),
            source_connected: source.is_ok(),
            source_latency_ms,
            source_error: source.err().map(|e| e.to_string()),
            target_connected: target.is_ok(),
            target_latency_ms,
            target_error: target.err().map(|e| e.to_string()),
        })
    }

    /// Close both connection pools.
    pub async fn close(&self) {
        self.source.close().await;
        self.target.close().await;
    }

    async fn selected_tables(&self) -> Result<Vec<String>> {
        let tables = self.source.list_tables().await?;
        let total = tables.len();
        let selected: Vec<String> = tables
            .into_iter()
            .filter(|t| self.migration.includes_table(t))
            .collect();
        if selected.len() < total {
            debug!("{} of {} tables excluded by filters", total - selected.len(), total);
        }
        Ok(selected)
    }
}

/// Shared state for processing one table inside a spawned task.
struct TableWorker {
    source: Arc<dyn SourceReader>,
    keys: Arc<KeyResolver>,
    synchronizer: Arc<TableSynchronizer>,
    dry_run: bool,
}

impl TableWorker {
    /// Process one table. Never fails: errors end up on the outcome.
    async fn process(&self, table_name: &str) -> MigrationOutcome {
        let start = Instant::now();
        let mut outcome = MigrationOutcome::new(table_name);

        info!("Syncing table: {}", table_name);
        if let Err(e) = self.sync(table_name, &mut outcome).await {
            error!("Error syncing table {}: {}", table_name, e);
            outcome.error = Some(e.to_string());
        }

        outcome.duration_ms = start.elapsed().as_millis() as u64;
        outcome
    }

    async fn sync(&self, table_name: &str, outcome: &mut MigrationOutcome) -> Result<()> {
        let columns = self.source.describe_table(table_name).await?;
        let schema = TableSchema::build(table_name, columns, &self.keys);

        let Some(key) = schema.unique_key.clone() else {
            warn!("Skipping table {} (no unique key found)", table_name);
            outcome.skipped = true;
            return Ok(());
        };
        info!("Using unique column for {}: {}", table_name, key);
        outcome.unique_key = Some(key);

        if self.dry_run {
            let ddl = MysqlDialect::new().create_table_sql(&schema)?;
            info!("[dry run] {}: {}", table_name, ddl);
            return Ok(());
        }

        let stats = self.synchronizer.sync_table(&schema).await?;
        outcome.apply(stats);

        info!(
            "Table {} sync completed: {} rows inserted, {} rows updated, {} unchanged, {} null keys",
            table_name, stats.inserted, stats.updated, stats.unchanged, stats.null_keys
        );
        Ok(())
    }
}
