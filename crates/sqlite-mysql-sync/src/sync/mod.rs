//! Per-table synchronization.
//!
//! [`TableSynchronizer::sync_table`] makes sure the target table exists, then
//! streams every source row into a single target transaction. The table's
//! writes become visible only if every row applied; any failure rolls the
//! whole table back.
//!
//! Rows whose key is NULL are skipped and counted. A MySQL unique index admits
//! any number of NULLs, so upserting them would add a fresh row on every run.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::core::schema::TableSchema;
use crate::core::traits::{ReadOptions, SourceReader, TargetTransaction, TargetWriter, UpsertDisposition};
use crate::error::{MigrateError, Result};

/// Row tallies for one table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStats {
    pub inserted: u64,
    pub updated: u64,
    pub unchanged: u64,

    /// Rows not written because their key value is NULL.
    pub null_keys: u64,
}

impl SyncStats {
    pub fn record(&mut self, disposition: UpsertDisposition) {
        match disposition {
            UpsertDisposition::Inserted => self.inserted += 1,
            UpsertDisposition::Updated => self.updated += 1,
            UpsertDisposition::Unchanged => self.unchanged += 1,
        }
    }

    /// Rows read from the source.
    pub fn rows_seen(&self) -> u64 {
        self.inserted + self.updated + self.unchanged + self.null_keys
    }
}

/// Copies one table from a source reader into a target writer.
pub struct TableSynchronizer {
    source: Arc<dyn SourceReader>,
    target: Arc<dyn TargetWriter>,
    batch_size: usize,
    read_ahead: usize,
}

impl TableSynchronizer {
    pub fn new(source: Arc<dyn SourceReader>, target: Arc<dyn TargetWriter>) -> Self {
        let defaults = ReadOptions::default();
        Self {
            source,
            target,
            batch_size: defaults.batch_size,
            read_ahead: defaults.read_ahead,
        }
    }

    /// Set rows per batch and how many batches the reader may run ahead.
    pub fn with_batching(mut self, batch_size: usize, read_ahead: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self.read_ahead = read_ahead.max(1);
        self
    }

    /// Synchronize one table. The schema must carry a unique key.
    pub async fn sync_table(&self, table: &TableSchema) -> Result<SyncStats> {
        if !table.is_syncable() {
            return Err(MigrateError::transfer(&table.name, "table has no unique key"));
        }

        // DDL commits implicitly in MySQL, so it runs outside the row transaction.
        self.target.ensure_table(table).await?;

        let mut tx = self.target.begin(&table.name).await?;
        match self.apply_rows(table, tx.as_mut()).await {
            Ok(stats) => {
                tx.commit().await?;
                Ok(stats)
            }
            Err(e) => {
                if let Err(rb) = tx.rollback().await {
                    warn!("Rollback of {} failed: {}", table.name, rb);
                }
                Err(e)
            }
        }
    }

    async fn apply_rows(
        &self,
        table: &TableSchema,
        tx: &mut dyn TargetTransaction,
    ) -> Result<SyncStats> {
        let mut rx = self.source.read_table(ReadOptions {
            table: table.name.clone(),
            columns: table.column_names(),
            batch_size: self.batch_size,
            read_ahead: self.read_ahead,
        });

        let width = table.columns.len();
        let key_index = table
            .key_column()
            .and_then(|key| table.columns.iter().position(|c| c.name == key.name))
            .ok_or_else(|| MigrateError::transfer(&table.name, "table has no unique key"))?;
        let mut stats = SyncStats::default();
        let mut row_number: u64 = 0;
        let mut finished = false;

        while let Some(batch) = rx.recv().await {
            let batch = batch?;
            for row in &batch.rows {
                row_number += 1;
                if row.len() != width {
                    return Err(MigrateError::row_apply(
                        &table.name,
                        format!(
                            "row {}: {} values for {} columns",
                            row_number,
                            row.len(),
                            width
                        ),
                    ));
                }

                if row[key_index].is_null() {
                    stats.null_keys += 1;
                    continue;
                }

                let disposition = tx.upsert(table, row).await.map_err(|e| match e {
                    MigrateError::RowApply { table, message } => MigrateError::RowApply {
                        table,
                        message: format!("row {}: {}", row_number, message),
                    },
                    other => other,
                })?;
                stats.record(disposition);
            }

            if batch.is_last {
                finished = true;
                break;
            }
        }

        if !finished {
            return Err(MigrateError::transfer(
                &table.name,
                "source stream ended before the final batch",
            ));
        }

        debug!(
            "{}: {} rows applied ({} inserted, {} updated, {} unchanged)",
            table.name,
            stats.rows_seen(),
            stats.inserted,
            stats.updated,
            stats.unchanged
        );
        if stats.null_keys > 0 {
            warn!(
                "{}: skipped {} rows with a NULL {}",
                table.name,
                stats.null_keys,
                table.columns[key_index].name
            );
        }
        Ok(stats)
    }
}
