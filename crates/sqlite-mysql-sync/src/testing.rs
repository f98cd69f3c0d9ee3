//! In-memory source and target stores for engine tests.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::core::schema::{SourceColumn, TableSchema};
use crate::core::traits::{ReadOptions, SourceReader, TargetTransaction, TargetWriter, UpsertDisposition};
use crate::core::value::{Batch, Row, SqlValue};
use crate::error::{MigrateError, Result};

#[derive(Debug, Clone, Default)]
struct SourceTable {
    columns: Vec<SourceColumn>,
    rows: Vec<Row>,
}

/// Source store backed by a map of tables. Clones share state.
#[derive(Clone, Default)]
pub struct MemorySource {
    tables: Arc<Mutex<BTreeMap<String, SourceTable>>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_table(&self, name: &str, columns: &[(&str, &str)], rows: Vec<Row>) {
        let columns = columns
            .iter()
            .map(|(n, t)| SourceColumn::new(*n, *t))
            .collect();
        self.tables
            .lock()
            .unwrap()
            .insert(name.to_string(), SourceTable { columns, rows });
    }

    /// Replace the rows of an existing table.
    pub fn set_rows(&self, name: &str, rows: Vec<Row>) {
        let mut tables = self.tables.lock().unwrap();
        tables.get_mut(name).expect("table exists").rows = rows;
    }
}

#[async_trait]
impl SourceReader for MemorySource {
    async fn list_tables(&self) -> Result<Vec<String>> {
        Ok(self.tables.lock().unwrap().keys().cloned().collect())
    }

    async fn describe_table(&self, table: &str) -> Result<Vec<SourceColumn>> {
        Ok(self
            .tables
            .lock()
            .unwrap()
            .get(table)
            .map(|t| t.columns.clone())
            .unwrap_or_default())
    }

    fn read_table(&self, opts: ReadOptions) -> mpsc::Receiver<Result<Batch>> {
        let (tx, rx) = mpsc::channel(opts.read_ahead.max(1));
        let rows = self
            .tables
            .lock()
            .unwrap()
            .get(&opts.table)
            .map(|t| t.rows.clone());

        tokio::spawn(async move {
            let Some(rows) = rows else {
                let _ = tx
                    .send(Err(MigrateError::SchemaExtraction(format!(
                        "no such table: {}",
                        opts.table
                    ))))
                    .await;
                return;
            };

            let chunks: Vec<Vec<Row>> = rows
                .chunks(opts.batch_size.max(1))
                .map(|c| c.to_vec())
                .collect();
            if chunks.is_empty() {
                let _ = tx.send(Ok(Batch::empty_final())).await;
                return;
            }
            let last = chunks.len() - 1;
            for (i, chunk) in chunks.into_iter().enumerate() {
                let batch = if i == last {
                    Batch::new(chunk).mark_final()
                } else {
                    Batch::new(chunk)
                };
                if tx.send(Ok(batch)).await.is_err() {
                    return;
                }
            }
        });

        rx
    }

    async fn get_row_count(&self, table: &str) -> Result<i64> {
        Ok(self
            .tables
            .lock()
            .unwrap()
            .get(table)
            .map(|t| t.rows.len() as i64)
            .unwrap_or(0))
    }

    async fn test_connection(&self) -> Result<()> {
        Ok(())
    }

    fn db_type(&self) -> &str {
        "memory"
    }

    async fn close(&self) {}
}

#[derive(Debug, Clone)]
struct TargetTable {
    schema: TableSchema,
    rows: Vec<(String, Row)>,
}

#[derive(Default)]
struct TargetState {
    tables: BTreeMap<String, TargetTable>,
    rejected: Vec<(String, SqlValue)>,
    ensure_calls: usize,
    commits: usize,
}

/// Target store that models keyed upserts and per-table transactions.
/// Clones share state.
#[derive(Clone, Default)]
pub struct MemoryTarget {
    state: Arc<Mutex<TargetState>>,
}

impl MemoryTarget {
    pub fn new() -> Self {
        Self::default()
    }

    /// Committed rows of a table in first-insert order.
    pub fn rows(&self, table: &str) -> Vec<Row> {
        self.state
            .lock()
            .unwrap()
            .tables
            .get(table)
            .map(|t| t.rows.iter().map(|(_, r)| r.clone()).collect())
            .unwrap_or_default()
    }

    /// Schema the table was created with.
    pub fn created_schema(&self, table: &str) -> Option<TableSchema> {
        self.state
            .lock()
            .unwrap()
            .tables
            .get(table)
            .map(|t| t.schema.clone())
    }

    pub fn has_table(&self, table: &str) -> bool {
        self.state.lock().unwrap().tables.contains_key(table)
    }

    /// Make upserts of this key value into `table` fail.
    pub fn reject_key(&self, table: &str, key: SqlValue) {
        self.state
            .lock()
            .unwrap()
            .rejected
            .push((table.to_string(), key));
    }

    pub fn ensure_calls(&self) -> usize {
        self.state.lock().unwrap().ensure_calls
    }

    pub fn commits(&self) -> usize {
        self.state.lock().unwrap().commits
    }
}

#[async_trait]
impl TargetWriter for MemoryTarget {
    async fn ensure_table(&self, table: &TableSchema) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.ensure_calls += 1;
        state
            .tables
            .entry(table.name.clone())
            .or_insert_with(|| TargetTable {
                schema: table.clone(),
                rows: Vec::new(),
            });
        Ok(())
    }

    async fn table_exists(&self, table: &str) -> Result<bool> {
        Ok(self.has_table(table))
    }

    async fn begin(&self, table: &str) -> Result<Box<dyn TargetTransaction>> {
        let working = self
            .state
            .lock()
            .unwrap()
            .tables
            .get(table)
            .cloned()
            .ok_or_else(|| MigrateError::transfer(table, "table does not exist"))?;

        Ok(Box::new(MemoryTransaction {
            state: self.state.clone(),
            table: table.to_string(),
            working,
        }))
    }

    async fn get_row_count(&self, table: &str) -> Result<i64> {
        Ok(self.rows(table).len() as i64)
    }

    async fn test_connection(&self) -> Result<()> {
        Ok(())
    }

    fn db_type(&self) -> &str {
        "memory"
    }

    async fn close(&self) {}
}

struct MemoryTransaction {
    state: Arc<Mutex<TargetState>>,
    table: String,
    working: TargetTable,
}

#[async_trait]
impl TargetTransaction for MemoryTransaction {
    async fn upsert(&mut self, table: &TableSchema, row: &Row) -> Result<UpsertDisposition> {
        // Keys are matched against the table as created, like a real unique index.
        let created = &self.working.schema;
        if row.len() != created.columns.len() {
            return Err(MigrateError::row_apply(
                &table.name,
                "Column count doesn't match value count",
            ));
        }
        let key_name = created
            .unique_key
            .as_deref()
            .ok_or_else(|| MigrateError::transfer(&table.name, "no unique key"))?;
        let idx = created
            .columns
            .iter()
            .position(|c| c.name == key_name)
            .ok_or_else(|| MigrateError::transfer(&table.name, "key column missing"))?;
        let key_value = row
            .get(idx)
            .ok_or_else(|| MigrateError::row_apply(&table.name, "row too short"))?;

        let rejected = self
            .state
            .lock()
            .unwrap()
            .rejected
            .iter()
            .any(|(t, k)| t == &table.name && k == key_value);
        if rejected {
            return Err(MigrateError::row_apply(&table.name, "rejected by target"));
        }

        // A unique index never matches NULL against NULL.
        if key_value.is_null() {
            let key = format!("NULL#{}", self.working.rows.len());
            self.working.rows.push((key, row.clone()));
            return Ok(UpsertDisposition::Inserted);
        }

        let key = format!("{:?}", key_value);
        match self.working.rows.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) if existing == row => Ok(UpsertDisposition::Unchanged),
            Some((_, existing)) => {
                *existing = row.clone();
                Ok(UpsertDisposition::Updated)
            }
            None => {
                self.working.rows.push((key, row.clone()));
                Ok(UpsertDisposition::Inserted)
            }
        }
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let this = *self;
        let mut state = this.state.lock().unwrap();
        state.commits += 1;
        if let Some(t) = state.tables.get_mut(&this.table) {
            t.rows = this.working.rows;
        }
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}
