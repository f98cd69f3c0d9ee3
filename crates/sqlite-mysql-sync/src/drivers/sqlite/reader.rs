//! SQLite source reader implementation.
//!
//! Implements the `SourceReader` trait for SQLite database files.
//! Uses SQLx for connection pooling and async query execution.

use std::time::Duration;

use async_trait::async_trait;
use futures::TryStreamExt;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, TypeInfo, ValueRef};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::config::SourceConfig;
use crate::core::identifier::quote_sqlite;
use crate::core::schema::SourceColumn;
use crate::core::traits::{ReadOptions, SourceReader};
use crate::core::value::{Batch, Row as SourceRow, SqlValue};
use crate::error::{MigrateError, Result};

/// Connection pool timeout.
const POOL_CONNECTION_TIMEOUT: Duration = Duration::from_secs(30);

/// SQLite source reader.
///
/// The database is opened read-only: the source is assumed quiescent for the
/// duration of a run and is never written to.
pub struct SqliteReader {
    pool: SqlitePool,
    path: String,
}

impl SqliteReader {
    /// Open a SQLite database file as a source.
    pub async fn new(config: &SourceConfig, max_conns: usize) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(&config.path)
            .create_if_missing(false)
            .read_only(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_conns.max(1) as u32)
            .acquire_timeout(POOL_CONNECTION_TIMEOUT)
            .connect_with(options)
            .await
            .map_err(|e| MigrateError::connection(e, format!("opening SQLite source {}", config.path)))?;

        // Test connection
        sqlx::query("SELECT 1")
            .fetch_one(&pool)
            .await
            .map_err(|e| MigrateError::connection(e, "testing SQLite source connection"))?;

        info!("Opened SQLite source: {}", config.path);

        Ok(Self {
            pool,
            path: config.path.clone(),
        })
    }
}

#[async_trait]
impl SourceReader for SqliteReader {
    async fn list_tables(&self) -> Result<Vec<String>> {
        let rows: Vec<SqliteRow> = sqlx::query(
            r#"
            SELECT name FROM sqlite_master
            WHERE type = 'table' AND name NOT LIKE 'sqlite\_%' ESCAPE '\'
            ORDER BY name
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| MigrateError::SchemaExtraction(format!("listing tables: {}", e)))?;

        let mut tables = Vec::with_capacity(rows.len());
        for row in rows {
            tables.push(row.try_get::<String, _>("name")?);
        }

        debug!("Found {} tables in {}", tables.len(), self.path);
        Ok(tables)
    }

    async fn describe_table(&self, table: &str) -> Result<Vec<SourceColumn>> {
        let rows: Vec<SqliteRow> =
            sqlx::query("SELECT name, type FROM pragma_table_info(?) ORDER BY cid")
                .bind(table)
                .fetch_all(&self.pool)
                .await
                .map_err(|e| {
                    MigrateError::SchemaExtraction(format!("describing table {}: {}", table, e))
                })?;

        let mut columns = Vec::with_capacity(rows.len());
        for row in rows {
            let name: String = row.try_get("name")?;
            let declared_type: Option<String> = row.try_get("type")?;
            columns.push(SourceColumn::new(name, declared_type.unwrap_or_default()));
        }

        Ok(columns)
    }

    fn read_table(&self, opts: ReadOptions) -> mpsc::Receiver<Result<Batch>> {
        let (tx, rx) = mpsc::channel(opts.read_ahead.max(1));
        let pool = self.pool.clone();

        tokio::spawn(async move {
            if let Err(e) = stream_rows(&pool, &opts, &tx).await {
                let _ = tx.send(Err(e)).await;
            }
        });

        rx
    }

    async fn get_row_count(&self, table: &str) -> Result<i64> {
        let sql = format!("SELECT COUNT(*) FROM {}", quote_sqlite(table)?);
        let count: i64 = sqlx::query_scalar(&sql).fetch_one(&self.pool).await?;
        Ok(count)
    }

    async fn test_connection(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| MigrateError::connection(e, "testing SQLite connection"))?;
        Ok(())
    }

    fn db_type(&self) -> &str {
        "sqlite"
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

/// Read all rows of a table in declaration order and push them as batches.
async fn stream_rows(
    pool: &SqlitePool,
    opts: &ReadOptions,
    tx: &mpsc::Sender<Result<Batch>>,
) -> Result<()> {
    if opts.columns.is_empty() {
        let _ = tx.send(Ok(Batch::empty_final())).await;
        return Ok(());
    }

    let cols = opts
        .columns
        .iter()
        .map(|c| quote_sqlite(c))
        .collect::<Result<Vec<_>>>()?
        .join(", ");
    let sql = format!("SELECT {} FROM {}", cols, quote_sqlite(&opts.table)?);
    debug!("SQLite read: {}", sql);

    let batch_size = opts.batch_size.max(1);
    let mut rows = sqlx::query(&sql).fetch(pool);
    let mut pending: Vec<SourceRow> = Vec::with_capacity(batch_size);
    let mut total = 0usize;

    while let Some(row) = rows.try_next().await? {
        pending.push(decode_row(&row, opts.columns.len())?);
        total += 1;

        if pending.len() >= batch_size {
            let batch = Batch::new(std::mem::replace(&mut pending, Vec::with_capacity(batch_size)));
            if tx.send(Ok(batch)).await.is_err() {
                debug!("Reader for {} stopped: receiver dropped", opts.table);
                return Ok(());
            }
        }
    }

    let _ = tx.send(Ok(Batch::new(pending).mark_final())).await;
    debug!("SQLite read {} rows from {}", total, opts.table);
    Ok(())
}

fn decode_row(row: &SqliteRow, width: usize) -> Result<SourceRow> {
    (0..width).map(|idx| decode_value(row, idx)).collect()
}

/// Decode one cell by its runtime storage class.
fn decode_value(row: &SqliteRow, idx: usize) -> Result<SqlValue> {
    let raw = row.try_get_raw(idx)?;
    if raw.is_null() {
        return Ok(SqlValue::Null);
    }

    let storage_class = raw.type_info().name().to_uppercase();
    let value = match storage_class.as_str() {
        "INTEGER" | "INT" | "INT4" | "INT8" | "BIGINT" | "BOOLEAN" => {
            SqlValue::Integer(row.try_get_unchecked::<i64, _>(idx)?)
        }
        "REAL" | "FLOAT" | "DOUBLE" => SqlValue::Real(row.try_get_unchecked::<f64, _>(idx)?),
        "BLOB" => SqlValue::Blob(row.try_get_unchecked::<Vec<u8>, _>(idx)?),
        // TEXT is not checked for valid UTF-8 on write; keep such cells as bytes.
        _ => match row.try_get_unchecked::<String, _>(idx) {
            Ok(text) => SqlValue::Text(text),
            Err(_) => SqlValue::Blob(row.try_get_unchecked::<Vec<u8>, _>(idx)?),
        },
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn seeded_db() -> (TempDir, SourceConfig) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db.sqlite");

        let options = SqliteConnectOptions::new()
            .filename(&path)
            .create_if_missing(true);
        let pool = SqlitePool::connect_with(options).await.unwrap();

        for stmt in [
            "CREATE TABLE accounts (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT, balance REAL, avatar BLOB)",
            "INSERT INTO accounts (name, balance, avatar) VALUES ('Alice', 100.0, x'CAFE')",
            "INSERT INTO accounts (name, balance, avatar) VALUES ('Bob', 50.5, NULL)",
            "INSERT INTO accounts (name, balance, avatar) VALUES (NULL, 0.0, NULL)",
            "CREATE TABLE schedules_json_paths (schedule_id TEXT, payee TEXT, account TEXT)",
            "CREATE TABLE loose (a, b VARCHAR(10))",
            "INSERT INTO loose VALUES (42, 'x')",
            "INSERT INTO loose VALUES ('forty-two', 7)",
            "CREATE TABLE raw_text (id INTEGER, body TEXT)",
            "INSERT INTO raw_text VALUES (1, CAST(x'FFFE' AS TEXT))",
            "INSERT INTO raw_text VALUES (2, 'plain')",
        ] {
            sqlx::query(stmt).execute(&pool).await.unwrap();
        }
        pool.close().await;

        let config = SourceConfig {
            r#type: "sqlite".to_string(),
            path: path.to_string_lossy().into_owned(),
        };
        (dir, config)
    }

    async fn collect(reader: &SqliteReader, opts: ReadOptions) -> Vec<Batch> {
        let mut rx = reader.read_table(opts);
        let mut batches = Vec::new();
        while let Some(batch) = rx.recv().await {
            let batch = batch.unwrap();
            let last = batch.is_last;
            batches.push(batch);
            if last {
                break;
            }
        }
        batches
    }

    #[tokio::test]
    async fn test_missing_file_is_connection_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = SourceConfig {
            r#type: "sqlite".to_string(),
            path: dir.path().join("nope.sqlite").to_string_lossy().into_owned(),
        };
        let err = SqliteReader::new(&config, 1).await.err().unwrap();
        assert!(matches!(err, MigrateError::Connection { .. }));
    }

    #[tokio::test]
    async fn test_list_tables_excludes_internal() {
        let (_dir, config) = seeded_db().await;
        let reader = SqliteReader::new(&config, 2).await.unwrap();

        // AUTOINCREMENT creates sqlite_sequence, which must not be listed.
        let tables = reader.list_tables().await.unwrap();
        assert_eq!(tables, vec!["accounts", "loose", "raw_text", "schedules_json_paths"]);
    }

    #[tokio::test]
    async fn test_describe_table_preserves_order() {
        let (_dir, config) = seeded_db().await;
        let reader = SqliteReader::new(&config, 2).await.unwrap();

        let cols = reader.describe_table("accounts").await.unwrap();
        assert_eq!(
            cols,
            vec![
                SourceColumn::new("id", "INTEGER"),
                SourceColumn::new("name", "TEXT"),
                SourceColumn::new("balance", "REAL"),
                SourceColumn::new("avatar", "BLOB"),
            ]
        );

        let cols = reader.describe_table("loose").await.unwrap();
        assert_eq!(cols[0], SourceColumn::new("a", ""));
        assert_eq!(cols[1], SourceColumn::new("b", "VARCHAR(10)"));
    }

    #[tokio::test]
    async fn test_describe_unknown_table_is_empty() {
        let (_dir, config) = seeded_db().await;
        let reader = SqliteReader::new(&config, 1).await.unwrap();
        assert!(reader.describe_table("missing").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_read_table_decodes_storage_classes() {
        let (_dir, config) = seeded_db().await;
        let reader = SqliteReader::new(&config, 2).await.unwrap();

        let opts = ReadOptions {
            table: "accounts".to_string(),
            columns: vec!["id".into(), "name".into(), "balance".into(), "avatar".into()],
            batch_size: 2,
            read_ahead: 1,
        };
        let batches = collect(&reader, opts).await;

        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].len(), 2);
        assert!(batches[1].is_last);

        let rows: Vec<_> = batches.into_iter().flat_map(|b| b.rows).collect();
        assert_eq!(
            rows[0],
            vec![
                SqlValue::Integer(1),
                SqlValue::Text("Alice".into()),
                SqlValue::Real(100.0),
                SqlValue::Blob(vec![0xCA, 0xFE]),
            ]
        );
        assert_eq!(rows[1][3], SqlValue::Null);
        assert_eq!(rows[2][1], SqlValue::Null);
    }

    #[tokio::test]
    async fn test_read_table_uses_runtime_storage_class() {
        let (_dir, config) = seeded_db().await;
        let reader = SqliteReader::new(&config, 2).await.unwrap();

        let opts = ReadOptions {
            table: "loose".to_string(),
            columns: vec!["a".into(), "b".into()],
            ..ReadOptions::default()
        };
        let rows: Vec<_> = collect(&reader, opts)
            .await
            .into_iter()
            .flat_map(|b| b.rows)
            .collect();

        assert_eq!(rows[0][0], SqlValue::Integer(42));
        assert_eq!(rows[1][0], SqlValue::Text("forty-two".into()));
        // VARCHAR affinity stores 7 as text
        assert_eq!(rows[1][1], SqlValue::Text("7".into()));
    }

    #[tokio::test]
    async fn test_read_table_keeps_invalid_utf8_text_as_bytes() {
        let (_dir, config) = seeded_db().await;
        let reader = SqliteReader::new(&config, 2).await.unwrap();

        let opts = ReadOptions {
            table: "raw_text".to_string(),
            columns: vec!["id".into(), "body".into()],
            ..ReadOptions::default()
        };
        let rows: Vec<_> = collect(&reader, opts)
            .await
            .into_iter()
            .flat_map(|b| b.rows)
            .collect();

        assert_eq!(rows[0][1], SqlValue::Blob(vec![0xFF, 0xFE]));
        assert_eq!(rows[1][1], SqlValue::Text("plain".into()));
    }

    #[tokio::test]
    async fn test_read_empty_table_sends_final_batch() {
        let (_dir, config) = seeded_db().await;
        let reader = SqliteReader::new(&config, 2).await.unwrap();

        let opts = ReadOptions {
            table: "schedules_json_paths".to_string(),
            columns: vec!["schedule_id".into()],
            ..ReadOptions::default()
        };
        let batches = collect(&reader, opts).await;
        assert_eq!(batches.len(), 1);
        assert!(batches[0].is_last);
        assert!(batches[0].is_empty());
    }

    #[tokio::test]
    async fn test_read_is_restartable_and_counts_match() {
        let (_dir, config) = seeded_db().await;
        let reader = SqliteReader::new(&config, 2).await.unwrap();

        let opts = ReadOptions {
            table: "accounts".to_string(),
            columns: vec!["id".into()],
            ..ReadOptions::default()
        };
        let first: usize = collect(&reader, opts.clone()).await.iter().map(Batch::len).sum();
        let second: usize = collect(&reader, opts).await.iter().map(Batch::len).sum();
        assert_eq!(first, 3);
        assert_eq!(second, 3);
        assert_eq!(reader.get_row_count("accounts").await.unwrap(), 3);
    }
}
