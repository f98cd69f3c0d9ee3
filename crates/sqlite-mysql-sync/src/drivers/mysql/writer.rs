//! MySQL/MariaDB target writer implementation.
//!
//! Implements the `TargetWriter` trait for writing data to MySQL/MariaDB databases.
//! Uses mysql_async for connection pooling; every table is written inside its
//! own transaction, one upsert statement per row.

use async_trait::async_trait;
use mysql_async::prelude::*;
use mysql_async::{Opts, OptsBuilder, Pool, PoolConstraints, PoolOpts, SslOpts, Transaction, TxOpts};
use tracing::{debug, info, warn};

use crate::config::TargetConfig;
use crate::core::schema::TableSchema;
use crate::core::traits::{TargetTransaction, TargetWriter, UpsertDisposition};
use crate::core::value::{Row, SqlValue};
use crate::error::{MigrateError, Result};

use super::dialect::MysqlDialect;

/// MySQL target writer implementation using mysql_async.
pub struct MysqlWriter {
    pool: Pool,
    dialect: MysqlDialect,
}

impl MysqlWriter {
    /// Create a new MySQL writer from configuration.
    pub async fn new(config: &TargetConfig, max_conns: usize) -> Result<Self> {
        let ssl_opts = match config.ssl_mode.to_lowercase().as_str() {
            "disable" => {
                warn!("MySQL TLS is disabled. Credentials will be transmitted in plaintext.");
                None
            }
            "prefer" | "require" => Some(SslOpts::default().with_danger_accept_invalid_certs(true)),
            "verify-ca" | "verify_ca" => Some(SslOpts::default().with_danger_skip_domain_validation(true)),
            "verify-full" | "verify_identity" => Some(SslOpts::default()),
            _ => {
                warn!(
                    "Unknown ssl_mode '{}', defaulting to prefer",
                    config.ssl_mode
                );
                Some(SslOpts::default().with_danger_accept_invalid_certs(true))
            }
        };

        let mut builder = OptsBuilder::default()
            .ip_or_hostname(&config.host)
            .tcp_port(config.port)
            .db_name(Some(&config.database))
            .user(Some(&config.user))
            .pass(Some(&config.password))
            // Use utf8mb4 for full Unicode support
            .init(vec!["SET NAMES utf8mb4"]);

        if let Some(ssl) = ssl_opts {
            builder = builder.ssl_opts(ssl);
        }

        let constraints = PoolConstraints::new(1, max_conns.max(1)).ok_or_else(|| {
            MigrateError::Config(format!("invalid MySQL pool size: {}", max_conns))
        })?;
        let opts: Opts = builder
            .pool_opts(PoolOpts::new().with_constraints(constraints))
            .into();
        let pool = Pool::new(opts);

        // Test connection
        let mut conn = pool
            .get_conn()
            .await
            .map_err(|e| MigrateError::connection(e, format!("connecting to MySQL target {}", config.location())))?;

        conn.query_drop("SELECT 1")
            .await
            .map_err(|e| MigrateError::connection(e, "testing MySQL target connection"))?;

        drop(conn);

        info!("Connected to MySQL target: {}", config.location());

        Ok(Self {
            pool,
            dialect: MysqlDialect::new(),
        })
    }
}

#[async_trait]
impl TargetWriter for MysqlWriter {
    async fn ensure_table(&self, table: &TableSchema) -> Result<()> {
        let sql = self.dialect.create_table_sql(table)?;

        let mut conn = self
            .pool
            .get_conn()
            .await
            .map_err(|e| MigrateError::connection(e, "getting MySQL connection"))?;

        debug!("MySQL DDL: {}", sql);
        conn.query_drop(&sql).await?;
        Ok(())
    }

    async fn table_exists(&self, table: &str) -> Result<bool> {
        let mut conn = self
            .pool
            .get_conn()
            .await
            .map_err(|e| MigrateError::connection(e, "getting MySQL connection"))?;

        let count: Option<i64> = conn
            .exec_first(self.dialect.table_exists_sql(), (table,))
            .await?;

        Ok(count.unwrap_or(0) > 0)
    }

    async fn begin(&self, table: &str) -> Result<Box<dyn TargetTransaction>> {
        let tx = self
            .pool
            .start_transaction(TxOpts::default())
            .await
            .map_err(|e| MigrateError::connection(e, format!("starting transaction for {}", table)))?;

        Ok(Box::new(MysqlTransaction {
            tx,
            table: table.to_string(),
            dialect: self.dialect.clone(),
            upsert_sql: None,
            rows_written: 0,
        }))
    }

    async fn get_row_count(&self, table: &str) -> Result<i64> {
        let sql = self.dialect.row_count_sql(table)?;
        let mut conn = self
            .pool
            .get_conn()
            .await
            .map_err(|e| MigrateError::connection(e, "getting MySQL connection"))?;

        let count: Option<i64> = conn.query_first(&sql).await?;
        Ok(count.unwrap_or(0))
    }

    async fn test_connection(&self) -> Result<()> {
        let mut conn = self
            .pool
            .get_conn()
            .await
            .map_err(|e| MigrateError::connection(e, "testing MySQL connection"))?;
        conn.query_drop("SELECT 1")
            .await
            .map_err(|e| MigrateError::connection(e, "testing MySQL connection"))?;
        Ok(())
    }

    fn db_type(&self) -> &str {
        self.dialect.name()
    }

    async fn close(&self) {
        self.pool.clone().disconnect().await.ok();
    }
}

/// One table's write transaction.
///
/// mysql_async rolls back a transaction that is dropped uncommitted, so an
/// aborted sync never leaves partial rows behind.
struct MysqlTransaction {
    tx: Transaction<'static>,
    table: String,
    dialect: MysqlDialect,
    upsert_sql: Option<String>,
    rows_written: u64,
}

#[async_trait]
impl TargetTransaction for MysqlTransaction {
    async fn upsert(&mut self, table: &TableSchema, row: &Row) -> Result<UpsertDisposition> {
        if row.len() != table.columns.len() {
            return Err(MigrateError::row_apply(
                &table.name,
                format!(
                    "row has {} values but table has {} columns",
                    row.len(),
                    table.columns.len()
                ),
            ));
        }

        let sql = match &self.upsert_sql {
            Some(sql) => sql.clone(),
            None => {
                let sql = self.dialect.upsert_sql(table)?;
                self.upsert_sql = Some(sql.clone());
                sql
            }
        };

        let params: Vec<mysql_async::Value> = row.iter().map(sql_value_to_mysql).collect();
        self.tx.exec_drop(&sql, params).await.map_err(|e| match e {
            mysql_async::Error::Server(server) => MigrateError::row_apply(&table.name, server.to_string()),
            other => MigrateError::Target(other),
        })?;

        let disposition = disposition_from_affected(self.tx.affected_rows())
            .ok_or_else(|| {
                MigrateError::row_apply(
                    &table.name,
                    format!("unexpected affected row count {}", self.tx.affected_rows()),
                )
            })?;
        self.rows_written += 1;
        Ok(disposition)
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let MysqlTransaction {
            tx,
            table,
            rows_written,
            ..
        } = *self;
        tx.commit().await?;
        debug!("MySQL: committed {} rows to {}", rows_written, table);
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        let MysqlTransaction { tx, table, .. } = *self;
        tx.rollback().await?;
        debug!("MySQL: rolled back {}", table);
        Ok(())
    }
}

/// Interpret the affected-row count of a single-row
/// `INSERT ... ON DUPLICATE KEY UPDATE`.
fn disposition_from_affected(affected: u64) -> Option<UpsertDisposition> {
    match affected {
        1 => Some(UpsertDisposition::Inserted),
        2 => Some(UpsertDisposition::Updated),
        0 => Some(UpsertDisposition::Unchanged),
        _ => None,
    }
}

/// Convert SqlValue to mysql_async::Value.
fn sql_value_to_mysql(value: &SqlValue) -> mysql_async::Value {
    match value {
        SqlValue::Null => mysql_async::Value::NULL,
        SqlValue::Integer(i) => mysql_async::Value::from(*i),
        SqlValue::Real(f) => mysql_async::Value::from(*f),
        SqlValue::Text(s) => mysql_async::Value::from(s.as_str()),
        SqlValue::Blob(b) => mysql_async::Value::from(b.as_slice()),
    }
}
