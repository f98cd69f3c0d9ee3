//! # sqlite-mysql-sync
//!
//! Schema-agnostic SQLite to MySQL synchronization library.
//!
//! Every user table of a SQLite file is mirrored into MySQL without any
//! per-table code:
//!
//! - **Type mapping** from SQLite declared types to `BIGINT`/`TEXT`/`FLOAT`/`BLOB`
//! - **Natural keys** from a leading `id` column or a per-table override
//! - **Create-if-absent** target tables with a unique constraint on the key
//! - **Idempotent upserts** with inserted/updated/unchanged counts per table
//! - **Per-table transactions**: a failing table is rolled back, the run goes on
//!
//! ## Example
//!
//! ```rust,no_run
//! use sqlite_mysql_sync::{Config, Orchestrator};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> sqlite_mysql_sync::Result<()> {
//!     let config = Config::load("config.yaml")?;
//!     let orchestrator = Orchestrator::new(config).await?;
//!     let result = orchestrator.run(CancellationToken::new(), false).await?;
//!     println!("Inserted {} rows", result.rows_inserted);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod core;
pub mod drivers;
pub mod error;
pub mod keys;
pub mod orchestrator;
pub mod sync;
pub mod trigger;
pub mod typemap;

#[cfg(test)]
mod testing;

// Re-exports for convenient access
pub use config::{Config, FetchConfig, MigrationConfig, SourceConfig, TargetConfig};
pub use crate::core::{
    Batch, ColumnSpec, ReadOptions, Row, SourceColumn, SourceReader, SqlValue, TableSchema,
    TargetTransaction, TargetType, TargetWriter, UpsertDisposition,
};
pub use drivers::{MysqlDialect, MysqlWriter, SqliteReader};
pub use error::{MigrateError, Result};
pub use keys::KeyResolver;
pub use orchestrator::{HealthCheckResult, MigrationOutcome, MigrationResult, Orchestrator, TablePlan};
pub use sync::{SyncStats, TableSynchronizer};
pub use trigger::{CommandTrigger, FetchTrigger};
pub use typemap::map_type;
