//! Database driver implementations.
//!
//! Each driver implements one side of the core traits:
//!
//! - [`sqlite`]: [`SourceReader`](crate::core::SourceReader) over a SQLite file
//! - [`mysql`]: [`TargetWriter`](crate::core::TargetWriter) over MySQL/MariaDB
//!
//! # Adding New Stores
//!
//! 1. Create a new module under `drivers/`
//! 2. Implement `SourceReader` or `TargetWriter` (plus `TargetTransaction`)
//! 3. Accept the new `type` in config validation and wire it up in
//!    [`Orchestrator::new`](crate::orchestrator::Orchestrator::new)

pub mod mysql;
pub mod sqlite;

pub use mysql::{MysqlDialect, MysqlWriter};
pub use sqlite::SqliteReader;
