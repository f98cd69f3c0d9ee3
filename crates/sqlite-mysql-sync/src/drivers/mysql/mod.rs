//! MySQL/MariaDB database driver.
//!
//! This module provides MySQL-specific implementations for:
//! - [`MysqlDialect`]: DDL and upsert statement builders
//! - [`MysqlWriter`]: Target database writer
//!
//! # Supported Versions
//!
//! - MySQL 5.7+, 8.0+
//! - MariaDB 10.2+
//!
//! Upsert dispositions are read from the affected-row count, so connections
//! must not set `CLIENT_FOUND_ROWS` (mysql_async does not by default).

mod dialect;
mod writer;

pub use dialect::MysqlDialect;
pub use writer::MysqlWriter;
