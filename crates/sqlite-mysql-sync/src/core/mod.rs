//! Core abstractions for store-agnostic synchronization.
//!
//! - [`schema`]: table and column metadata
//! - [`value`]: tagged SQL values, rows and batches
//! - [`traits`]: source reader and target writer traits
//! - [`identifier`]: identifier validation and quoting

pub mod identifier;
pub mod schema;
pub mod traits;
pub mod value;

pub use schema::{ColumnSpec, SourceColumn, TableSchema, TargetType};
pub use traits::{ReadOptions, SourceReader, TargetTransaction, TargetWriter, UpsertDisposition};
pub use value::{Batch, Row, SqlValue};
