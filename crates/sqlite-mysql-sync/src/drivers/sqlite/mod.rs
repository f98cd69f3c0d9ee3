//! SQLite database driver.
//!
//! Provides the source side of a sync: table listing via `sqlite_master`,
//! column introspection via `pragma_table_info`, and streamed row reads.
//!
//! Values are decoded by their runtime storage class rather than the declared
//! column type, since SQLite does not enforce declared types.

mod reader;

pub use reader::SqliteReader;
