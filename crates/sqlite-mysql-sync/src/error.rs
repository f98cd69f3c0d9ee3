//! Error types for the synchronization library.

use thiserror::Error;

/// Main error type for sync operations.
#[derive(Error, Debug)]
pub enum MigrateError {
    /// Configuration error (missing connection parameters, invalid file, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// A source or target store could not be opened.
    #[error("Connection error: {message}\n  Context: {context}")]
    Connection { message: String, context: String },

    /// Source database query error
    #[error("Source database error: {0}")]
    Source(#[from] sqlx::Error),

    /// Target database query error
    #[error("Target database error: {0}")]
    Target(#[from] mysql_async::Error),

    /// Schema introspection failed
    #[error("Schema extraction failed: {0}")]
    SchemaExtraction(String),

    /// Identifier rejected before being spliced into SQL
    #[error("Invalid identifier: {0}")]
    Identifier(String),

    /// A row could not be bound or applied to the target table
    #[error("Row apply failed for table {table}: {message}")]
    RowApply { table: String, message: String },

    /// One or more tables failed during a run
    #[error("Transfer failed for table {table}: {message}")]
    Transfer { table: String, message: String },

    /// The external fetch step failed; the run was not started
    #[error("Fetch trigger failed: {0}")]
    Trigger(String),

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Run was cancelled (SIGINT, etc.)
    #[error("Migration cancelled")]
    Cancelled,
}

impl MigrateError {
    /// Create a Connection error with context about where it occurred
    pub fn connection(message: impl ToString, context: impl Into<String>) -> Self {
        MigrateError::Connection {
            message: message.to_string(),
            context: context.into(),
        }
    }

    /// Create a RowApply error
    pub fn row_apply(table: impl Into<String>, message: impl Into<String>) -> Self {
        MigrateError::RowApply {
            table: table.into(),
            message: message.into(),
        }
    }

    /// Create a Transfer error
    pub fn transfer(table: impl Into<String>, message: impl Into<String>) -> Self {
        MigrateError::Transfer {
            table: table.into(),
            message: message.into(),
        }
    }

    /// Process exit code for this error.
    ///
    /// Configuration problems exit with 2 and connection failures with 3 so
    /// schedulers can tell "fix the config" apart from "database is down".
    pub fn exit_code(&self) -> u8 {
        match self {
            MigrateError::Config(_) | MigrateError::Yaml(_) => 2,
            MigrateError::Connection { .. } => 3,
            MigrateError::Trigger(_) => 4,
            MigrateError::Cancelled => 130,
            _ => 1,
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for sync operations.
pub type Result<T> = std::result::Result<T, MigrateError>;
