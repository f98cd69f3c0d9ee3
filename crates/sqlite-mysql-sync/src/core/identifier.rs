//! Identifier validation and quoting.
//!
//! Table and column names come straight from the source catalog and cannot be
//! bound as statement parameters, so they are spliced into SQL text. Every
//! name passes through [`validate_identifier`] and is quoted for the dialect
//! it ends up in.

use crate::error::{MigrateError, Result};

/// Maximum identifier length accepted (MySQL limits names to 64 characters).
const MAX_IDENTIFIER_LENGTH: usize = 64;

/// Validate an identifier before quoting.
///
/// Rejects empty names, names containing NUL bytes, and names longer than
/// MySQL accepts.
pub fn validate_identifier(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(MigrateError::Identifier(
            "identifier cannot be empty".to_string(),
        ));
    }

    if name.contains('\0') {
        return Err(MigrateError::Identifier(format!(
            "identifier contains null byte: {:?}",
            name
        )));
    }

    if name.chars().count() > MAX_IDENTIFIER_LENGTH {
        return Err(MigrateError::Identifier(format!(
            "identifier exceeds {} characters: {:?}",
            MAX_IDENTIFIER_LENGTH, name
        )));
    }

    Ok(())
}

/// Quote a MySQL identifier using backticks.
///
/// ```ignore
/// assert_eq!(quote_mysql("users")?, "`users`");
/// assert_eq!(quote_mysql("table`name")?, "`table``name`");
/// ```
pub fn quote_mysql(name: &str) -> Result<String> {
    validate_identifier(name)?;
    Ok(format!("`{}`", name.replace('`', "``")))
}

/// Quote a SQLite identifier using double quotes.
pub fn quote_sqlite(name: &str) -> Result<String> {
    if name.is_empty() || name.contains('\0') {
        return Err(MigrateError::Identifier(format!(
            "invalid SQLite identifier: {:?}",
            name
        )));
    }
    Ok(format!("\"{}\"", name.replace('"', "\"\"")))
}
