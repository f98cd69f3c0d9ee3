//! Type mapping between SQLite declared types and MySQL column types.
//!
//! SQLite accepts arbitrary type names, so mapping works on substrings of the
//! lowercased declaration rather than on an exact type list. Rules are tried
//! in a fixed order and the first match wins:
//!
//! 1. `int` → BIGINT
//! 2. `char` or `text` → TEXT
//! 3. `real`, `double` or `float` → FLOAT
//! 4. `blob` → BLOB
//! 5. anything else → TEXT

use crate::core::schema::TargetType;

/// Map a SQLite declared type to a MySQL target type.
pub fn map_type(source_type: &str) -> TargetType {
    let t = source_type.to_lowercase();

    if t.contains("int") {
        TargetType::BigInt
    } else if t.contains("char") || t.contains("text") {
        TargetType::Text
    } else if t.contains("real") || t.contains("double") || t.contains("float") {
        TargetType::Float
    } else if t.contains("blob") {
        TargetType::Blob
    } else {
        TargetType::Text
    }
}
