//! Identifier and field-path validation.
//!
//! Collection names and field paths end up spliced into statement text
//! (placeholders cannot stand in for table names or JSON paths), so every
//! name is checked against `^[A-Za-z_][A-Za-z0-9_]*$` before a compiler
//! touches it. Values are never checked here; they are always bound.

use crate::error::{DbError, DbResult};
use std::fmt;

/// Name of the primary-key column and of the reserved document field.
pub const ID_FIELD: &str = "_id";

/// Name of the column holding the serialized document.
pub const DOCUMENT_COLUMN: &str = "document";

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Validate a collection name or a single path segment.
pub fn validate_identifier(name: &str) -> DbResult<()> {
    if is_identifier(name) {
        Ok(())
    } else {
        Err(DbError::InvalidIdentifier(name.to_string()))
    }
}

/// Validate a collection name and return it double-quoted for statement text.
pub fn quote_identifier(name: &str) -> DbResult<String> {
    validate_identifier(name)?;
    Ok(format!("\"{}\"", name))
}

/// Deterministic index name for a collection and field path.
///
/// Collection names cannot contain a dot, so the first dot always separates
/// the collection from the path and distinct pairs never share a name.
pub fn index_name(collection: &str, path: &FieldPath) -> String {
    format!("idx_{}.{}", collection, path.as_str())
}

/// A validated dot-separated address into a document (`a.b` -> `$.a.b`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldPath {
    raw: String,
}

impl FieldPath {
    /// Parse a field path, validating every segment.
    pub fn parse(path: &str) -> DbResult<Self> {
        if path.is_empty() || !path.split('.').all(is_identifier) {
            return Err(DbError::InvalidIdentifier(path.to_string()));
        }
        Ok(Self {
            raw: path.to_string(),
        })
    }

    /// Parse a field reference that may carry the `$` prefix used in pipelines.
    pub fn parse_reference(reference: &str) -> DbResult<Self> {
        Self::parse(reference.strip_prefix('$').unwrap_or(reference))
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.raw.split('.')
    }

    /// True for the top-level `_id` field, which lives in the key column.
    pub fn is_id(&self) -> bool {
        self.raw == ID_FIELD
    }

    /// JSON path literal body, e.g. `$.address.city`.
    pub fn json_path(&self) -> String {
        format!("$.{}", self.raw)
    }

    /// SQL expression yielding the SQL value stored at this path.
    pub fn extract_expr(&self) -> String {
        if self.is_id() {
            ID_FIELD.to_string()
        } else {
            format!("json_extract({}, '{}')", DOCUMENT_COLUMN, self.json_path())
        }
    }

    /// SQL expression yielding the JSON text stored at this path, so strings,
    /// booleans and nested values keep their JSON type when read back.
    pub fn json_expr(&self) -> String {
        if self.is_id() {
            format!("json_quote({})", ID_FIELD)
        } else {
            format!("{} -> '{}'", DOCUMENT_COLUMN, self.json_path())
        }
    }

    /// GROUP BY terms that bucket documents by value at this path.
    ///
    /// Numbers group numerically (`1` and `1.0` together). The second term
    /// keeps booleans and containers apart from the numbers and strings that
    /// `json_extract` would otherwise render identically. Missing and null
    /// values share one bucket.
    pub fn group_by_expr(&self) -> String {
        if self.is_id() {
            ID_FIELD.to_string()
        } else {
            format!(
                "{}, (json_type({}, '{}') IN ('true', 'false', 'object', 'array')) IS 1",
                self.extract_expr(),
                DOCUMENT_COLUMN,
                self.json_path()
            )
        }
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
