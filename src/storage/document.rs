//! Document identity and row encoding.
//!
//! Each row stores `_id` twice: in the key column and inside the JSON blob.
//! [`stamp_identity`] is the only way a blob is produced for insertion, so
//! the two copies always agree.

use crate::error::{DbError, DbResult};
use crate::sql::ID_FIELD;
use serde_json::{Map, Value};
use uuid::Uuid;

/// A document ready to be written: its resolved `_id` and serialized blob.
#[derive(Debug, Clone, PartialEq)]
pub struct StampedDocument {
    pub id: String,
    pub blob: String,
}

/// Generate a fresh document identifier.
pub fn generate_id() -> String {
    Uuid::new_v4().to_string()
}

/// Resolve `_id` (keeping a caller-supplied string, generating one
/// otherwise), write it into the document and serialize.
pub fn stamp_identity(document: Value) -> DbResult<StampedDocument> {
    let mut fields = match document {
        Value::Object(fields) => fields,
        other => {
            return Err(DbError::InvalidDocument(format!(
                "document must be an object, got {}",
                other
            )))
        }
    };

    let id = match fields.shift_remove(ID_FIELD) {
        Some(Value::String(id)) => id,
        Some(other) => {
            return Err(DbError::InvalidDocument(format!(
                "_id must be a string, got {}",
                other
            )))
        }
        None => generate_id(),
    };

    let mut stamped = Map::with_capacity(fields.len() + 1);
    stamped.insert(ID_FIELD.to_string(), Value::String(id.clone()));
    stamped.extend(fields);

    let blob = serde_json::to_string(&Value::Object(stamped))?;
    Ok(StampedDocument { id, blob })
}

/// Rebuild a document from its key column and blob. The key column wins if
/// the blob disagrees.
pub fn decode_row(id: String, blob: &str) -> DbResult<Value> {
    let fields = match serde_json::from_str(blob)? {
        Value::Object(fields) => fields,
        other => {
            return Err(DbError::InvalidDocument(format!(
                "stored document '{}' is not an object: {}",
                id, other
            )))
        }
    };

    let mut document = Map::with_capacity(fields.len() + 1);
    document.insert(ID_FIELD.to_string(), Value::String(id));
    document.extend(fields.into_iter().filter(|(k, _)| k != ID_FIELD));
    Ok(Value::Object(document))
}
