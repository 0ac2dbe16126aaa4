use rusqlite::ffi;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Invalid identifier: '{0}'")]
    InvalidIdentifier(String),

    #[error("Unsupported operator '{operator}' on field '{field}'")]
    UnsupportedOperator { field: String, operator: String },

    #[error("Unsupported update operator: {0}")]
    UnsupportedUpdateOperator(String),

    #[error("Unsupported pipeline stage: {0}")]
    UnsupportedPipelineStage(String),

    #[error("Unsupported aggregation operator: {0}")]
    UnsupportedAggregationOperator(String),

    #[error("$group stage requires an _id field")]
    MissingGroupId,

    #[error("Duplicate key: {0}")]
    DuplicateKey(String),

    #[error("Collection '{0}' not found")]
    CollectionNotFound(String),

    #[error("Collection '{0}' already exists")]
    CollectionAlreadyExists(String),

    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Storage error: {0}")]
    Sqlite(#[source] rusqlite::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

pub type DbResult<T> = Result<T, DbError>;

impl DbError {
    pub(crate) fn unsupported_operator(field: &str, operator: &str) -> Self {
        DbError::UnsupportedOperator {
            field: field.to_string(),
            operator: operator.to_string(),
        }
    }

    /// True when the error reports a collection whose table does not exist.
    pub fn is_missing_collection(&self) -> bool {
        matches!(self, DbError::CollectionNotFound(_))
    }
}

impl serde::Serialize for DbError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

/// Engine failures are classified once here so `?` yields typed errors:
/// primary-key and unique-index violations become `DuplicateKey`, a missing
/// table becomes `CollectionNotFound`, anything else passes through.
impl From<rusqlite::Error> for DbError {
    fn from(err: rusqlite::Error) -> Self {
        if let rusqlite::Error::SqliteFailure(failure, message) = &err {
            match failure.extended_code {
                ffi::SQLITE_CONSTRAINT_PRIMARYKEY | ffi::SQLITE_CONSTRAINT_UNIQUE => {
                    let detail = message.clone().unwrap_or_else(|| failure.to_string());
                    return DbError::DuplicateKey(detail);
                }
                _ => {}
            }
            if let Some(table) = message
                .as_deref()
                .and_then(|m| m.strip_prefix("no such table: "))
            {
                return DbError::CollectionNotFound(table.to_string());
            }
        }
        DbError::Sqlite(err)
    }
}
