use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::document::decode_row;
use super::engine::DocStore;
use crate::error::DbResult;
use crate::sql::{quote_identifier, CompiledStatement};

pub mod crud;
pub mod indexes;
pub mod query;

/// Bare acknowledgement returned by DDL operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Acknowledged {
    pub acknowledged: bool,
}

impl Acknowledged {
    pub fn yes() -> Self {
        Self { acknowledged: true }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertOneResult {
    pub acknowledged: bool,
    pub inserted_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertManyResult {
    pub acknowledged: bool,
    pub inserted_count: usize,
    pub inserted_ids: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateResult {
    pub acknowledged: bool,
    pub modified_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteResult {
    pub acknowledged: bool,
    pub deleted_count: usize,
}

/// Options for [`Collection::create_index`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexOptions {
    /// Reject documents whose value at the path duplicates another's.
    #[serde(default)]
    pub unique: bool,
}

/// A handle on one collection, borrowed from its [`DocStore`].
///
/// The name is validated when the handle is created; whether the backing
/// table exists is checked by each operation.
#[derive(Debug, Clone)]
pub struct Collection<'a> {
    /// Collection name (table name)
    pub name: String,
    /// Quoted table name for statement text
    table: String,
    conn: &'a Connection,
}

impl<'a> Collection<'a> {
    pub(crate) fn new(store: &'a DocStore, name: &str) -> DbResult<Self> {
        Ok(Self {
            name: name.to_string(),
            table: quote_identifier(name)?,
            conn: store.connection(),
        })
    }

    /// Whether the backing table exists.
    pub fn exists(&self) -> DbResult<bool> {
        let found = self
            .conn
            .query_row(
                "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1 COLLATE NOCASE",
                params![self.name],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn log_statement(&self, statement: &CompiledStatement) {
        tracing::debug!(
            "[{}] {} ({} params)",
            self.name,
            statement.sql,
            statement.params.len()
        );
    }

    /// Run a statement that changes rows and return the number changed.
    fn execute(&self, statement: &CompiledStatement) -> DbResult<usize> {
        self.log_statement(statement);
        let mut stmt = self.conn.prepare_cached(&statement.sql)?;
        Ok(stmt.execute(params_from_iter(statement.params.iter()))?)
    }

    /// Run a `SELECT _id, document ...` statement and decode every row.
    fn query_documents(&self, statement: &CompiledStatement) -> DbResult<Vec<Value>> {
        self.log_statement(statement);
        let mut stmt = self.conn.prepare_cached(&statement.sql)?;
        let rows = stmt.query_map(params_from_iter(statement.params.iter()), |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut documents = Vec::new();
        for row in rows {
            let (id, blob) = row?;
            documents.push(decode_row(id, &blob)?);
        }
        Ok(documents)
    }
}
