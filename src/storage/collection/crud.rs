use rusqlite::params;
use serde_json::Value;

use super::*;
use crate::error::DbResult;
use crate::sql::{CompiledStatement, Filter, Update};
use crate::storage::document::{stamp_identity, StampedDocument};

impl<'a> Collection<'a> {
    // ==================== Inserts ====================

    fn insert_sql(&self) -> String {
        format!("INSERT INTO {} (_id, document) VALUES (?1, ?2)", self.table)
    }

    /// Insert one document, keeping its `_id` if it has a string one and
    /// generating a UUID otherwise.
    ///
    /// Fails with `DuplicateKey` if the `_id` (or a unique-indexed value)
    /// is already taken.
    pub fn insert_one(&self, document: Value) -> DbResult<InsertOneResult> {
        let StampedDocument { id, blob } = stamp_identity(document)?;
        self.conn
            .prepare_cached(&self.insert_sql())?
            .execute(params![id, blob])?;
        tracing::debug!("[{}] inserted document '{}'", self.name, id);

        Ok(InsertOneResult {
            acknowledged: true,
            inserted_id: id,
        })
    }

    /// Insert every document or none of them.
    ///
    /// All rows are written inside one transaction; the first failure rolls
    /// the whole batch back and is returned.
    pub fn insert_many(&self, documents: Vec<Value>) -> DbResult<InsertManyResult> {
        let stamped = documents
            .into_iter()
            .map(stamp_identity)
            .collect::<DbResult<Vec<_>>>()?;

        // rolls back on drop unless committed
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare_cached(&self.insert_sql())?;
            for doc in &stamped {
                stmt.execute(params![doc.id, doc.blob])?;
            }
        }
        tx.commit()?;

        tracing::debug!("[{}] inserted {} documents", self.name, stamped.len());
        Ok(InsertManyResult {
            acknowledged: true,
            inserted_count: stamped.len(),
            inserted_ids: stamped.into_iter().map(|doc| doc.id).collect(),
        })
    }

    // ==================== Updates ====================

    fn compile_update(
        &self,
        query: &Value,
        update: &Value,
        single: bool,
    ) -> DbResult<CompiledStatement> {
        let filter = Filter::parse(query)?;
        let assignment = Update::parse(update)?.compile();
        let condition = filter.where_clause();

        let sql = if single {
            format!(
                "UPDATE {t} SET {} WHERE _id IN (SELECT _id FROM {t}{} LIMIT 1)",
                assignment.sql,
                condition.sql,
                t = self.table
            )
        } else {
            format!("UPDATE {} SET {}{}", self.table, assignment.sql, condition.sql)
        };

        let mut params = assignment.params;
        params.extend(condition.params);
        Ok(CompiledStatement::new(sql, params))
    }

    /// Apply a `$set` update to at most one matching document.
    ///
    /// When several documents match, which one is updated is up to the
    /// storage engine; callers must not rely on any particular choice.
    pub fn update_one(&self, query: &Value, update: &Value) -> DbResult<UpdateResult> {
        let statement = self.compile_update(query, update, true)?;
        let modified_count = self.execute(&statement)?;
        Ok(UpdateResult {
            acknowledged: true,
            modified_count,
        })
    }

    /// Apply a `$set` update to every matching document.
    ///
    /// `modified_count` counts matched rows written, including rows where a
    /// path through a non-object value left the document unchanged.
    pub fn update_many(&self, query: &Value, update: &Value) -> DbResult<UpdateResult> {
        let statement = self.compile_update(query, update, false)?;
        let modified_count = self.execute(&statement)?;
        Ok(UpdateResult {
            acknowledged: true,
            modified_count,
        })
    }

    // ==================== Deletes ====================

    fn compile_delete(&self, query: &Value, single: bool) -> DbResult<CompiledStatement> {
        let condition = Filter::parse(query)?.where_clause();
        let sql = if single {
            format!(
                "DELETE FROM {t} WHERE _id IN (SELECT _id FROM {t}{} LIMIT 1)",
                condition.sql,
                t = self.table
            )
        } else {
            format!("DELETE FROM {}{}", self.table, condition.sql)
        };
        Ok(CompiledStatement::new(sql, condition.params))
    }

    /// Delete at most one matching document. As with [`update_one`], the
    /// engine picks which one when several match.
    ///
    /// [`update_one`]: Collection::update_one
    pub fn delete_one(&self, query: &Value) -> DbResult<DeleteResult> {
        let statement = self.compile_delete(query, true)?;
        let deleted_count = self.execute(&statement)?;
        Ok(DeleteResult {
            acknowledged: true,
            deleted_count,
        })
    }

    /// Delete every matching document.
    pub fn delete_many(&self, query: &Value) -> DbResult<DeleteResult> {
        let statement = self.compile_delete(query, false)?;
        let deleted_count = self.execute(&statement)?;
        Ok(DeleteResult {
            acknowledged: true,
            deleted_count,
        })
    }
}
