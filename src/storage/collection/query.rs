use rusqlite::params_from_iter;
use serde_json::{Map, Value};

use super::*;
use crate::error::{DbError, DbResult};
use crate::sql::{
    json_text_to_value, sql_to_json, CompiledStatement, FieldPath, Filter, Pipeline,
    PipelineOutput, SqlValue, GROUP_KEY,
};

impl<'a> Collection<'a> {
    // ==================== Finds ====================

    /// Run a read that soft-fails to an empty result when the collection
    /// does not exist. Malformed queries never reach this point.
    fn soft_fail<T: Default>(&self, result: DbResult<T>) -> DbResult<T> {
        match result {
            Err(e) if e.is_missing_collection() => {
                tracing::warn!("Read on missing collection '{}' returns no documents", self.name);
                Ok(T::default())
            }
            other => other,
        }
    }

    fn find_filtered(&self, filter: &Filter, limit: Option<usize>) -> DbResult<Vec<Value>> {
        let condition = filter.where_clause();
        let mut sql = format!("SELECT _id, document FROM {}{}", self.table, condition.sql);
        if let Some(limit) = limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }
        let statement = CompiledStatement::new(sql, condition.params);
        self.soft_fail(self.query_documents(&statement))
    }

    /// All documents matching `query`, in storage order.
    ///
    /// Returns an empty list when the collection does not exist; a malformed
    /// query still fails. Values compare the way SQLite compares extracted
    /// JSON: `1` equals `1.0`, and `true`/`false` equal `1`/`0`.
    pub fn find(&self, query: &Value) -> DbResult<Vec<Value>> {
        let filter = Filter::parse(query)?;
        self.find_filtered(&filter, None)
    }

    /// The first matching document in storage order, if any.
    pub fn find_one(&self, query: &Value) -> DbResult<Option<Value>> {
        let filter = Filter::parse(query)?;
        Ok(self.find_filtered(&filter, Some(1))?.into_iter().next())
    }

    /// Point lookup on the primary key.
    pub fn find_by_id(&self, id: &str) -> DbResult<Option<Value>> {
        let statement = CompiledStatement::new(
            format!("SELECT _id, document FROM {} WHERE _id = ?", self.table),
            vec![SqlValue::Text(id.to_string())],
        );
        let found = self.query_documents(&statement).map(|docs| docs.into_iter().next());
        self.soft_fail(found)
    }

    /// Like [`find`](Collection::find), but every condition must be `$in`.
    pub fn find_with_in(&self, query: &Value) -> DbResult<Vec<Value>> {
        self.find_restricted(query, "$in")
    }

    /// Like [`find`](Collection::find), but every condition must be `$regex`.
    pub fn find_with_regex(&self, query: &Value) -> DbResult<Vec<Value>> {
        self.find_restricted(query, "$regex")
    }

    fn find_restricted(&self, query: &Value, operator: &str) -> DbResult<Vec<Value>> {
        let filter = Filter::parse(query)?;
        // an empty query has no condition of the required shape
        if filter.is_empty() {
            return Err(DbError::unsupported_operator("", operator));
        }
        filter.ensure_only(operator)?;
        self.find_filtered(&filter, None)
    }

    // ==================== Counting and distinct ====================

    /// Number of documents matching `query` (an empty query counts all).
    pub fn count_documents(&self, query: &Value) -> DbResult<u64> {
        let condition = Filter::parse(query)?.where_clause();
        let statement = CompiledStatement::new(
            format!("SELECT COUNT(*) FROM {}{}", self.table, condition.sql),
            condition.params,
        );
        self.log_statement(&statement);
        let count: i64 = self
            .conn
            .prepare_cached(&statement.sql)?
            .query_row(params_from_iter(statement.params.iter()), |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Distinct values at `field_path` across the collection, in no
    /// particular order. Documents without the field, or with a null there,
    /// contribute nothing.
    ///
    /// Values are deduplicated by value: `1` and `1.0` are one value, while
    /// `true`, `1` and `"1"` are three.
    pub fn distinct(&self, field_path: &str) -> DbResult<Vec<Value>> {
        let path = FieldPath::parse(field_path)?;
        let statement = CompiledStatement::new(
            format!(
                "SELECT MIN({}) FROM {} WHERE {} IS NOT NULL GROUP BY {}",
                path.json_expr(),
                self.table,
                path.extract_expr(),
                path.group_by_expr()
            ),
            Vec::new(),
        );
        self.log_statement(&statement);

        let mut stmt = self.conn.prepare_cached(&statement.sql)?;
        let rows = stmt.query_map([], |row| row.get::<_, Option<String>>(0))?;
        let mut values = Vec::new();
        for row in rows {
            values.push(json_text_to_value(row?)?);
        }
        Ok(values)
    }

    // ==================== Aggregation ====================

    /// Run a `$match` / `$group` pipeline.
    ///
    /// With a `$group` stage each row is `{groupKey, <accumulators>...}`;
    /// otherwise the matching documents are returned. Group order is
    /// unspecified.
    pub fn aggregate(&self, pipeline: &Value) -> DbResult<Vec<Value>> {
        let compiled = Pipeline::parse(pipeline)?.compile(&self.name)?;
        let names = match compiled.output {
            PipelineOutput::Documents => return self.query_documents(&compiled.statement),
            PipelineOutput::Groups { names } => names,
        };

        let statement = compiled.statement;
        self.log_statement(&statement);
        let mut stmt = self.conn.prepare_cached(&statement.sql)?;
        let rows = stmt.query_map(params_from_iter(statement.params.iter()), |row| {
            let key: Option<String> = row.get(0)?;
            let mut values = Vec::with_capacity(names.len());
            for i in 0..names.len() {
                values.push(row.get::<_, SqlValue>(i + 1)?);
            }
            Ok((key, values))
        })?;

        let mut groups = Vec::new();
        for row in rows {
            let (key, values) = row?;
            let mut group = Map::with_capacity(names.len() + 1);
            group.insert(GROUP_KEY.to_string(), json_text_to_value(key)?);
            for (name, value) in names.iter().zip(values) {
                group.insert(name.clone(), sql_to_json(value));
            }
            groups.push(Value::Object(group));
        }
        Ok(groups)
    }
}
