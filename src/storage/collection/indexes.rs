use rusqlite::params;

use super::*;
use crate::error::{DbError, DbResult};
use crate::sql::{index_name, FieldPath};

impl<'a> Collection<'a> {
    /// Create an index over the value at `field_path`.
    ///
    /// The index name is derived from the collection and path, so calling
    /// this again is a no-op (even with different options). A unique index
    /// fails with `DuplicateKey` if existing documents already collide, and
    /// makes later colliding inserts fail the same way.
    pub fn create_index(&self, field_path: &str, options: IndexOptions) -> DbResult<Acknowledged> {
        let path = FieldPath::parse(field_path)?;
        if !self.exists()? {
            return Err(DbError::CollectionNotFound(self.name.clone()));
        }

        let name = index_name(&self.name, &path);
        let sql = format!(
            "CREATE {}INDEX IF NOT EXISTS \"{}\" ON {} ({})",
            if options.unique { "UNIQUE " } else { "" },
            name,
            self.table,
            path.extract_expr()
        );
        self.conn.execute(&sql, [])?;

        tracing::info!(
            "Created {}index '{}' on '{}'",
            if options.unique { "unique " } else { "" },
            name,
            self.name
        );
        Ok(Acknowledged::yes())
    }

    /// Names of the indexes created through [`create_index`](Collection::create_index).
    pub fn indexes(&self) -> DbResult<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT name FROM sqlite_master
             WHERE type = 'index' AND tbl_name = ?1 COLLATE NOCASE AND sql IS NOT NULL
             ORDER BY name",
        )?;
        let rows = stmt.query_map(params![self.name], |row| row.get(0))?;
        Ok(rows.collect::<rusqlite::Result<Vec<String>>>()?)
    }
}
