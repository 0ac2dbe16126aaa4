use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

use super::collection::{Acknowledged, Collection, IndexOptions};
use super::functions;
use crate::config::StoreConfig;
use crate::error::{DbError, DbResult};
use crate::sql::{quote_identifier, validate_identifier};

/// A document store over a single SQLite connection.
///
/// Every operation is a synchronous request/response on that connection.
/// `DocStore` is `Send` but not `Sync`: the engine allows one writer at a
/// time, so callers sharing a store across threads must wrap it in a
/// `Mutex` (or similar) and serialize calls themselves.
pub struct DocStore {
    conn: Connection,
    config: StoreConfig,
}

impl std::fmt::Debug for DocStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocStore")
            .field("path", &self.config.path)
            .finish()
    }
}

impl DocStore {
    /// Open (or create) a store backed by a database file.
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        Self::with_config(StoreConfig::with_path(path))
    }

    /// Open a private in-memory store.
    pub fn open_in_memory() -> DbResult<Self> {
        Self::with_config(StoreConfig::in_memory())
    }

    pub fn with_config(config: StoreConfig) -> DbResult<Self> {
        let cache_size = config.regex_cache_capacity()?;

        let conn = match &config.path {
            Some(path) => Connection::open(path)?,
            None => Connection::open_in_memory()?,
        };
        conn.busy_timeout(config.busy_timeout())?;
        functions::register_regexp(&conn, cache_size)?;

        match &config.path {
            Some(path) => tracing::info!("Opened document store at {}", path.display()),
            None => tracing::info!("Opened in-memory document store"),
        }

        Ok(Self { conn, config })
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub(crate) fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Get a handle on a collection. The name is validated; the collection
    /// itself need not exist yet.
    pub fn collection(&self, name: &str) -> DbResult<Collection<'_>> {
        Collection::new(self, name)
    }

    // ==================== Collection management ====================

    /// Create a collection. Creating an existing collection is a no-op.
    pub fn create_collection(&self, name: &str) -> DbResult<()> {
        let table = quote_identifier(name)?;
        self.conn.execute(
            &format!(
                "CREATE TABLE IF NOT EXISTS {} (_id TEXT PRIMARY KEY NOT NULL, document TEXT NOT NULL)",
                table
            ),
            [],
        )?;
        tracing::info!("Created collection '{}'", name);
        Ok(())
    }

    /// Drop a collection with all its documents and indexes. Dropping a
    /// missing collection is a no-op.
    pub fn drop_collection(&self, name: &str) -> DbResult<Acknowledged> {
        let table = quote_identifier(name)?;
        self.conn
            .execute(&format!("DROP TABLE IF EXISTS {}", table), [])?;
        tracing::info!("Dropped collection '{}'", name);
        Ok(Acknowledged::yes())
    }

    /// Rename a collection, keeping its documents and indexes.
    ///
    /// Indexes are recreated under names derived from the new collection
    /// name so `create_index` stays idempotent after the rename.
    pub fn rename_collection(&self, old_name: &str, new_name: &str) -> DbResult<Acknowledged> {
        let old_table = quote_identifier(old_name)?;
        let new_table = quote_identifier(new_name)?;

        if !self.collection_exists(old_name)? {
            return Err(DbError::CollectionNotFound(old_name.to_string()));
        }
        if self.collection_exists(new_name)? {
            return Err(DbError::CollectionAlreadyExists(new_name.to_string()));
        }

        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            &format!("ALTER TABLE {} RENAME TO {}", old_table, new_table),
            [],
        )?;

        let old_prefix = format!("idx_{}.", old_name);
        let indexes: Vec<(String, String)> = {
            let mut stmt = tx.prepare(
                "SELECT name, sql FROM sqlite_master
                 WHERE type = 'index' AND tbl_name = ?1 COLLATE NOCASE AND sql IS NOT NULL",
            )?;
            let rows = stmt.query_map(params![new_name], |row| Ok((row.get(0)?, row.get(1)?)))?;
            rows.collect::<rusqlite::Result<Vec<_>>>()?
        };

        for (index, sql) in indexes {
            // table names match case-insensitively, so index prefixes do too
            let path = match index.get(..old_prefix.len()) {
                Some(prefix) if prefix.eq_ignore_ascii_case(&old_prefix) => {
                    &index[old_prefix.len()..]
                }
                _ => continue,
            };
            let renamed = format!("idx_{}.{}", new_name, path);
            tx.execute(&format!("DROP INDEX \"{}\"", index), [])?;
            tx.execute(
                &sql.replacen(&format!("\"{}\"", index), &format!("\"{}\"", renamed), 1),
                [],
            )?;
        }

        tx.commit()?;
        tracing::info!("Renamed collection '{}' to '{}'", old_name, new_name);
        Ok(Acknowledged::yes())
    }

    /// Create an index over a JSON field path. See [`Collection::create_index`].
    pub fn create_index(
        &self,
        name: &str,
        field_path: &str,
        options: IndexOptions,
    ) -> DbResult<Acknowledged> {
        self.collection(name)?.create_index(field_path, options)
    }

    pub fn collection_exists(&self, name: &str) -> DbResult<bool> {
        validate_identifier(name)?;
        let found = self
            .conn
            .query_row(
                "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1 COLLATE NOCASE",
                params![name],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Names of all collections, sorted.
    pub fn list_collections(&self) -> DbResult<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT name FROM sqlite_master
             WHERE type = 'table' AND name NOT LIKE 'sqlite_%'
             ORDER BY name",
        )?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        Ok(rows.collect::<rusqlite::Result<Vec<String>>>()?)
    }
}
