//! A document store layered on SQLite.
//!
//! Documents are JSON objects kept one per row in a table per collection.
//! Mongo-style queries, `$set` updates and `$match`/`$group` pipelines are
//! compiled to parameterized SQL over the engine's JSON functions; every
//! value from the caller travels as a bound parameter and every name that
//! reaches statement text is validated first.
//!
//! ```no_run
//! use docsql::DocStore;
//! use serde_json::json;
//!
//! # fn main() -> docsql::DbResult<()> {
//! let store = DocStore::open("app.db")?;
//! store.create_collection("users")?;
//! let users = store.collection("users")?;
//! users.insert_one(json!({"name": "Ann", "age": 31}))?;
//! let adults = users.find(&json!({"age": {"$gte": 18}}))?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod sql;
pub mod storage;

pub use config::StoreConfig;
pub use error::{DbError, DbResult};
pub use storage::{
    Acknowledged, Collection, DeleteResult, DocStore, IndexOptions, InsertManyResult,
    InsertOneResult, UpdateResult,
};
