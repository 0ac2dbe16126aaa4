//! Common test utilities for document store tests
//!
//! Provides shared helper functions for:
//! - Creating in-memory and file-backed stores
//! - Seeding collections with fixture documents
//! - Turning on tracing output via `RUST_LOG`

#![allow(dead_code)]

use docsql::DocStore;
use serde_json::{json, Value};
use std::sync::Once;
use tempfile::TempDir;

static TRACING: Once = Once::new();

/// Install a test subscriber once per process; `RUST_LOG=docsql=debug`
/// prints every compiled statement.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

pub fn create_test_store() -> DocStore {
    init_tracing();
    DocStore::open_in_memory().expect("Failed to open in-memory store")
}

pub fn create_file_store() -> (DocStore, TempDir) {
    init_tracing();
    let tmp_dir = TempDir::new().expect("Failed to create temp dir");
    let store = DocStore::open(tmp_dir.path().join("docs.db")).expect("Failed to open store");
    (store, tmp_dir)
}

pub fn people() -> Vec<Value> {
    vec![
        json!({"age": 45, "country": "USA"}),
        json!({"age": 55, "country": "USA"}),
        json!({"age": 15, "country": "USA"}),
        json!({"age": 25, "country": "MEX"}),
        json!({"age": 25, "country": "MEX"}),
        json!({"age": 15, "country": "MEX"}),
    ]
}

pub fn create_seeded_store() -> DocStore {
    let store = create_test_store();

    store.create_collection("people").unwrap();
    store
        .collection("people")
        .unwrap()
        .insert_many(people())
        .unwrap();

    store.create_collection("users").unwrap();
    store
        .collection("users")
        .unwrap()
        .insert_many(vec![
            json!({"_id": "alice", "name": "Alice", "age": 30, "dept": "eng", "address": {"city": "Paris"}}),
            json!({"_id": "bob", "name": "Bob", "age": 25, "dept": "eng", "address": {"city": "Lyon"}}),
            json!({"_id": "charlie", "name": "Charlie", "age": 35, "dept": "sales"}),
            json!({"_id": "diana", "name": "Diana", "age": 28, "dept": "marketing", "address": {"city": "Paris"}}),
        ])
        .unwrap();

    store
}

/// Sort documents by `_id` so order-free results compare stably.
pub fn sorted_by_id(mut docs: Vec<Value>) -> Vec<Value> {
    docs.sort_by(|a, b| a["_id"].as_str().cmp(&b["_id"].as_str()));
    docs
}

pub fn ids(docs: &[Value]) -> Vec<String> {
    let mut ids: Vec<String> = docs
        .iter()
        .filter_map(|d| d["_id"].as_str().map(str::to_string))
        .collect();
    ids.sort();
    ids
}
