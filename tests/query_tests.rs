//! Query Tests
//!
//! Tests for reads compiled from query objects:
//! - Equality, comparison, `$in` and `$regex` conditions
//! - Counting and distinct values
//! - Soft-fail reads on missing collections

mod common;

use common::{create_seeded_store, create_test_store, ids, sorted_by_id};
use docsql::DbError;
use serde_json::json;

// ============================================================================
// Find Tests
// ============================================================================

#[test]
fn test_find_all_and_count_agree() {
    let store = create_seeded_store();
    for name in ["users", "people"] {
        let col = store.collection(name).unwrap();
        let all = col.find(&json!({})).unwrap();
        assert_eq!(col.count_documents(&json!({})).unwrap(), all.len() as u64);
    }

    let users = store.collection("users").unwrap();
    users.delete_one(&json!({"_id": "bob"})).unwrap();
    assert_eq!(
        users.count_documents(&json!({})).unwrap(),
        users.find(&json!({})).unwrap().len() as u64
    );
}

#[test]
fn test_find_conjoins_fields() {
    let store = create_seeded_store();
    let users = store.collection("users").unwrap();
    let docs = users.find(&json!({"dept": "eng", "age": {"$gt": 26}})).unwrap();
    assert_eq!(ids(&docs), vec!["alice"]);
}

#[test]
fn test_comparison_operators() {
    let store = create_seeded_store();
    let users = store.collection("users").unwrap();

    let count = |query| users.count_documents(&query).unwrap();
    assert_eq!(count(json!({"age": {"$gt": 28}})), 2);
    assert_eq!(count(json!({"age": {"$gte": 28}})), 3);
    assert_eq!(count(json!({"age": {"$lt": 28}})), 1);
    assert_eq!(count(json!({"age": {"$lte": 28}})), 2);
    assert_eq!(count(json!({"age": {"$ne": 30}})), 3);
    assert_eq!(count(json!({"age": {"$eq": 30}})), 1);
}

#[test]
fn test_nested_field_query() {
    let store = create_seeded_store();
    let users = store.collection("users").unwrap();
    let docs = users.find(&json!({"address.city": "Paris"})).unwrap();
    assert_eq!(ids(&docs), vec!["alice", "diana"]);
}

#[test]
fn test_find_by_id() {
    let store = create_seeded_store();
    let users = store.collection("users").unwrap();
    let doc = users.find_by_id("charlie").unwrap().unwrap();
    assert_eq!(doc["name"], json!("Charlie"));
    assert!(users.find_by_id("nobody").unwrap().is_none());
}

#[test]
fn test_query_by_id_field() {
    let store = create_seeded_store();
    let users = store.collection("users").unwrap();
    let docs = users
        .find(&json!({"_id": {"$in": ["alice", "diana", "zed"]}}))
        .unwrap();
    assert_eq!(ids(&docs), vec!["alice", "diana"]);
}

#[test]
fn test_find_with_in_returns_union() {
    let store = create_seeded_store();
    let users = store.collection("users").unwrap();

    let docs = users
        .find_with_in(&json!({"dept": {"$in": ["eng", "sales", "eng"]}}))
        .unwrap();
    assert_eq!(ids(&docs), vec!["alice", "bob", "charlie"]);

    let eng = users.find(&json!({"dept": "eng"})).unwrap();
    let sales = users.find(&json!({"dept": "sales"})).unwrap();
    let mut union = eng;
    union.extend(sales);
    assert_eq!(sorted_by_id(docs), sorted_by_id(union));
}

#[test]
fn test_find_with_in_empty_list_matches_nothing() {
    let store = create_seeded_store();
    let users = store.collection("users").unwrap();
    assert!(users
        .find_with_in(&json!({"dept": {"$in": []}}))
        .unwrap()
        .is_empty());
}

// ============================================================================
// Regex Tests
// ============================================================================

#[test]
fn test_find_with_regex() {
    let store = create_seeded_store();
    let users = store.collection("users").unwrap();

    let docs = users.find_with_regex(&json!({"name": {"$regex": "^[AB]"}})).unwrap();
    assert_eq!(ids(&docs), vec!["alice", "bob"]);

    let docs = users
        .find_with_regex(&json!({"name": {"$regex": "^d", "$options": "i"}}))
        .unwrap();
    assert_eq!(ids(&docs), vec!["diana"]);
}

#[test]
fn test_regex_matches_numbers_as_text() {
    let store = create_seeded_store();
    let users = store.collection("users").unwrap();
    let docs = users.find(&json!({"age": {"$regex": "^2"}})).unwrap();
    assert_eq!(ids(&docs), vec!["bob", "diana"]);
}

#[test]
fn test_invalid_regex_matches_nothing() {
    let store = create_seeded_store();
    let users = store.collection("users").unwrap();
    let docs = users.find_with_regex(&json!({"name": {"$regex": "[a-"}})).unwrap();
    assert!(docs.is_empty());
    // the cached failure must not poison later queries
    let docs = users.find_with_regex(&json!({"name": {"$regex": "a"}})).unwrap();
    assert_eq!(ids(&docs), vec!["charlie", "diana"]);
}

// ============================================================================
// Distinct Tests
// ============================================================================

#[test]
fn test_distinct_values() {
    let store = create_seeded_store();
    let people = store.collection("people").unwrap();

    let mut countries = people.distinct("country").unwrap();
    countries.sort_by_key(|v| v.to_string());
    assert_eq!(countries, vec![json!("MEX"), json!("USA")]);

    let mut ages: Vec<i64> = people
        .distinct("age")
        .unwrap()
        .iter()
        .filter_map(|v| v.as_i64())
        .collect();
    ages.sort();
    assert_eq!(ages, vec![15, 25, 45, 55]);
}

#[test]
fn test_distinct_on_missing_collection_fails() {
    let store = create_test_store();
    let ghosts = store.collection("ghosts").unwrap();
    assert!(matches!(
        ghosts.distinct("name"),
        Err(DbError::CollectionNotFound(_))
    ));
}

// ============================================================================
// Error Path Tests
// ============================================================================

#[test]
fn test_reads_on_missing_collection_soft_fail() {
    let store = create_test_store();
    let ghosts = store.collection("ghosts").unwrap();

    assert!(ghosts.find(&json!({"a": 1})).unwrap().is_empty());
    assert!(ghosts.find_one(&json!({})).unwrap().is_none());
    assert!(ghosts.find_by_id("x").unwrap().is_none());
    assert!(ghosts.find_with_in(&json!({"a": {"$in": [1]}})).unwrap().is_empty());
    assert!(ghosts.find_with_regex(&json!({"a": {"$regex": "x"}})).unwrap().is_empty());
    assert!(matches!(
        ghosts.count_documents(&json!({})),
        Err(DbError::CollectionNotFound(_))
    ));
}

#[test]
fn test_malformed_query_fails_even_on_missing_collection() {
    let store = create_test_store();
    let ghosts = store.collection("ghosts").unwrap();
    assert!(matches!(
        ghosts.find(&json!({"a": {"$where": "1"}})),
        Err(DbError::UnsupportedOperator { .. })
    ));
    assert!(matches!(
        ghosts.find(&json!({"a; DROP TABLE x": 1})),
        Err(DbError::InvalidIdentifier(_))
    ));
}

#[test]
fn test_injection_attempts_are_inert() {
    let store = create_seeded_store();
    let users = store.collection("users").unwrap();

    let docs = users
        .find(&json!({"name": "x' OR '1'='1"}))
        .unwrap();
    assert!(docs.is_empty());
    assert!(matches!(
        store.collection("users\"; DROP TABLE users; --"),
        Err(DbError::InvalidIdentifier(_))
    ));
    assert_eq!(users.count_documents(&json!({})).unwrap(), 4);
}
