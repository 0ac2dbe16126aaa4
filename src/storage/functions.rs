//! User functions registered on every connection.

use lru::LruCache;
use regex::Regex;
use rusqlite::functions::FunctionFlags;
use rusqlite::types::ValueRef;
use rusqlite::Connection;
use std::num::NonZeroUsize;
use std::sync::{Mutex, PoisonError};

/// SQLite rewrites `X REGEXP Y` into `regexp(Y, X)`.
pub const REGEXP_FUNCTION: &str = "regexp";

type PatternCache = LruCache<String, Option<Regex>>;

/// Register `regexp(pattern, value)`.
///
/// A pattern that fails to compile matches nothing; the failure is cached
/// like a compiled pattern so it is reported once, not once per row.
pub fn register_regexp(conn: &Connection, cache_size: NonZeroUsize) -> rusqlite::Result<()> {
    let cache: Mutex<PatternCache> = Mutex::new(LruCache::new(cache_size));

    conn.create_scalar_function(
        REGEXP_FUNCTION,
        2,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        move |ctx| {
            let pattern = match ctx.get_raw(0) {
                ValueRef::Text(bytes) => String::from_utf8_lossy(bytes).into_owned(),
                _ => return Ok(false),
            };
            let subject = match ctx.get_raw(1) {
                ValueRef::Text(bytes) => String::from_utf8_lossy(bytes).into_owned(),
                ValueRef::Integer(i) => i.to_string(),
                ValueRef::Real(f) => f.to_string(),
                ValueRef::Null | ValueRef::Blob(_) => return Ok(false),
            };

            let mut cache = cache.lock().unwrap_or_else(PoisonError::into_inner);
            Ok(is_match(&mut cache, &pattern, &subject))
        },
    )
}

fn is_match(cache: &mut PatternCache, pattern: &str, subject: &str) -> bool {
    if let Some(compiled) = cache.get(pattern) {
        return compiled.as_ref().is_some_and(|re| re.is_match(subject));
    }

    let compiled = match Regex::new(pattern) {
        Ok(re) => Some(re),
        Err(e) => {
            tracing::debug!("Invalid $regex pattern {:?} matches nothing: {}", pattern, e);
            None
        }
    };
    let matched = compiled.as_ref().is_some_and(|re| re.is_match(subject));
    cache.put(pattern.to_string(), compiled);
    matched
}
