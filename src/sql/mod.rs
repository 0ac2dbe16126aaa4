//! Compilers from document-style query, update and pipeline objects to
//! parameterized SQL over the `document` JSON column.
//!
//! Every compiler returns statement text together with the positional
//! parameters it references, in the order the placeholders appear.

pub mod filter;
pub mod identifier;
pub mod pipeline;
pub mod update;

pub use filter::{CompareOp, Condition, FieldFilter, Filter};
pub use identifier::{
    index_name, quote_identifier, validate_identifier, FieldPath, DOCUMENT_COLUMN, ID_FIELD,
};
pub use pipeline::{
    Accumulator, AccumulatorInput, AccumulatorOp, CompiledPipeline, GroupStage, Pipeline,
    PipelineOutput, Stage, GROUP_KEY,
};
pub use update::{Assignment, Update};

pub use rusqlite::types::Value as SqlValue;
use serde_json::{Number, Value};

/// Statement text plus its positional parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledStatement {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

impl CompiledStatement {
    pub fn new(sql: impl Into<String>, params: Vec<SqlValue>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }
}

/// Convert a JSON literal into the SQL value `json_extract` would produce
/// for the same JSON, so comparisons line up with extracted values.
///
/// `json_extract` yields `1`/`0` for `true`/`false`, so a boolean literal
/// in a predicate also matches the numbers `1` and `0` (and vice versa).
pub fn bind_value(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Number(n) => number_to_sql(n),
        Value::String(s) => SqlValue::Text(s.clone()),
        // json_extract returns minified JSON text for containers
        Value::Array(_) | Value::Object(_) => SqlValue::Text(value.to_string()),
    }
}

fn number_to_sql(n: &Number) -> SqlValue {
    if let Some(i) = n.as_i64() {
        SqlValue::Integer(i)
    } else {
        SqlValue::Real(n.as_f64().unwrap_or(f64::NAN))
    }
}

/// Convert a SQL result value back into JSON.
pub fn sql_to_json(value: SqlValue) -> Value {
    match value {
        SqlValue::Null => Value::Null,
        SqlValue::Integer(i) => Value::from(i),
        SqlValue::Real(f) => Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null),
        SqlValue::Text(s) => Value::String(s),
        SqlValue::Blob(bytes) => Value::String(String::from_utf8_lossy(&bytes).into_owned()),
    }
}

/// Parse JSON text produced by the `->` operator (NULL for missing paths).
pub fn json_text_to_value(text: Option<String>) -> serde_json::Result<Value> {
    match text {
        Some(text) => serde_json::from_str(&text),
        None => Ok(Value::Null),
    }
}
