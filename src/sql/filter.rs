//! Predicate compiler.
//!
//! A query object such as `{"country": "USA", "age": {"$gt": 18}}` is parsed
//! into a [`Filter`] (one [`FieldFilter`] per field, conjoined) and compiled
//! to a boolean SQL expression over `json_extract(document, ...)` plus the
//! literals to bind, in field order.

use super::identifier::FieldPath;
use super::{bind_value, CompiledStatement, SqlValue};
use crate::error::{DbError, DbResult};
use serde_json::{Map, Value};

/// Comparison operators accepted in operator objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl CompareOp {
    pub fn from_operator(op: &str) -> Option<Self> {
        match op {
            "$eq" => Some(CompareOp::Eq),
            "$ne" => Some(CompareOp::Ne),
            "$gt" => Some(CompareOp::Gt),
            "$gte" => Some(CompareOp::Gte),
            "$lt" => Some(CompareOp::Lt),
            "$lte" => Some(CompareOp::Lte),
            _ => None,
        }
    }

    pub fn operator(self) -> &'static str {
        match self {
            CompareOp::Eq => "$eq",
            CompareOp::Ne => "$ne",
            CompareOp::Gt => "$gt",
            CompareOp::Gte => "$gte",
            CompareOp::Lt => "$lt",
            CompareOp::Lte => "$lte",
        }
    }

    fn as_sql(self, operand: &Value) -> &'static str {
        match (self, operand.is_null()) {
            (CompareOp::Eq, true) => "IS",
            (CompareOp::Ne, true) => "IS NOT",
            (CompareOp::Eq, false) => "=",
            (CompareOp::Ne, false) => "!=",
            (CompareOp::Gt, _) => ">",
            (CompareOp::Gte, _) => ">=",
            (CompareOp::Lt, _) => "<",
            (CompareOp::Lte, _) => "<=",
        }
    }
}

/// The condition applied to one field.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// `field: literal`
    Equals(Value),
    /// `field: {$in: [...]}`
    In(Vec<Value>),
    /// `field: {$regex: pattern}`, with any `$options` folded into the pattern
    Regex(String),
    /// `field: {$gt: v}` and friends
    Compare(CompareOp, Value),
}

impl Condition {
    /// Operator name used in error reports; implicit equality reports `$eq`.
    pub fn operator(&self) -> &'static str {
        match self {
            Condition::Equals(_) => "$eq",
            Condition::In(_) => "$in",
            Condition::Regex(_) => "$regex",
            Condition::Compare(op, _) => op.operator(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldFilter {
    pub path: FieldPath,
    pub condition: Condition,
}

impl FieldFilter {
    fn compile_into(&self, sql: &mut Vec<String>, params: &mut Vec<SqlValue>) {
        let expr = self.path.extract_expr();
        match &self.condition {
            Condition::Equals(value) => {
                let op = CompareOp::Eq.as_sql(value);
                sql.push(format!("{} {} ?", expr, op));
                params.push(bind_value(value));
            }
            Condition::In(values) => {
                let placeholders = vec!["?"; values.len()].join(", ");
                sql.push(format!("{} IN ({})", expr, placeholders));
                params.extend(values.iter().map(bind_value));
            }
            Condition::Regex(pattern) => {
                sql.push(format!("{} REGEXP ?", expr));
                params.push(SqlValue::Text(pattern.clone()));
            }
            Condition::Compare(op, value) => {
                sql.push(format!("{} {} ?", expr, op.as_sql(value)));
                params.push(bind_value(value));
            }
        }
    }
}

/// A conjunction of per-field conditions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    clauses: Vec<FieldFilter>,
}

impl Filter {
    /// Filter that matches every document.
    pub fn all() -> Self {
        Self::default()
    }

    /// Parse a query object. `null` is treated as the empty query.
    pub fn parse(query: &Value) -> DbResult<Self> {
        match query {
            Value::Null => Ok(Self::all()),
            Value::Object(fields) => {
                let clauses = fields
                    .iter()
                    .map(|(field, value)| parse_field(field, value))
                    .collect::<DbResult<Vec<_>>>()?;
                Ok(Self { clauses })
            }
            other => Err(DbError::InvalidDocument(format!(
                "query must be an object, got {}",
                other
            ))),
        }
    }

    pub fn clauses(&self) -> &[FieldFilter] {
        &self.clauses
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Conjoin another filter's clauses after this one's.
    pub fn and(mut self, other: Filter) -> Self {
        self.clauses.extend(other.clauses);
        self
    }

    /// Fail with `UnsupportedOperator` unless every clause uses `operator`.
    pub fn ensure_only(&self, operator: &str) -> DbResult<()> {
        match self
            .clauses
            .iter()
            .find(|clause| clause.condition.operator() != operator)
        {
            Some(clause) => Err(DbError::unsupported_operator(
                clause.path.as_str(),
                clause.condition.operator(),
            )),
            None => Ok(()),
        }
    }

    /// Compile to a bare boolean expression; empty text when matching all.
    pub fn compile(&self) -> CompiledStatement {
        let mut sql = Vec::with_capacity(self.clauses.len());
        let mut params = Vec::new();
        for clause in &self.clauses {
            clause.compile_into(&mut sql, &mut params);
        }
        CompiledStatement::new(sql.join(" AND "), params)
    }

    /// Compile to ` WHERE <expr>`, or an empty clause when matching all.
    pub fn where_clause(&self) -> CompiledStatement {
        let compiled = self.compile();
        if compiled.sql.is_empty() {
            compiled
        } else {
            CompiledStatement::new(format!(" WHERE {}", compiled.sql), compiled.params)
        }
    }
}

fn parse_field(field: &str, value: &Value) -> DbResult<FieldFilter> {
    if field.starts_with('$') {
        // top-level logical operators ($or, $and, ...) are not supported
        return Err(DbError::unsupported_operator(field, field));
    }
    let path = FieldPath::parse(field)?;
    let condition = match value {
        Value::Object(ops) if ops.keys().any(|k| k.starts_with('$')) => {
            parse_operator(field, ops)?
        }
        literal => Condition::Equals(literal.clone()),
    };
    Ok(FieldFilter { path, condition })
}

fn parse_operator(field: &str, ops: &Map<String, Value>) -> DbResult<Condition> {
    if let Some(pattern) = ops.get("$regex") {
        return parse_regex(field, pattern, ops);
    }

    let mut entries = ops.iter();
    let (op, operand) = match (entries.next(), entries.next()) {
        (Some(entry), None) => entry,
        _ => {
            let names: Vec<&str> = ops.keys().map(String::as_str).collect();
            return Err(DbError::unsupported_operator(field, &names.join(", ")));
        }
    };

    match op.as_str() {
        "$in" => match operand {
            Value::Array(values) => Ok(Condition::In(values.clone())),
            _ => Err(DbError::unsupported_operator(field, "$in")),
        },
        other => CompareOp::from_operator(other)
            .map(|cmp| Condition::Compare(cmp, operand.clone()))
            .ok_or_else(|| DbError::unsupported_operator(field, other)),
    }
}

fn parse_regex(field: &str, pattern: &Value, ops: &Map<String, Value>) -> DbResult<Condition> {
    let pattern = pattern
        .as_str()
        .ok_or_else(|| DbError::unsupported_operator(field, "$regex"))?;

    if let Some(extra) = ops.keys().find(|k| *k != "$regex" && *k != "$options") {
        return Err(DbError::unsupported_operator(field, extra));
    }

    match ops.get("$options") {
        None => Ok(Condition::Regex(pattern.to_string())),
        Some(Value::String(flags)) if flags.is_empty() => Ok(Condition::Regex(pattern.to_string())),
        Some(Value::String(flags)) if flags.chars().all(|c| "imsx".contains(c)) => {
            Ok(Condition::Regex(format!("(?{}){}", flags, pattern)))
        }
        Some(_) => Err(DbError::unsupported_operator(field, "$options")),
    }
}
