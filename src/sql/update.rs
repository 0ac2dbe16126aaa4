//! Update compiler: `{"$set": {path: value, ...}}` to a `json_set` assignment.

use super::identifier::{FieldPath, DOCUMENT_COLUMN, ID_FIELD};
use super::{CompiledStatement, SqlValue};
use crate::error::{DbError, DbResult};
use serde_json::Value;

const SET: &str = "$set";

/// Replace the value at `path` with `value`.
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub path: FieldPath,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Update {
    assignments: Vec<Assignment>,
}

impl Update {
    /// Parse an update object. Only `$set` is accepted.
    pub fn parse(update: &Value) -> DbResult<Self> {
        let operators = update.as_object().ok_or_else(|| {
            DbError::UnsupportedUpdateOperator(format!("update must be an object, got {}", update))
        })?;

        if let Some(other) = operators.keys().find(|k| k.as_str() != SET) {
            return Err(DbError::UnsupportedUpdateOperator(other.clone()));
        }

        let fields = match operators.get(SET) {
            Some(Value::Object(fields)) => fields,
            Some(_) => {
                return Err(DbError::InvalidDocument(
                    "$set must map field paths to values".to_string(),
                ))
            }
            None => {
                return Err(DbError::UnsupportedUpdateOperator(
                    "update must contain $set".to_string(),
                ))
            }
        };

        if fields.is_empty() {
            return Err(DbError::InvalidDocument(
                "$set requires at least one field".to_string(),
            ));
        }

        let assignments = fields
            .iter()
            .map(|(field, value)| {
                let path = FieldPath::parse(field)?;
                if path.segments().next() == Some(ID_FIELD) {
                    return Err(DbError::InvalidDocument(format!(
                        "cannot modify immutable field '{}'",
                        field
                    )));
                }
                Ok(Assignment {
                    path,
                    value: value.clone(),
                })
            })
            .collect::<DbResult<Vec<_>>>()?;

        Ok(Self { assignments })
    }

    pub fn assignments(&self) -> &[Assignment] {
        &self.assignments
    }

    /// Compile to `document = json_set(document, '$.a', json(?), ...)`.
    ///
    /// Values are bound as JSON text and passed through `json()` so strings,
    /// booleans and nested containers keep their JSON type in the blob.
    ///
    /// Missing intermediate objects are created. A path that runs through a
    /// scalar or array (`a.b` where `a` is a string) is left untouched,
    /// though the row still counts as written.
    pub fn compile(&self) -> CompiledStatement {
        let mut args = Vec::with_capacity(self.assignments.len());
        let mut params = Vec::with_capacity(self.assignments.len());
        for assignment in &self.assignments {
            args.push(format!("'{}', json(?)", assignment.path.json_path()));
            params.push(SqlValue::Text(assignment.value.to_string()));
        }
        let sql = format!(
            "{col} = json_set({col}, {})",
            args.join(", "),
            col = DOCUMENT_COLUMN
        );
        CompiledStatement::new(sql, params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_single_set() {
        let compiled = Update::parse(&json!({"$set": {"age": 31}})).unwrap().compile();
        assert_eq!(
            compiled.sql,
            "document = json_set(document, '$.age', json(?))"
        );
        assert_eq!(compiled.params, vec![SqlValue::Text("31".into())]);
    }

    #[test]
    fn test_multiple_paths_in_order() {
        let update = Update::parse(&json!({"$set": {"name": "Bob", "address.city": "Lyon", "tags": ["a"]}}))
            .unwrap();
        let compiled = update.compile();
        assert_eq!(
            compiled.sql,
            "document = json_set(document, '$.name', json(?), '$.address.city', json(?), '$.tags', json(?))"
        );
        assert_eq!(
            compiled.params,
            vec![
                SqlValue::Text("\"Bob\"".into()),
                SqlValue::Text("\"Lyon\"".into()),
                SqlValue::Text("[\"a\"]".into()),
            ]
        );
    }

    #[test]
    fn test_requires_set() {
        assert!(matches!(
            Update::parse(&json!({"name": "Bob"})),
            Err(DbError::UnsupportedUpdateOperator(_))
        ));
        assert!(matches!(
            Update::parse(&json!({})),
            Err(DbError::UnsupportedUpdateOperator(_))
        ));
    }

    #[test]
    fn test_rejects_other_operators() {
        match Update::parse(&json!({"$set": {"a": 1}, "$inc": {"b": 1}})) {
            Err(DbError::UnsupportedUpdateOperator(op)) => assert_eq!(op, "$inc"),
            other => panic!("unexpected result {:?}", other),
        }
        assert!(matches!(
            Update::parse(&json!({"$unset": {"a": ""}})),
            Err(DbError::UnsupportedUpdateOperator(_))
        ));
    }

    #[test]
    fn test_rejects_invalid_paths() {
        assert!(matches!(
            Update::parse(&json!({"$set": {"a') --": 1}})),
            Err(DbError::InvalidIdentifier(_))
        ));
    }

    #[test]
    fn test_id_is_immutable() {
        assert!(matches!(
            Update::parse(&json!({"$set": {"_id": "other"}})),
            Err(DbError::InvalidDocument(_))
        ));
        assert!(Update::parse(&json!({"$set": {"meta._id": "ok"}})).is_ok());
    }

    #[test]
    fn test_empty_set_rejected() {
        assert!(matches!(
            Update::parse(&json!({"$set": {}})),
            Err(DbError::InvalidDocument(_))
        ));
    }
}
