//! Aggregation compiler.
//!
//! Folds a `$match` / `$group` pipeline into a single SELECT. All `$match`
//! stages are conjoined and applied before grouping; the last `$group`
//! stage determines the projection.

use super::filter::Filter;
use super::identifier::{quote_identifier, FieldPath, ID_FIELD};
use super::{bind_value, CompiledStatement, SqlValue};
use crate::error::{DbError, DbResult};
use serde_json::{Map, Value};

/// Output key holding the group value in each result row.
pub const GROUP_KEY: &str = "groupKey";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccumulatorOp {
    Sum,
    Avg,
    Count,
    Min,
    Max,
}

impl AccumulatorOp {
    pub fn from_operator(op: &str) -> Option<Self> {
        match op {
            "$sum" => Some(AccumulatorOp::Sum),
            "$avg" => Some(AccumulatorOp::Avg),
            "$count" => Some(AccumulatorOp::Count),
            "$min" => Some(AccumulatorOp::Min),
            "$max" => Some(AccumulatorOp::Max),
            _ => None,
        }
    }

    fn sql_function(self) -> &'static str {
        match self {
            AccumulatorOp::Sum => "SUM",
            AccumulatorOp::Avg => "AVG",
            AccumulatorOp::Count => "COUNT",
            AccumulatorOp::Min => "MIN",
            AccumulatorOp::Max => "MAX",
        }
    }
}

/// What an accumulator reads from each row.
#[derive(Debug, Clone, PartialEq)]
pub enum AccumulatorInput {
    /// Value at a field path; missing or null counts as 0.
    Field(FieldPath),
    /// A numeric constant, e.g. `{"$sum": 1}`.
    Constant(Value),
    /// No operand (`$count`).
    Rows,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Accumulator {
    pub name: String,
    pub op: AccumulatorOp,
    pub input: AccumulatorInput,
}

impl Accumulator {
    fn parse(name: &str, spec: &Value) -> DbResult<Self> {
        let spec = spec.as_object().ok_or_else(|| {
            DbError::InvalidDocument(format!("accumulator '{}' must be an operator object", name))
        })?;
        let mut entries = spec.iter();
        let (op_name, operand) = match (entries.next(), entries.next()) {
            (Some(entry), None) => entry,
            _ => {
                let names: Vec<&str> = spec.keys().map(String::as_str).collect();
                return Err(DbError::UnsupportedAggregationOperator(names.join(", ")));
            }
        };

        let op = AccumulatorOp::from_operator(op_name)
            .ok_or_else(|| DbError::UnsupportedAggregationOperator(op_name.clone()))?;

        let input = match (op, operand) {
            (AccumulatorOp::Count, _) => AccumulatorInput::Rows,
            (_, Value::String(reference)) => {
                AccumulatorInput::Field(FieldPath::parse_reference(reference)?)
            }
            (_, Value::Number(_)) => AccumulatorInput::Constant(operand.clone()),
            _ => {
                return Err(DbError::InvalidDocument(format!(
                    "{} operand for '{}' must be a field path or a number",
                    op_name, name
                )))
            }
        };

        Ok(Self {
            name: name.to_string(),
            op,
            input,
        })
    }

    fn compile_into(&self, columns: &mut Vec<String>, params: &mut Vec<SqlValue>) {
        let function = self.op.sql_function();
        match &self.input {
            AccumulatorInput::Rows => columns.push(format!("{}(*)", function)),
            AccumulatorInput::Field(path) => {
                columns.push(format!("{}(COALESCE({}, 0))", function, path.extract_expr()))
            }
            AccumulatorInput::Constant(value) => {
                columns.push(format!("{}(?)", function));
                params.push(bind_value(value));
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GroupStage {
    /// Grouping field; `None` when `_id` is null (one group for all rows).
    pub key: Option<FieldPath>,
    pub accumulators: Vec<Accumulator>,
}

impl GroupStage {
    fn parse(spec: &Value) -> DbResult<Self> {
        let spec = spec
            .as_object()
            .ok_or_else(|| DbError::InvalidDocument("$group must be an object".to_string()))?;

        let key = match spec.get(ID_FIELD) {
            None => return Err(DbError::MissingGroupId),
            Some(Value::Null) => None,
            Some(Value::String(reference)) => Some(FieldPath::parse_reference(reference)?),
            Some(other) => {
                return Err(DbError::InvalidDocument(format!(
                    "$group _id must name a single field path, got {}",
                    other
                )))
            }
        };

        let accumulators = spec
            .iter()
            .filter(|(name, _)| name.as_str() != ID_FIELD)
            .map(|(name, acc)| Accumulator::parse(name, acc))
            .collect::<DbResult<Vec<_>>>()?;

        Ok(Self { key, accumulators })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stage {
    Match(Filter),
    Group(GroupStage),
}

impl Stage {
    fn parse(stage: &Value) -> DbResult<Self> {
        let stage = stage.as_object().ok_or_else(|| {
            DbError::InvalidDocument(format!("pipeline stage must be an object, got {}", stage))
        })?;
        let (kind, body) = single_entry(stage).ok_or_else(|| {
            DbError::InvalidDocument("pipeline stage must contain exactly one key".to_string())
        })?;

        match kind.as_str() {
            "$match" => Ok(Stage::Match(Filter::parse(body)?)),
            "$group" => Ok(Stage::Group(GroupStage::parse(body)?)),
            other => Err(DbError::UnsupportedPipelineStage(other.to_string())),
        }
    }
}

fn single_entry(map: &Map<String, Value>) -> Option<(&String, &Value)> {
    let mut entries = map.iter();
    match (entries.next(), entries.next()) {
        (Some(entry), None) => Some(entry),
        _ => None,
    }
}

/// Shape of the rows a compiled pipeline produces.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineOutput {
    /// `_id, document` rows, decoded as documents.
    Documents,
    /// Group key JSON text followed by one column per named accumulator.
    Groups { names: Vec<String> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompiledPipeline {
    pub statement: CompiledStatement,
    pub output: PipelineOutput,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Pipeline {
    stages: Vec<Stage>,
}

impl Pipeline {
    /// Parse a pipeline array.
    pub fn parse(pipeline: &Value) -> DbResult<Self> {
        let stages = pipeline.as_array().ok_or_else(|| {
            DbError::InvalidDocument(format!("pipeline must be an array, got {}", pipeline))
        })?;
        let stages = stages.iter().map(Stage::parse).collect::<DbResult<Vec<_>>>()?;
        Ok(Self { stages })
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Conjunction of every `$match` stage, in pipeline order.
    pub fn filter(&self) -> Filter {
        self.stages
            .iter()
            .filter_map(|stage| match stage {
                Stage::Match(filter) => Some(filter.clone()),
                Stage::Group(_) => None,
            })
            .fold(Filter::all(), Filter::and)
    }

    /// The effective `$group` stage; a later one supersedes an earlier one.
    pub fn group(&self) -> Option<&GroupStage> {
        self.stages.iter().rev().find_map(|stage| match stage {
            Stage::Group(group) => Some(group),
            Stage::Match(_) => None,
        })
    }

    /// Compile against a collection table.
    pub fn compile(&self, collection: &str) -> DbResult<CompiledPipeline> {
        let table = quote_identifier(collection)?;
        let filter = self.filter().where_clause();

        let group = match self.group() {
            Some(group) => group,
            None => {
                let sql = format!("SELECT _id, document FROM {}{}", table, filter.sql);
                return Ok(CompiledPipeline {
                    statement: CompiledStatement::new(sql, filter.params),
                    output: PipelineOutput::Documents,
                });
            }
        };

        // any member of a group carries its JSON type back out
        let key_expr = group
            .key
            .as_ref()
            .map(|key| format!("MIN({})", key.json_expr()))
            .unwrap_or_else(|| "NULL".to_string());

        let mut columns = vec![key_expr];
        let mut params = Vec::new();
        for acc in &group.accumulators {
            acc.compile_into(&mut columns, &mut params);
        }
        params.extend(filter.params);

        let tail = match &group.key {
            Some(key) => format!(" GROUP BY {}", key.group_by_expr()),
            // an ungrouped aggregate yields one row even for an empty input
            None => " HAVING COUNT(*) > 0".to_string(),
        };

        let sql = format!(
            "SELECT {} FROM {}{}{}",
            columns.join(", "),
            table,
            filter.sql,
            tail
        );

        Ok(CompiledPipeline {
            statement: CompiledStatement::new(sql, params),
            output: PipelineOutput::Groups {
                names: group.accumulators.iter().map(|a| a.name.clone()).collect(),
            },
        })
    }
}
