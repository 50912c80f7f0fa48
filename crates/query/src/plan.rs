//! The execution plan.
//!
//! A plan is the linear operator chain the executor will spawn, source
//! first. Group keys and aggregate results travel under planner-assigned
//! bindings (`$group_N`, `$agg_N`); downstream clauses were rewritten to
//! reference them when the plan was built.

use crate::error::{Error, Result};
use crate::expr::Expr;
use crate::stmt::{Direction, JoinType};
use quill_catalog::ScanShape;
use quill_value::Value;
use std::collections::BTreeMap;

/// A grouping expression and the binding its value is emitted under.
#[derive(Debug, Clone)]
pub struct GroupKey {
    pub binding: String,
    pub expr: Expr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateFunc {
    Count,
    Sum,
    Avg,
    Min,
    Max,
    ArrayAgg,
}

impl AggregateFunc {
    pub fn from_name(name: &str) -> Result<AggregateFunc> {
        Ok(match name {
            "COUNT" => AggregateFunc::Count,
            "SUM" => AggregateFunc::Sum,
            "AVG" => AggregateFunc::Avg,
            "MIN" => AggregateFunc::Min,
            "MAX" => AggregateFunc::Max,
            "ARRAY_AGG" => AggregateFunc::ArrayAgg,
            other => return Err(Error::Internal(format!("unknown aggregate {}", other))),
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            AggregateFunc::Count => "COUNT",
            AggregateFunc::Sum => "SUM",
            AggregateFunc::Avg => "AVG",
            AggregateFunc::Min => "MIN",
            AggregateFunc::Max => "MAX",
            AggregateFunc::ArrayAgg => "ARRAY_AGG",
        }
    }
}

/// One aggregate accumulator: `arg` of `None` is COUNT(*).
#[derive(Debug, Clone)]
pub struct AggregateCall {
    pub binding: String,
    pub func: AggregateFunc,
    pub distinct: bool,
    pub arg: Option<Expr>,
}

/// One entry of the projection list, names already resolved.
#[derive(Debug, Clone)]
pub struct Projection {
    pub star: bool,
    pub expr: Option<Expr>,
    pub alias: Option<String>,
}

#[derive(Debug, Clone)]
pub enum Stage {
    /// Emits a single empty item; the source for FROM-less selects.
    Dummy,
    Scan {
        bucket: String,
        alias: String,
        shape: ScanShape,
    },
    /// Emits one item binding the bucket's document count; the collapsed
    /// form of the bare `SELECT COUNT(*) FROM b` chain.
    CountScan {
        bucket: String,
        binding: String,
    },
    KeyJoin {
        bucket: String,
        alias: String,
        join_type: JoinType,
        /// KEYS (array of keys) vs KEY (single key).
        many: bool,
        keys: Expr,
    },
    Filter {
        condition: Expr,
    },
    Group {
        keys: Vec<GroupKey>,
        aggregates: Vec<AggregateCall>,
    },
    Order {
        by: Vec<(Expr, Direction)>,
    },
    Offset(u64),
    Limit(u64),
    Project {
        result: Vec<Projection>,
    },
    Distinct,
    /// Emits a single description of the plan it replaced.
    Explain {
        description: Value,
    },
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Dummy => "dummy",
            Stage::Scan { .. } => "scan",
            Stage::CountScan { .. } => "count-scan",
            Stage::KeyJoin { .. } => "key-join",
            Stage::Filter { .. } => "filter",
            Stage::Group { .. } => "group",
            Stage::Order { .. } => "order",
            Stage::Offset(_) => "offset",
            Stage::Limit(_) => "limit",
            Stage::Project { .. } => "project",
            Stage::Distinct => "distinct",
            Stage::Explain { .. } => "explain",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Plan {
    /// Pool override from the statement; the engine's default applies when
    /// absent.
    pub pool: Option<String>,
    pub stages: Vec<Stage>,
}

impl Plan {
    /// The plan as a value, for EXPLAIN output.
    pub fn describe(&self) -> Value {
        let stages: Vec<Value> = self.stages.iter().map(describe_stage).collect();
        let mut root = BTreeMap::new();
        root.insert("plan".to_string(), Value::Array(stages));
        Value::Object(root)
    }
}

fn describe_stage(stage: &Stage) -> Value {
    let mut fields = BTreeMap::new();
    fields.insert(
        "operator".to_string(),
        Value::string(stage.name().to_string()),
    );
    match stage {
        Stage::Dummy | Stage::Distinct | Stage::Explain { .. } => {}
        Stage::Scan {
            bucket,
            alias,
            shape,
        } => {
            fields.insert("bucket".to_string(), Value::string(bucket.clone()));
            fields.insert("as".to_string(), Value::string(alias.clone()));
            if *shape == ScanShape::KeysOnly {
                fields.insert("shape".to_string(), Value::string("keys-only"));
            }
        }
        Stage::CountScan { bucket, .. } => {
            fields.insert("bucket".to_string(), Value::string(bucket.clone()));
        }
        Stage::KeyJoin {
            bucket,
            alias,
            join_type,
            many,
            keys,
        } => {
            fields.insert("bucket".to_string(), Value::string(bucket.clone()));
            fields.insert("as".to_string(), Value::string(alias.clone()));
            fields.insert("type".to_string(), Value::string(join_type.to_string()));
            fields.insert(
                if *many { "keys" } else { "key" }.to_string(),
                Value::string(keys.to_string()),
            );
        }
        Stage::Filter { condition } => {
            fields.insert("condition".to_string(), Value::string(condition.to_string()));
        }
        Stage::Group { keys, aggregates } => {
            fields.insert(
                "by".to_string(),
                Value::Array(
                    keys.iter()
                        .map(|k| Value::string(k.expr.to_string()))
                        .collect(),
                ),
            );
            fields.insert(
                "aggregates".to_string(),
                Value::Array(
                    aggregates
                        .iter()
                        .map(|a| {
                            let arg = match &a.arg {
                                None => "*".to_string(),
                                Some(expr) if a.distinct => format!("DISTINCT {}", expr),
                                Some(expr) => expr.to_string(),
                            };
                            Value::string(format!("{}({})", a.func.name(), arg))
                        })
                        .collect(),
                ),
            );
        }
        Stage::Order { by } => {
            fields.insert(
                "by".to_string(),
                Value::Array(
                    by.iter()
                        .map(|(expr, direction)| {
                            let suffix = match direction {
                                Direction::Asc => "ASC",
                                Direction::Desc => "DESC",
                            };
                            Value::string(format!("{} {}", expr, suffix))
                        })
                        .collect(),
                ),
            );
        }
        Stage::Offset(n) => {
            fields.insert("count".to_string(), Value::Number(*n as f64));
        }
        Stage::Limit(n) => {
            fields.insert("count".to_string(), Value::Number(*n as f64));
        }
        Stage::Project { result } => {
            fields.insert(
                "result".to_string(),
                Value::Array(
                    result
                        .iter()
                        .map(|p| {
                            Value::string(match (&p.expr, p.star) {
                                (None, _) => "*".to_string(),
                                (Some(expr), true) => format!("{}.*", expr),
                                (Some(expr), false) => match &p.alias {
                                    Some(alias) => format!("{} AS {}", expr, alias),
                                    None => expr.to_string(),
                                },
                            })
                        })
                        .collect(),
                ),
            );
        }
    }
    Value::Object(fields)
}
