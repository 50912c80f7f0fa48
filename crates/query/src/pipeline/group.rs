//! The group/aggregate operator.
//!
//! Buffers the upstream, keying groups by the canonical collation encoding
//! of the grouping tuple — MISSING and NULL key different groups. Each group
//! carries one accumulator per planned aggregate call; DISTINCT aggregates
//! deduplicate their input by the same encoding. On drain, one item per
//! group is emitted holding the group-key bindings and the aggregate
//! results.

use super::base::{Operator, Output};
use crate::error::Result;
use crate::expr::{EvalContext, EvalError};
use crate::plan::{AggregateCall, AggregateFunc, GroupKey};
use async_trait::async_trait;
use quill_value::{collate, encode_tuple, encoded, Item, Value};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};

pub struct Group {
    pub keys: Vec<GroupKey>,
    pub aggregates: Vec<AggregateCall>,
    /// Group states by encoded key; a BTreeMap so emission order is
    /// deterministic.
    pub groups: BTreeMap<Vec<u8>, GroupState>,
}

impl Group {
    pub fn new(keys: Vec<GroupKey>, aggregates: Vec<AggregateCall>) -> Self {
        Group {
            keys,
            aggregates,
            groups: BTreeMap::new(),
        }
    }
}

pub struct GroupState {
    key_values: Vec<Value>,
    accumulators: Vec<Box<dyn Accumulator>>,
}

impl GroupState {
    fn new(aggregates: &[AggregateCall], key_values: Vec<Value>) -> Self {
        GroupState {
            key_values,
            accumulators: aggregates.iter().map(accumulator_for).collect(),
        }
    }
}

#[async_trait]
impl Operator for Group {
    fn name(&self) -> &'static str {
        "group"
    }

    async fn process_item(&mut self, item: Item, _output: &mut Output) -> Result<bool> {
        let ctx = EvalContext::item(&item);

        let mut key_values = Vec::with_capacity(self.keys.len());
        for key in &self.keys {
            let value = match key.expr.evaluate(&ctx) {
                Ok(value) => value,
                // a document without the key groups under MISSING
                Err(EvalError::Undefined(_)) => Value::Missing,
                Err(EvalError::Fatal(error)) => return Err(error),
            };
            key_values.push(value);
        }

        let state = self
            .groups
            .entry(encode_tuple(&key_values))
            .or_insert_with(|| GroupState::new(&self.aggregates, key_values));

        for (call, accumulator) in self.aggregates.iter().zip(state.accumulators.iter_mut()) {
            let input = match &call.arg {
                // COUNT(*): every row counts
                None => Value::Bool(true),
                Some(arg) => match arg.evaluate(&ctx) {
                    Ok(value) => value,
                    Err(EvalError::Undefined(_)) => Value::Missing,
                    Err(EvalError::Fatal(error)) => return Err(error),
                },
            };
            accumulator.add(input);
        }
        Ok(true)
    }

    async fn after_items(&mut self, output: &mut Output) -> Result<()> {
        // aggregates over an empty input still produce one row when nothing
        // was grouped by
        if self.groups.is_empty() && self.keys.is_empty() && !self.aggregates.is_empty() {
            self.groups
                .insert(Vec::new(), GroupState::new(&self.aggregates, Vec::new()));
        }

        for (_, state) in std::mem::take(&mut self.groups) {
            let mut fields = BTreeMap::new();
            for (key, value) in self.keys.iter().zip(state.key_values) {
                fields.insert(key.binding.clone(), value);
            }
            for (call, accumulator) in self.aggregates.iter().zip(state.accumulators) {
                fields.insert(call.binding.clone(), accumulator.finalize());
            }
            if !output.send(Item::new(Value::Object(fields))).await {
                return Ok(());
            }
        }
        Ok(())
    }
}

/// One running aggregate within one group.
trait Accumulator: Send {
    fn add(&mut self, value: Value);
    fn finalize(self: Box<Self>) -> Value;
}

fn accumulator_for(call: &AggregateCall) -> Box<dyn Accumulator> {
    let base: Box<dyn Accumulator> = match call.func {
        AggregateFunc::Count => Box::new(CountAccumulator {
            star: call.arg.is_none(),
            count: 0,
        }),
        AggregateFunc::Sum => Box::new(SumAccumulator::default()),
        AggregateFunc::Avg => Box::new(AvgAccumulator::default()),
        AggregateFunc::Min => Box::new(ExtremumAccumulator { min: true, best: None }),
        AggregateFunc::Max => Box::new(ExtremumAccumulator { min: false, best: None }),
        AggregateFunc::ArrayAgg => Box::new(ArrayAggAccumulator { values: Vec::new() }),
    };
    if call.distinct {
        Box::new(DistinctAccumulator {
            seen: HashSet::new(),
            inner: base,
        })
    } else {
        base
    }
}

/// Deduplicates input by collation equality before feeding the wrapped
/// accumulator.
struct DistinctAccumulator {
    seen: HashSet<Vec<u8>>,
    inner: Box<dyn Accumulator>,
}

impl Accumulator for DistinctAccumulator {
    fn add(&mut self, value: Value) {
        if self.seen.insert(encoded(&value)) {
            self.inner.add(value);
        }
    }

    fn finalize(self: Box<Self>) -> Value {
        self.inner.finalize()
    }
}

/// COUNT(*) counts rows; COUNT(expr) counts valued inputs.
struct CountAccumulator {
    star: bool,
    count: u64,
}

impl Accumulator for CountAccumulator {
    fn add(&mut self, value: Value) {
        if self.star || value.is_valued() {
            self.count += 1;
        }
    }

    fn finalize(self: Box<Self>) -> Value {
        Value::Number(self.count as f64)
    }
}

/// SUM skips NULL/MISSING; a valued non-number poisons the result to NULL,
/// mirroring arithmetic. No numeric input at all is NULL.
#[derive(Default)]
struct SumAccumulator {
    sum: f64,
    any: bool,
    poisoned: bool,
}

impl Accumulator for SumAccumulator {
    fn add(&mut self, value: Value) {
        match value {
            Value::Number(n) => {
                self.sum += n;
                self.any = true;
            }
            Value::Null | Value::Missing => {}
            _ => self.poisoned = true,
        }
    }

    fn finalize(self: Box<Self>) -> Value {
        if self.poisoned || !self.any {
            Value::Null
        } else {
            Value::Number(self.sum)
        }
    }
}

#[derive(Default)]
struct AvgAccumulator {
    sum: f64,
    count: u64,
    poisoned: bool,
}

impl Accumulator for AvgAccumulator {
    fn add(&mut self, value: Value) {
        match value {
            Value::Number(n) => {
                self.sum += n;
                self.count += 1;
            }
            Value::Null | Value::Missing => {}
            _ => self.poisoned = true,
        }
    }

    fn finalize(self: Box<Self>) -> Value {
        if self.poisoned || self.count == 0 {
            Value::Null
        } else {
            Value::Number(self.sum / self.count as f64)
        }
    }
}

/// MIN/MAX over collation order, ignoring NULL and MISSING.
struct ExtremumAccumulator {
    min: bool,
    best: Option<Value>,
}

impl Accumulator for ExtremumAccumulator {
    fn add(&mut self, value: Value) {
        if !value.is_valued() {
            return;
        }
        let replace = match &self.best {
            None => true,
            Some(best) => {
                let ordering = collate(&value, best);
                if self.min {
                    ordering == Ordering::Less
                } else {
                    ordering == Ordering::Greater
                }
            }
        };
        if replace {
            self.best = Some(value);
        }
    }

    fn finalize(self: Box<Self>) -> Value {
        self.best.unwrap_or(Value::Null)
    }
}

/// ARRAY_AGG collects inputs in arrival order; NULL is kept, MISSING is not.
struct ArrayAggAccumulator {
    values: Vec<Value>,
}

impl Accumulator for ArrayAggAccumulator {
    fn add(&mut self, value: Value) {
        if !value.is_missing() {
            self.values.push(value);
        }
    }

    fn finalize(self: Box<Self>) -> Value {
        Value::Array(self.values)
    }
}
