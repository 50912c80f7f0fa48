//! The order operator.
//!
//! Buffers the upstream, sorts stably by the (expression, direction) list
//! using the total cross-class collation, and emits on drain. Heterogeneous
//! values are well-ordered because collation ranks kinds before comparing
//! within a kind.

use super::base::{Operator, Output};
use crate::error::Result;
use crate::expr::{EvalContext, EvalError, Expr};
use crate::stmt::Direction;
use async_trait::async_trait;
use quill_value::{collate, Item, Value};
use std::cmp::Ordering;

pub struct Order {
    pub by: Vec<(Expr, Direction)>,
    pub buffer: Vec<(Vec<Value>, Item)>,
}

impl Order {
    pub fn new(by: Vec<(Expr, Direction)>) -> Self {
        Order {
            by,
            buffer: Vec::new(),
        }
    }
}

#[async_trait]
impl Operator for Order {
    fn name(&self) -> &'static str {
        "order"
    }

    async fn process_item(&mut self, item: Item, _output: &mut Output) -> Result<bool> {
        let ctx = EvalContext::item(&item);
        let mut sort_key = Vec::with_capacity(self.by.len());
        for (expr, _) in &self.by {
            let value = match expr.evaluate(&ctx) {
                Ok(value) => value,
                Err(EvalError::Undefined(_)) => Value::Missing,
                Err(EvalError::Fatal(error)) => return Err(error),
            };
            sort_key.push(value);
        }
        self.buffer.push((sort_key, item));
        Ok(true)
    }

    async fn after_items(&mut self, output: &mut Output) -> Result<()> {
        let directions: Vec<Direction> = self.by.iter().map(|(_, d)| *d).collect();
        // sort_by is stable, so equal keys keep their arrival order
        self.buffer.sort_by(|(a, _), (b, _)| {
            for ((av, bv), direction) in a.iter().zip(b.iter()).zip(directions.iter()) {
                let ordering = collate(av, bv);
                let ordering = match direction {
                    Direction::Asc => ordering,
                    Direction::Desc => ordering.reverse(),
                };
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            Ordering::Equal
        });
        for (_, item) in self.buffer.drain(..) {
            if !output.send(item).await {
                break;
            }
        }
        Ok(())
    }
}
