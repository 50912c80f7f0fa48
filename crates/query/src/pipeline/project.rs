//! The projection operator.
//!
//! Applies the resolved result list to each item: `*` with no expression
//! copies the item's top-level keys, `expr.*` merges the keys of an
//! object-valued expression (anything else contributes nothing), and a named
//! expression binds its value under the resolved alias. An expression
//! evaluating to MISSING is omitted from the output object; NULL is kept.

use super::base::{Operator, Output};
use crate::error::Result;
use crate::expr::{EvalContext, EvalError};
use crate::plan::Projection;
use async_trait::async_trait;
use quill_value::{Item, Value};
use std::collections::BTreeMap;

pub struct Project {
    pub result: Vec<Projection>,
}

#[async_trait]
impl Operator for Project {
    fn name(&self) -> &'static str {
        "project"
    }

    async fn process_item(&mut self, item: Item, output: &mut Output) -> Result<bool> {
        let ctx = EvalContext::item(&item);
        let mut fields = BTreeMap::new();

        for projection in &self.result {
            if projection.star {
                match &projection.expr {
                    None => {
                        if let Value::Object(source) = item.value() {
                            for (key, value) in source {
                                if !value.is_missing() {
                                    fields.insert(key.clone(), value.clone());
                                }
                            }
                        }
                    }
                    Some(expr) => match expr.evaluate(&ctx) {
                        Ok(Value::Object(source)) => {
                            for (key, value) in source {
                                if !value.is_missing() {
                                    fields.insert(key, value);
                                }
                            }
                        }
                        // a non-object is dropped silently
                        Ok(_) | Err(EvalError::Undefined(_)) => {}
                        Err(EvalError::Fatal(error)) => return Err(error),
                    },
                }
                continue;
            }

            let (Some(expr), Some(alias)) = (&projection.expr, &projection.alias) else {
                continue;
            };
            match expr.evaluate(&ctx) {
                Ok(value) => {
                    fields.insert(alias.clone(), value);
                }
                Err(EvalError::Undefined(_)) => {}
                Err(EvalError::Fatal(error)) => return Err(error),
            }
        }

        let projected = item.with_value(Value::Object(fields));
        Ok(output.send(projected).await)
    }
}
