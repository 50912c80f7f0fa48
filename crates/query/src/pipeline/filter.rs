//! The filter operator, used for both WHERE and HAVING.
//!
//! Only boolean `true` passes. MISSING, NULL, and non-boolean results all
//! drop the item; a real evaluation error is fatal to the request.

use super::base::{Operator, Output};
use crate::error::Result;
use crate::expr::{EvalContext, EvalError, Expr};
use async_trait::async_trait;
use quill_value::{Item, Value};

pub struct Filter {
    pub condition: Expr,
}

#[async_trait]
impl Operator for Filter {
    fn name(&self) -> &'static str {
        "filter"
    }

    async fn process_item(&mut self, item: Item, output: &mut Output) -> Result<bool> {
        match self.condition.evaluate(&EvalContext::item(&item)) {
            Ok(Value::Bool(true)) => Ok(output.send(item).await),
            Ok(_) | Err(EvalError::Undefined(_)) => Ok(true),
            Err(EvalError::Fatal(error)) => Err(error),
        }
    }
}
