//! The explain operator.
//!
//! Short-circuits execution: the planner hands it the description of the
//! chain it replaced, and it emits that single value without consuming any
//! documents (its source is the dummy operator).

use super::base::{Operator, Output};
use crate::error::Result;
use async_trait::async_trait;
use quill_value::{Item, Value};

pub struct Explain {
    pub description: Value,
}

#[async_trait]
impl Operator for Explain {
    fn name(&self) -> &'static str {
        "explain"
    }

    async fn process_item(&mut self, _item: Item, _output: &mut Output) -> Result<bool> {
        Ok(true)
    }

    async fn after_items(&mut self, output: &mut Output) -> Result<()> {
        output.send(Item::new(self.description.clone())).await;
        Ok(())
    }
}
