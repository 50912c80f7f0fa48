//! The distinct operator: deduplicates items by the canonical collation
//! encoding of their values.

use super::base::{Operator, Output};
use crate::error::Result;
use async_trait::async_trait;
use quill_value::{encoded, Item};
use std::collections::HashSet;

#[derive(Default)]
pub struct Distinct {
    pub seen: HashSet<Vec<u8>>,
}

#[async_trait]
impl Operator for Distinct {
    fn name(&self) -> &'static str {
        "distinct"
    }

    async fn process_item(&mut self, item: Item, output: &mut Output) -> Result<bool> {
        if self.seen.insert(encoded(item.value())) {
            return Ok(output.send(item).await);
        }
        Ok(true)
    }
}
