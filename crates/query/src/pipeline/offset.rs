//! The offset operator: skips the first N items. An offset beyond the
//! result size yields zero rows, not an error.

use super::base::{Operator, Output};
use crate::error::Result;
use async_trait::async_trait;
use quill_value::Item;

pub struct Offset {
    pub remaining: u64,
}

#[async_trait]
impl Operator for Offset {
    fn name(&self) -> &'static str {
        "offset"
    }

    async fn process_item(&mut self, item: Item, output: &mut Output) -> Result<bool> {
        if self.remaining > 0 {
            self.remaining -= 1;
            return Ok(true);
        }
        Ok(output.send(item).await)
    }
}
