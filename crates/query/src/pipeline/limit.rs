//! The limit operator.
//!
//! Emits at most N items, then fires the upstream segment's stop channel so
//! producers tear down promptly instead of filling channels nobody reads.

use super::base::{Operator, Output};
use crate::error::Result;
use async_trait::async_trait;
use quill_value::Item;
use std::sync::Arc;
use tokio::sync::watch;

pub struct Limit {
    pub remaining: u64,
    pub upstream_stop: Arc<watch::Sender<bool>>,
}

#[async_trait]
impl Operator for Limit {
    fn name(&self) -> &'static str {
        "limit"
    }

    async fn process_item(&mut self, item: Item, output: &mut Output) -> Result<bool> {
        if self.remaining == 0 {
            let _ = self.upstream_stop.send(true);
            return Ok(false);
        }
        self.remaining -= 1;
        let sent = output.send(item).await;
        if self.remaining == 0 {
            // the limit is satisfied; stop the upstream before it produces
            // another item
            let _ = self.upstream_stop.send(true);
            return Ok(false);
        }
        Ok(sent)
    }
}
