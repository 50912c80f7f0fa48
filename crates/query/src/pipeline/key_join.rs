//! The keyed-join operator.
//!
//! Evaluates a key expression against each upstream item — a single string
//! under KEY, an array of strings under KEYS — and joins the fetched
//! documents under the join alias. Array fetches go to the bucket in rounds
//! of [`FETCH_BATCH_SIZE`]. INNER drops rows with no match; LEFT passes an
//! unkeyed row through unchanged, and binds NULL for an array key whose
//! fetch found nothing. Transient fetch failures become support warnings and
//! the affected rows behave as misses, until repeated failures exhaust the
//! request's allowance; a bucket-level failure is fatal immediately.

use super::base::{Operator, Output};
use super::{TransientFailures, FETCH_BATCH_SIZE};
use crate::error::{Error, Result};
use crate::expr::{EvalContext, EvalError, Expr};
use crate::stmt::JoinType;
use async_trait::async_trait;
use quill_catalog::Bucket;
use quill_value::{Item, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

pub struct KeyJoin {
    pub bucket: Arc<dyn Bucket>,
    pub alias: String,
    pub join_type: JoinType,
    /// KEYS (array) vs KEY (single string).
    pub many: bool,
    pub keys: Expr,
    pub failures: TransientFailures,
    pub fetched: u64,
}

impl KeyJoin {
    fn left(&self) -> bool {
        self.join_type == JoinType::Left
    }

    async fn pass_through(&self, item: Item, output: &mut Output) -> Result<bool> {
        if self.left() {
            return Ok(output.send(item).await);
        }
        Ok(true)
    }

    async fn join_single(&mut self, item: Item, id: String, output: &mut Output) -> Result<bool> {
        match self.bucket.fetch(&id).await {
            Ok(Some(document)) => {
                let mut joined = item.duplicate();
                joined.set_field(self.alias.as_str(), document.into_value());
                self.fetched += 1;
                Ok(output.send(joined).await)
            }
            // no such key: the join type decides
            Ok(None) => self.pass_through(item, output).await,
            Err(error) => {
                let error: Error = error.into();
                if error.is_fatal() {
                    return Err(error);
                }
                if let Some(fatal) = self.failures.escalate(&error) {
                    return Err(fatal);
                }
                output.warn(error);
                self.pass_through(item, output).await
            }
        }
    }

    async fn join_array(
        &mut self,
        item: Item,
        elements: Vec<Value>,
        output: &mut Output,
    ) -> Result<bool> {
        if elements.is_empty() {
            return self.pass_through(item, output).await;
        }
        // non-string elements behave as keys that match nothing
        let keys: Vec<Option<String>> = elements
            .into_iter()
            .map(|element| match element {
                Value::Str(id) => Some(id),
                _ => None,
            })
            .collect();

        for round in keys.chunks(FETCH_BATCH_SIZE) {
            if !self.flush_batch(&item, round, output).await? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Fetch one round of keys and emit joined rows in key order.
    async fn flush_batch(
        &mut self,
        base: &Item,
        keys: &[Option<String>],
        output: &mut Output,
    ) -> Result<bool> {
        let ids: Vec<String> = keys.iter().flatten().cloned().collect();
        let found = match self.bucket.bulk_fetch(&ids).await {
            Ok(found) => found,
            Err(error) => {
                let error: Error = error.into();
                if error.is_fatal() {
                    return Err(error);
                }
                if let Some(fatal) = self.failures.escalate(&error) {
                    return Err(fatal);
                }
                // the whole round behaves as misses
                output.warn(error);
                HashMap::new()
            }
        };

        for key in keys {
            let document = key.as_ref().and_then(|id| found.get(id));
            match document {
                Some(document) => {
                    let mut joined = base.duplicate();
                    joined.set_field(self.alias.as_str(), document.value().clone());
                    self.fetched += 1;
                    if !output.send(joined).await {
                        return Ok(false);
                    }
                }
                None if self.left() => {
                    let mut joined = base.duplicate();
                    joined.set_field(self.alias.as_str(), Value::Null);
                    if !output.send(joined).await {
                        return Ok(false);
                    }
                }
                None => {}
            }
        }
        Ok(true)
    }
}

#[async_trait]
impl Operator for KeyJoin {
    fn name(&self) -> &'static str {
        "key-join"
    }

    async fn process_item(&mut self, item: Item, output: &mut Output) -> Result<bool> {
        let keys = match self.keys.evaluate(&EvalContext::item(&item)) {
            Ok(value) => value,
            Err(EvalError::Undefined(_)) => return self.pass_through(item, output).await,
            Err(EvalError::Fatal(error)) => return Err(error),
        };
        match keys {
            Value::Str(id) => {
                if self.many {
                    return Err(Error::Semantic(
                        "KEYS expression should evaluate to an array".into(),
                    ));
                }
                self.join_single(item, id, output).await
            }
            Value::Array(elements) => {
                if !self.many {
                    return Err(Error::Semantic(
                        "KEY expression should evaluate to a single key".into(),
                    ));
                }
                self.join_array(item, elements, output).await
            }
            // any other kind matches nothing
            _ => self.pass_through(item, output).await,
        }
    }

    async fn after_items(&mut self, _output: &mut Output) -> Result<()> {
        debug!(bucket = self.bucket.name(), fetched = self.fetched, "key join finished");
        Ok(())
    }
}
