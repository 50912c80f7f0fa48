//! The pipeline operators.
//!
//! A request executes as a linear chain of operators, one lightweight task
//! each, connected by bounded item channels. A support channel rides
//! alongside the items carrying warnings and fatal errors, and a stop
//! channel drives cancellation: every blocking operation selects against it
//! so teardown completes within one blocking-operation quantum.

pub mod base;
pub mod distinct;
pub mod explain;
pub mod filter;
pub mod group;
pub mod key_join;
pub mod limit;
pub mod offset;
pub mod order;
pub mod project;
pub mod scan;

pub use base::{run_operator, stopped, Operator, Output};

use crate::error::Error;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// Bound on item channels between operators; a slow consumer blocks its
/// producer, throttling upstream scans.
pub const CHANNEL_CAPACITY: usize = 64;

/// Bound on the support channel.
pub const SUPPORT_CAPACITY: usize = 256;

/// Documents fetched per bulk-fetch round in a keyed join. Must stay within
/// 1..=1024.
pub const FETCH_BATCH_SIZE: usize = 64;

/// How many transient catalog failures one request tolerates before the next
/// one fails it.
pub const MAX_TRANSIENT_FAILURES: u32 = 8;

/// Count of transient catalog failures across one request, shared by every
/// operator that touches the catalog. Each failure within the allowance is
/// attached to the support channel as a warning and the affected rows are
/// skipped; once repeated failures exhaust the allowance, the failure is
/// promoted to a fatal error and the request fails.
#[derive(Clone, Default)]
pub struct TransientFailures {
    count: Arc<AtomicU32>,
}

impl TransientFailures {
    pub fn new() -> Self {
        TransientFailures::default()
    }

    /// Record one failure. Within the allowance returns None (warn and
    /// skip); beyond it, the request-failing escalation of `error`.
    pub fn escalate(&self, error: &Error) -> Option<Error> {
        if self.count.fetch_add(1, Ordering::Relaxed) < MAX_TRANSIENT_FAILURES {
            None
        } else {
            Some(Error::CatalogTransient(format!(
                "giving up after {} transient catalog failures; last: {}",
                MAX_TRANSIENT_FAILURES, error
            )))
        }
    }
}

/// Out-of-band messages accompanying the result stream.
#[derive(Debug, Clone)]
pub enum SupportMsg {
    /// Surfaced to the client as a warning alongside results.
    Warning(Error),
    /// Terminates the pipeline; the executor trips the stop channel when it
    /// sees one.
    Fatal(Error),
}
