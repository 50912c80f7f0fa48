//! Source operators: bucket scans and the FROM-less dummy source.
//!
//! A transient catalog failure mid-scan skips the unread remainder with a
//! support-channel warning, sharing the request's transient-failure
//! allowance with the join operators; exhausting the allowance fails the
//! request.

use super::base::{stopped, Output};
use super::{TransientFailures, CHANNEL_CAPACITY};
use crate::error::Error;
use quill_catalog::{Bucket, ScanShape};
use quill_value::{Item, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, trace};

/// Emits one empty item; the source for selects without a FROM clause.
pub async fn run_dummy(mut output: Output) {
    output.send(Item::empty()).await;
}

/// Streams a bucket's documents, each bound under the source alias.
pub struct Scan {
    pub bucket: Arc<dyn Bucket>,
    pub alias: String,
    pub shape: ScanShape,
    pub failures: TransientFailures,
}

pub async fn run_scan(scan: Scan, mut output: Output, mut stop: watch::Receiver<bool>) {
    trace!(bucket = scan.bucket.name(), "scan starting");
    let mut scanner = match scan.bucket.scanner() {
        Ok(scanner) => scanner,
        Err(error) => {
            let error: Error = error.into();
            if error.is_fatal() {
                output.fatal(error).await;
            } else if let Some(fatal) = scan.failures.escalate(&error) {
                output.fatal(fatal).await;
            } else {
                output.warn(error);
            }
            return;
        }
    };

    let (tx, mut rx) = mpsc::channel(CHANNEL_CAPACITY);
    let shape = scan.shape;
    let scanning = tokio::spawn(async move { scanner.scan(shape, tx).await });

    let mut produced = 0u64;
    loop {
        tokio::select! {
            received = rx.recv() => match received {
                Some(document) => {
                    let meta = document.meta().clone();
                    let mut fields = BTreeMap::new();
                    fields.insert(scan.alias.clone(), document.into_value());
                    let item = Item::with_meta(Value::Object(fields), meta);
                    if !output.send(item).await {
                        break;
                    }
                    produced += 1;
                }
                None => break,
            },
            _ = stopped(&mut stop) => break,
        }
    }

    // dropping the receiver tells the scanner to stop promptly
    drop(rx);
    match scanning.await {
        Ok(Ok(())) => {}
        Ok(Err(error)) => {
            let error: Error = error.into();
            if error.is_fatal() {
                output.fatal(error).await;
                return;
            }
            // the unread remainder is skipped with a warning
            match scan.failures.escalate(&error) {
                Some(fatal) => {
                    output.fatal(fatal).await;
                    return;
                }
                None => output.warn(error),
            }
        }
        Err(join_error) => {
            output
                .fatal(Error::Internal(format!(
                    "scanner task failed: {}",
                    join_error
                )))
                .await;
            return;
        }
    }
    debug!(bucket = scan.bucket.name(), produced, "scan finished");
}

/// Asks the bucket for its cardinality and emits it under a single binding;
/// the collapsed form of the bare COUNT(*) chain.
pub async fn run_count_scan(
    bucket: Arc<dyn Bucket>,
    binding: String,
    mut output: Output,
    mut stop: watch::Receiver<bool>,
) {
    tokio::select! {
        counted = bucket.count() => match counted {
            Ok(count) => {
                let mut item = Item::empty();
                item.set_field(binding, Value::Number(count as f64));
                output.send(item).await;
            }
            Err(error) => output.fatal(error.into()).await,
        },
        _ = stopped(&mut stop) => {}
    }
}
