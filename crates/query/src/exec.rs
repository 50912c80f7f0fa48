//! The pipeline executor.
//!
//! Wires a plan into operator tasks connected by bounded channels and runs
//! them in one task group per request. A watch channel carries the stop
//! signal; operators upstream of a Limit listen on a segment channel the
//! limit can fire independently, so limit satisfaction tears the producers
//! down without cutting off the operators still flushing downstream. The
//! support pump forwards warnings out and trips the stop channel when a
//! fatal error arrives.

use crate::error::{Error, Result};
use crate::pipeline::{
    self, distinct::Distinct, explain::Explain, filter::Filter, group::Group, key_join::KeyJoin,
    limit::Limit, offset::Offset, order::Order, project::Project, scan, scan::Scan,
    SupportMsg,
};
use crate::plan::{Plan, Stage};
use quill_catalog::{Bucket, Pool};
use quill_value::Item;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;

/// A started pipeline: the result stream, the support stream, and the
/// handles needed to stop and join it.
pub struct Execution {
    pub items: mpsc::Receiver<Item>,
    pub support: mpsc::Receiver<SupportMsg>,
    stop: Arc<watch::Sender<bool>>,
    tasks: JoinSet<()>,
}

impl Execution {
    /// Fire the stop channel; every operator terminates within one blocking
    /// operation.
    pub fn stop(&self) {
        let _ = self.stop.send(true);
    }

    /// Wait for every operator task to finish.
    pub async fn join(&mut self) {
        while self.tasks.join_next().await.is_some() {}
    }
}

/// Resolve the plan's buckets against the pool and spawn the operator chain.
pub fn start(plan: &Plan, pool: &Arc<dyn Pool>) -> Result<Execution> {
    let (stop_tx, stop_rx) = watch::channel(false);
    let stop = Arc::new(stop_tx);

    // Operators before a Limit listen on a segment stop the limit also
    // fires; the global stop forwards into it.
    let limit_at = plan
        .stages
        .iter()
        .position(|stage| matches!(stage, Stage::Limit(_)));
    let segment = limit_at.map(|_| {
        let (tx, rx) = watch::channel(false);
        (Arc::new(tx), rx)
    });

    let stop_for = |index: usize| -> watch::Receiver<bool> {
        match (&segment, limit_at) {
            (Some((_, segment_rx)), Some(at)) if index < at => segment_rx.clone(),
            _ => stop_rx.clone(),
        }
    };

    // resolve buckets up front so catalog errors surface before any task runs
    let buckets: Vec<Option<Arc<dyn Bucket>>> = plan
        .stages
        .iter()
        .map(|stage| match stage {
            Stage::Scan { bucket, .. }
            | Stage::CountScan { bucket, .. }
            | Stage::KeyJoin { bucket, .. } => pool.bucket(bucket).map(Some).map_err(Error::from),
            _ => Ok(None),
        })
        .collect::<Result<_>>()?;

    let (support_tx, mut support_pump_rx) = mpsc::channel(pipeline::SUPPORT_CAPACITY);
    let (support_out_tx, support_out_rx) = mpsc::channel(pipeline::SUPPORT_CAPACITY);

    // transient catalog failures are counted per request, across operators
    let failures = pipeline::TransientFailures::new();

    let mut tasks = JoinSet::new();

    if let Some((segment_tx, _)) = &segment {
        let segment_tx = segment_tx.clone();
        let mut global = stop_rx.clone();
        tasks.spawn(async move {
            tokio::select! {
                _ = pipeline::stopped(&mut global) => {
                    let _ = segment_tx.send(true);
                }
                // all upstream operators finished; nothing left to stop
                _ = segment_tx.closed() => {}
            }
        });
    }

    let mut upstream: Option<mpsc::Receiver<Item>> = None;
    for (index, stage) in plan.stages.iter().enumerate() {
        let (tx, rx) = mpsc::channel(pipeline::CHANNEL_CAPACITY);
        let output = pipeline::Output::new(tx, support_tx.clone(), stop_for(index));
        let bucket = buckets[index].clone();

        match stage {
            Stage::Dummy => {
                require_source(index, &upstream)?;
                tasks.spawn(scan::run_dummy(output));
            }
            Stage::Scan { alias, shape, .. } => {
                require_source(index, &upstream)?;
                let scan = Scan {
                    bucket: required_bucket(bucket)?,
                    alias: alias.clone(),
                    shape: *shape,
                    failures: failures.clone(),
                };
                tasks.spawn(scan::run_scan(scan, output, stop_for(index)));
            }
            Stage::CountScan { binding, .. } => {
                require_source(index, &upstream)?;
                tasks.spawn(scan::run_count_scan(
                    required_bucket(bucket)?,
                    binding.clone(),
                    output,
                    stop_for(index),
                ));
            }
            _ => {
                let operator: Box<dyn pipeline::Operator> = match stage {
                    Stage::KeyJoin {
                        alias,
                        join_type,
                        many,
                        keys,
                        ..
                    } => Box::new(KeyJoin {
                        bucket: required_bucket(bucket)?,
                        alias: alias.clone(),
                        join_type: *join_type,
                        many: *many,
                        keys: keys.clone(),
                        failures: failures.clone(),
                        fetched: 0,
                    }),
                    Stage::Filter { condition } => Box::new(Filter {
                        condition: condition.clone(),
                    }),
                    Stage::Group { keys, aggregates } => {
                        Box::new(Group::new(keys.clone(), aggregates.clone()))
                    }
                    Stage::Order { by } => Box::new(Order::new(by.clone())),
                    Stage::Offset(count) => Box::new(Offset { remaining: *count }),
                    Stage::Limit(count) => Box::new(Limit {
                        remaining: *count,
                        upstream_stop: segment
                            .as_ref()
                            .map(|(tx, _)| tx.clone())
                            .ok_or_else(|| {
                                Error::Internal("limit stage without a segment stop".into())
                            })?,
                    }),
                    Stage::Project { result } => Box::new(Project {
                        result: result.clone(),
                    }),
                    Stage::Distinct => Box::new(Distinct::default()),
                    Stage::Explain { description } => Box::new(Explain {
                        description: description.clone(),
                    }),
                    Stage::Dummy | Stage::Scan { .. } | Stage::CountScan { .. } => {
                        return Err(Error::Internal("source stage mid-chain".into()))
                    }
                };
                let input = upstream.take().ok_or_else(|| {
                    Error::Internal(format!("operator {} has no upstream", stage.name()))
                })?;
                tasks.spawn(pipeline::run_operator(
                    operator,
                    input,
                    output,
                    stop_for(index),
                ));
            }
        }
        upstream = Some(rx);
    }
    drop(support_tx);

    let items = upstream
        .take()
        .ok_or_else(|| Error::Internal("plan has no stages".into()))?;

    // the support pump: forward messages out, trip the stop on fatals
    let pump_stop = stop.clone();
    tasks.spawn(async move {
        while let Some(message) = support_pump_rx.recv().await {
            let fatal = matches!(&message, SupportMsg::Fatal(_));
            if fatal {
                let _ = pump_stop.send(true);
            }
            if support_out_tx.send(message).await.is_err() {
                break;
            }
        }
    });

    Ok(Execution {
        items,
        support: support_out_rx,
        stop,
        tasks,
    })
}

fn require_source(index: usize, upstream: &Option<mpsc::Receiver<Item>>) -> Result<()> {
    if index != 0 || upstream.is_some() {
        return Err(Error::Internal("source stage mid-chain".into()));
    }
    Ok(())
}

fn required_bucket(bucket: Option<Arc<dyn Bucket>>) -> Result<Arc<dyn Bucket>> {
    bucket.ok_or_else(|| Error::Internal("stage is missing its bucket".into()))
}
