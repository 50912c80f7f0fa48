//! The shared operator base.
//!
//! Non-source operators implement [`Operator`] and are driven by
//! [`run_operator`]: pull from upstream, process, flush on close. Emission
//! blocks on the downstream channel unless the stop channel fires first;
//! cancellation always wins.

use super::SupportMsg;
use crate::error::{Error, Result};
use async_trait::async_trait;
use quill_value::Item;
use tokio::sync::{mpsc, watch};
use tracing::trace;

/// Completes when the stop channel fires (or its sender is gone).
pub async fn stopped(stop: &mut watch::Receiver<bool>) {
    let _ = stop.wait_for(|stopped| *stopped).await;
}

/// The downstream half of an operator: its item channel, the shared support
/// channel, and the stop channel emission must race against.
pub struct Output {
    items: mpsc::Sender<Item>,
    support: mpsc::Sender<SupportMsg>,
    stop: watch::Receiver<bool>,
}

impl Output {
    pub fn new(
        items: mpsc::Sender<Item>,
        support: mpsc::Sender<SupportMsg>,
        stop: watch::Receiver<bool>,
    ) -> Self {
        Output {
            items,
            support,
            stop,
        }
    }

    /// Send an item downstream. Returns false when the pipeline is stopping
    /// (stop fired or the consumer is gone); the operator should wind down.
    pub async fn send(&mut self, item: Item) -> bool {
        tokio::select! {
            sent = self.items.send(item) => sent.is_ok(),
            _ = stopped(&mut self.stop) => false,
        }
    }

    /// Attach a non-fatal error to the support channel. Warnings are lossy
    /// under pressure rather than a deadlock risk at teardown.
    pub fn warn(&self, error: Error) {
        let _ = self.support.try_send(SupportMsg::Warning(error));
    }

    /// Report a fatal error. The executor trips the stop channel on receipt.
    pub async fn fatal(&mut self, error: Error) {
        tokio::select! {
            _ = self.support.send(SupportMsg::Fatal(error)) => {}
            _ = stopped(&mut self.stop) => {}
        }
    }
}

/// A pipeline operator: `process_item` per upstream item, `after_items` when
/// the upstream drains. Returning `Ok(false)` stops consumption early but
/// still flushes.
#[async_trait]
pub trait Operator: Send {
    fn name(&self) -> &'static str;

    async fn process_item(&mut self, item: Item, output: &mut Output) -> Result<bool>;

    async fn after_items(&mut self, _output: &mut Output) -> Result<()> {
        Ok(())
    }
}

/// The item loop shared by every non-source operator.
pub async fn run_operator(
    mut operator: Box<dyn Operator>,
    mut input: mpsc::Receiver<Item>,
    mut output: Output,
    mut stop: watch::Receiver<bool>,
) {
    trace!(operator = operator.name(), "operator starting");
    loop {
        tokio::select! {
            received = input.recv() => match received {
                Some(item) => match operator.process_item(item, &mut output).await {
                    Ok(true) => {}
                    Ok(false) => break,
                    Err(error) => {
                        output.fatal(error).await;
                        return;
                    }
                },
                None => break,
            },
            _ = stopped(&mut stop) => {
                trace!(operator = operator.name(), "operator cancelled");
                return;
            }
        }
    }
    if let Err(error) = operator.after_items(&mut output).await {
        output.fatal(error).await;
    }
    trace!(operator = operator.name(), "operator finished");
}
