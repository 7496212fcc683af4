//! The per-unit actor task.
//!
//! Owns the execution context exclusively and drains the invocation
//! queue one entry at a time, which is what makes callback execution
//! single-threaded from the guest's point of view. A failing callback is
//! logged and the unit keeps running.

use std::path::PathBuf;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::ports::engine::AutomationUnit;

use super::Invocation;

pub(crate) async fn run_unit(
    path: PathBuf,
    mut unit: Box<dyn AutomationUnit>,
    mut invoke_rx: mpsc::Receiver<Invocation>,
    cancel: CancellationToken,
) {
    loop {
        let invocation = tokio::select! {
            () = cancel.cancelled() => break,
            received = invoke_rx.recv() => match received {
                Some(invocation) => invocation,
                None => break,
            },
        };

        match invocation {
            Invocation::Message { topic, data } => {
                if let Err(err) = unit.on_message(&topic, &data).await {
                    error!(unit = %path.display(), topic, error = %err, "on_message failed");
                }
            }
            Invocation::Timer { name, data } => {
                if let Err(err) = unit.on_timer(&name, &data).await {
                    error!(unit = %path.display(), name, error = %err, "on_timer failed");
                }
            }
            Invocation::Ticker { name, data } => {
                if let Err(err) = unit.on_ticker(&name, &data).await {
                    error!(unit = %path.display(), name, error = %err, "on_ticker failed");
                }
            }
            Invocation::Alarm { name, data } => {
                if let Err(err) = unit.on_alarm(&name, &data).await {
                    error!(unit = %path.display(), name, error = %err, "on_alarm failed");
                }
            }
        }
    }
    debug!(unit = %path.display(), "unit actor stopped");
}
