//! Per-pipeline executors.
//!
//! Each controller runs in its own task: deltas in, planned writes
//! out. Pipelines share no state, so parallelism lives across
//! executors while each pipeline stays strictly single-threaded. A
//! cancellation only takes effect between events; event processing is
//! synchronous and always leaves the engine consistent.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use viewline_core::Delta;

use crate::controller::Controller;
use crate::target::WriteOp;

/// Default channel capacity for deltas in and writes out.
const CHANNEL_CAPACITY: usize = 64;

/// A running controller executor.
pub struct PipelineExecutor {
    controller: Controller,
    deltas: mpsc::Receiver<Delta>,
    writes: mpsc::Sender<WriteOp>,
    cancel: CancellationToken,
}

/// The caller's side of a spawned executor.
pub struct ExecutorHandle {
    /// Feed source deltas here.
    pub deltas: mpsc::Sender<Delta>,
    /// Planned writes come out here, in event order.
    pub writes: mpsc::Receiver<WriteOp>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl ExecutorHandle {
    /// Requests a stop after the in-flight event completes.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Waits for the executor task to finish.
    pub async fn join(self) {
        let _ = self.task.await;
    }
}

impl PipelineExecutor {
    /// Spawns an executor task for the controller.
    pub fn spawn(controller: Controller) -> ExecutorHandle {
        let (delta_tx, delta_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (write_tx, write_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let cancel = CancellationToken::new();

        let executor = PipelineExecutor {
            controller,
            deltas: delta_rx,
            writes: write_tx,
            cancel: cancel.clone(),
        };
        let task = tokio::spawn(executor.run());

        ExecutorHandle {
            deltas: delta_tx,
            writes: write_rx,
            cancel,
            task,
        }
    }

    async fn run(mut self) {
        info!(controller = %self.controller.name(), "executor: starting");
        loop {
            let delta = tokio::select! {
                _ = self.cancel.cancelled() => break,
                delta = self.deltas.recv() => match delta {
                    Some(delta) => delta,
                    None => break,
                },
            };

            // processing is synchronous: a cancellation arriving now
            // waits for the event to finish
            match self.controller.process(delta) {
                Ok(ops) => {
                    for op in ops {
                        if self.writes.send(op).await.is_err() {
                            debug!(controller = %self.controller.name(),
                                "executor: write consumer gone, stopping");
                            return;
                        }
                    }
                }
                Err(e) => {
                    warn!(controller = %self.controller.name(), error = %e,
                        "executor: event failed, state unchanged");
                }
            }
        }
        info!(controller = %self.controller.name(), "executor: stopped");
    }
}
