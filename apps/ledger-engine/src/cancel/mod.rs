//! Cancellation coordinator.
//!
//! Issues cancel requests to the broker-connected process over the file
//! channel and finalizes them from asynchronous results. A cancel request
//! marks the order `CANCEL_REQUESTED`; only a result file reporting `ok`
//! or `not_found` (or reconciliation evidence) terminalizes it. A fill
//! arriving in between always wins - a stale cancel result never
//! overwrites `FILLED`.

mod channel;
mod worker;

pub use channel::{CommandChannel, CommandTarget, FsCommandChannel, command_id};
pub use worker::{ProcessWorkerSpawner, WorkerHandle, WorkerSpawner};

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use rand::Rng;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::config::CancellationConfig;
use crate::error::LedgerError;
use crate::lifecycle::{LifecycleManager, TransitionRequest};
use crate::models::{CancelCommand, CommandResult, CommandStatus, Order, OrderStatus, keys};
use crate::resilience::{FileLock, LivenessProbe};

/// Source label recorded for everything the coordinator writes.
const SOURCE: &str = "cancel_coordinator";

/// How often a stand-in worker wait polls for its result.
const WORKER_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Summary of one finalization sweep.
#[derive(Debug, Default)]
pub struct CancelSweepReport {
    /// `CANCEL_REQUESTED` orders examined.
    pub examined: usize,
    /// Orders finalized to `CANCELED`.
    pub finalized: usize,
    /// Orders still awaiting a result.
    pub pending: usize,
    /// Warnings accumulated along the way.
    pub warnings: Vec<String>,
}

/// Coordinates the cancel protocol with the broker-connected process.
pub struct CancellationCoordinator {
    lifecycle: Arc<LifecycleManager>,
    channel: Arc<dyn CommandChannel>,
    liveness: Arc<dyn LivenessProbe>,
    spawner: Option<Arc<dyn WorkerSpawner>>,
    config: CancellationConfig,
    locks_dir: PathBuf,
}

impl CancellationCoordinator {
    /// Create a coordinator.
    #[must_use]
    pub fn new(
        lifecycle: Arc<LifecycleManager>,
        channel: Arc<dyn CommandChannel>,
        liveness: Arc<dyn LivenessProbe>,
        spawner: Option<Arc<dyn WorkerSpawner>>,
        config: CancellationConfig,
        locks_dir: PathBuf,
    ) -> Self {
        Self {
            lifecycle,
            channel,
            liveness,
            spawner,
            config,
            locks_dir,
        }
    }

    /// Request cancellation of an order.
    ///
    /// Accepted for any non-terminal order; idempotent for one already
    /// `CANCEL_REQUESTED` (no second command is written). If the order's
    /// submitting process is no longer alive, a stand-in worker is run to
    /// carry the command to the broker.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InvalidTransition`] for a terminal order
    /// (a no-op - nothing is written), [`LedgerError::UnknownOrder`] for
    /// an unknown id, or [`LedgerError::Io`] if the command cannot be
    /// written.
    pub async fn request_cancel(&self, order_id: &str) -> Result<Order, LedgerError> {
        let order = self
            .lifecycle
            .store()
            .get(order_id)
            .ok_or_else(|| LedgerError::UnknownOrder(order_id.to_string()))?;

        if order.status.is_terminal() {
            return Err(LedgerError::InvalidTransition {
                order_id: order.id.clone(),
                from: order.status,
                to: OrderStatus::CancelRequested,
                reason: "order is already terminal".to_string(),
            });
        }

        if order.status == OrderStatus::CancelRequested {
            debug!(order_id = %order.id, "Cancel already requested; request is idempotent");
            return Ok(order);
        }

        let nonce: u32 = rand::rng().random();
        let command_id = channel::command_id(&order.id, nonce);
        let requested_at = Utc::now();
        let command = CancelCommand {
            command_id: command_id.clone(),
            command_type: "cancel_order".to_string(),
            order_id: order.id.clone(),
            tag: order.tag.clone(),
            requested_at,
            expires_at: requested_at
                + chrono::Duration::seconds(self.config.command_ttl_secs as i64),
        };

        let target = if order.run_id.is_some() {
            CommandTarget::Leader
        } else {
            CommandTarget::Direct(order.id.clone())
        };
        self.channel.send(&target, &command)?;

        let updated = self.lifecycle.transition(
            &order.id,
            TransitionRequest::new(OrderStatus::CancelRequested, SOURCE)
                .with_entry(keys::CANCEL_COMMAND_ID, json!(command_id))
                .with_entry(keys::CANCEL_TAG, json!(order.tag)),
        )?;
        info!(order_id = %order.id, command_id = %command_id, "Cancel requested");

        // Nobody may be left to process the command.
        if let Some(pid) = order.provenance.latest_u64(keys::SUBMITTER_PID)
            && !self.liveness.is_alive(pid as u32)
        {
            info!(
                order_id = %order.id,
                submitter_pid = pid,
                "Submitting process is gone; running stand-in worker"
            );
            self.run_standin_worker(&updated, &command_id).await;
        }

        Ok(updated)
    }

    /// Spawn a worker sharing the order's broker connection identity,
    /// wait (bounded) for the command result, then terminate the worker.
    /// Failures are logged and left for the finalization sweep.
    async fn run_standin_worker(&self, order: &Order, command_id: &str) {
        let Some(spawner) = &self.spawner else {
            warn!(order_id = %order.id, "No worker spawner configured; result left to sweep");
            return;
        };
        let Some(connection_id) = order
            .provenance
            .latest_str(keys::CONNECTION_ID)
            .map(ToString::to_string)
        else {
            warn!(order_id = %order.id, "No connection identity recorded; cannot run worker");
            return;
        };

        // One worker per order at a time, across all engine instances
        // sharing the lock directory.
        let lock = match FileLock::try_acquire(
            &self.locks_dir,
            &format!("cancel-worker-{}", order.id),
        ) {
            Ok(Some(lock)) => lock,
            Ok(None) => {
                debug!(
                    order_id = %order.id,
                    "{}",
                    LedgerError::LockBusy("cancel worker already running".to_string())
                );
                return;
            }
            Err(e) => {
                warn!(order_id = %order.id, error = %e, "Could not acquire worker lock");
                return;
            }
        };

        let handle = match spawner.spawn(&connection_id) {
            Ok(handle) => handle,
            Err(e) => {
                warn!(order_id = %order.id, error = %e, "Failed to spawn cancel worker");
                return;
            }
        };

        let deadline = Instant::now() + Duration::from_secs(self.config.worker_timeout_secs);
        loop {
            match self.channel.poll_result(command_id) {
                Ok(Some(result)) => {
                    self.finalize(order, &result, &mut CancelSweepReport::default());
                    break;
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(order_id = %order.id, error = %e, "Result poll failed");
                }
            }
            if Instant::now() >= deadline {
                warn!(
                    order_id = %order.id,
                    timeout_secs = self.config.worker_timeout_secs,
                    "Cancel worker timed out without a result"
                );
                break;
            }
            tokio::time::sleep(WORKER_POLL_INTERVAL).await;
        }

        spawner.terminate(&handle);
        drop(lock);
    }

    /// Scan `CANCEL_REQUESTED` orders and finalize those whose result
    /// files have arrived. Cheap: one directory probe per order.
    pub fn finalize_pending(&self) -> CancelSweepReport {
        let mut report = CancelSweepReport::default();

        for order in self
            .lifecycle
            .store()
            .orders_in_status(OrderStatus::CancelRequested)
        {
            report.examined += 1;

            let Some(command_id) = order
                .provenance
                .latest_str(keys::CANCEL_COMMAND_ID)
                .map(ToString::to_string)
            else {
                report
                    .warnings
                    .push(format!("order {} has no recorded command id", order.id));
                continue;
            };

            match self.channel.poll_result(&command_id) {
                Ok(Some(result)) => self.finalize(&order, &result, &mut report),
                Ok(None) => report.pending += 1,
                Err(e) => {
                    report.pending += 1;
                    report.warnings.push(e.to_string());
                }
            }
        }

        info!(
            examined = report.examined,
            finalized = report.finalized,
            pending = report.pending,
            warnings = report.warnings.len(),
            "Cancel finalization sweep completed"
        );
        report
    }

    /// Apply one command result to its order.
    fn finalize(&self, order: &Order, result: &CommandResult, report: &mut CancelSweepReport) {
        match result.status {
            // `not_found` means the broker no longer knows the order -
            // terminal-cancel either way.
            CommandStatus::Ok | CommandStatus::NotFound => {
                let reason = match result.status {
                    CommandStatus::Ok => "cancel confirmed by broker",
                    _ => "order not found at broker",
                };
                match self.lifecycle.transition(
                    &order.id,
                    TransitionRequest::new(OrderStatus::Canceled, SOURCE).with_reason(reason),
                ) {
                    Ok(_) => report.finalized += 1,
                    // A fill won the race; the cancel result is stale.
                    Err(e) => report.warnings.push(e.to_string()),
                }
            }
            CommandStatus::Pending => {
                report.pending += 1;
            }
        }
    }
}
