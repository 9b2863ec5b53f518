//! Open-orders reconciliation.
//!
//! Diffs the broker's currently-open-order set against orders the ledger
//! believes are still open. Absence from a fresh snapshot infers a
//! low-confidence cancellation; presence promotes `NEW -> SUBMITTED`.
//! A snapshot the producer marked stale is never used to infer
//! cancellation - false negatives are safe, false cancellations are not.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use serde_json::json;
use tracing::{debug, warn};

use super::report::ReconcileReport;
use crate::config::ReconciliationConfig;
use crate::lifecycle::{LifecycleManager, TransitionRequest};
use crate::models::{OpenOrdersSnapshot, OrderStatus, keys};

/// Source label recorded for everything this pass writes.
const SOURCE: &str = "open_orders";

/// Reconciles the ledger against the broker's open-order snapshot.
pub struct OpenOrdersReconciler {
    lifecycle: Arc<LifecycleManager>,
    config: ReconciliationConfig,
}

impl OpenOrdersReconciler {
    /// Create the pass.
    #[must_use]
    pub fn new(lifecycle: Arc<LifecycleManager>, config: ReconciliationConfig) -> Self {
        Self { lifecycle, config }
    }

    /// Run one pass against a snapshot.
    pub fn run(&self, snapshot: &OpenOrdersSnapshot) -> ReconcileReport {
        let start = Instant::now();
        let mut report = ReconcileReport::new(SOURCE);
        let now = Utc::now();

        if snapshot.stale {
            warn!("Open-orders snapshot marked stale; cancellation inference disabled");
        }

        let open_tags: HashSet<&str> = snapshot.items.iter().map(|i| i.tag.as_str()).collect();

        for order in self.lifecycle.store().open_orders() {
            report.examined += 1;

            if open_tags.contains(order.tag.as_str()) {
                // Newly visible at the broker: the order reached the book.
                if order.status == OrderStatus::New {
                    match self.lifecycle.transition(
                        &order.id,
                        TransitionRequest::new(OrderStatus::Submitted, SOURCE)
                            .with_reason("visible in open orders"),
                    ) {
                        Ok(_) => report.promoted += 1,
                        Err(e) => report.warnings.push(e.to_string()),
                    }
                }
                continue;
            }

            // Absent from the snapshot. Only a fresh snapshot may infer
            // cancellation.
            if snapshot.stale {
                report.skipped += 1;
                continue;
            }

            // An unacknowledged order may simply not have reached the
            // broker yet.
            if order.status == OrderStatus::New && order.broker_order_id.is_none() {
                report.skipped += 1;
                continue;
            }

            // Protection window: a very recent order can race the
            // snapshot producer.
            if order.age_secs(now) < self.config.protection_window_secs {
                debug!(
                    order_id = %order.id,
                    age_secs = order.age_secs(now),
                    "Order within protection window, skipping"
                );
                report.skipped += 1;
                continue;
            }

            match self.lifecycle.transition(
                &order.id,
                TransitionRequest::new(OrderStatus::Canceled, SOURCE)
                    .with_reason("missing from open orders")
                    .with_entry(keys::CANCEL_CONFIDENCE, json!("low")),
            ) {
                Ok(_) => report.canceled += 1,
                Err(e) => report.warnings.push(e.to_string()),
            }
        }

        report.duration_ms = start.elapsed().as_millis() as u64;
        report.log();
        report
    }
}
