//! Completed-orders reconciliation.
//!
//! Highest-confidence pass after direct events: the broker's completed
//! history says definitively how an order ended. Terminal cancellations
//! from here carry high confidence and are never revisited.

use std::sync::Arc;
use std::time::Instant;

use serde_json::json;
use tracing::debug;

use super::history::BrokerHistoryClient;
use super::report::ReconcileReport;
use crate::error::LedgerError;
use crate::lifecycle::{LifecycleManager, TransitionRequest};
use crate::models::{CompletedOrderRow, Order, OrderStatus, keys};
use crate::resilience::RateLimiter;

/// Source label recorded for everything this pass writes.
const SOURCE: &str = "completed_orders";

/// Reconciles open ledger orders against the broker's completed-order
/// history.
pub struct CompletedOrdersReconciler {
    lifecycle: Arc<LifecycleManager>,
    client: Arc<dyn BrokerHistoryClient>,
    limiter: Arc<RateLimiter>,
}

impl CompletedOrdersReconciler {
    /// Create the pass.
    #[must_use]
    pub fn new(
        lifecycle: Arc<LifecycleManager>,
        client: Arc<dyn BrokerHistoryClient>,
        limiter: Arc<RateLimiter>,
    ) -> Self {
        Self {
            lifecycle,
            client,
            limiter,
        }
    }

    /// Run one pass.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::ThrottledQuery`] when the history rate limit
    /// has not elapsed, or [`LedgerError::BrokerUnreachable`] when the
    /// fetch fails. Neither mutates any order; the caller retries on the
    /// next tick.
    pub async fn run(&self) -> Result<ReconcileReport, LedgerError> {
        if !self.limiter.try_acquire() {
            return Err(LedgerError::ThrottledQuery {
                retry_after: self.limiter.time_until_ready(),
            });
        }

        let start = Instant::now();
        let mut report = ReconcileReport::new(SOURCE);
        let rows = self.client.completed_orders().await?;

        for order in self.lifecycle.store().open_orders() {
            report.examined += 1;
            let matches: Vec<&CompletedOrderRow> =
                rows.iter().filter(|row| Self::matches(row, &order)).collect();
            if matches.is_empty() {
                continue;
            }

            let filled = matches.iter().any(|row| row.is_filled());
            let canceled = matches.iter().any(|row| row.is_canceled());

            if filled {
                // An order cannot be un-filled: any fill disposition
                // suppresses cancellation. The fill itself arrives via
                // the event log.
                if canceled {
                    debug!(
                        order_id = %order.id,
                        "Fill disposition present; cancellation skipped"
                    );
                    report.skipped += 1;
                }
                continue;
            }

            if canceled {
                match self.lifecycle.transition(
                    &order.id,
                    TransitionRequest::new(OrderStatus::Canceled, SOURCE)
                        .with_reason("canceled disposition in completed orders")
                        .with_entry(keys::CANCEL_CONFIDENCE, json!("high")),
                ) {
                    Ok(_) => report.canceled += 1,
                    Err(e) => report.warnings.push(e.to_string()),
                }
            }
        }

        report.duration_ms = start.elapsed().as_millis() as u64;
        report.log();
        Ok(report)
    }

    /// Match a history row to an order by correlation tag, or by broker
    /// order id plus symbol and side.
    fn matches(row: &CompletedOrderRow, order: &Order) -> bool {
        if !row.order_ref.is_empty() && row.order_ref == order.tag {
            return true;
        }
        order.broker_order_id == Some(row.order_id)
            && row.symbol == order.symbol
            && row.side.eq_ignore_ascii_case(order.side.as_str())
    }
}
