//! Lifecycle manager - the single write path into the ledger.
//!
//! Every status change and every fill goes through here: the transition
//! table is enforced, quantity invariants are checked, and a provenance
//! patch is merged (never replaced) so the history of *why* each
//! transition happened is retained.

use std::sync::Arc;

use rust_decimal::Decimal;
use serde_json::{Map, Value, json};
use tracing::{debug, warn};

use super::state_machine::OrderStateMachine;
use crate::error::LedgerError;
use crate::ledger::LedgerStore;
use crate::models::{Fill, FillReport, Order, OrderStatus, keys};

/// A requested status transition with its provenance.
#[derive(Debug, Clone)]
pub struct TransitionRequest {
    /// Status to move to.
    pub status: OrderStatus,
    /// Component requesting the transition.
    pub source: String,
    /// Human-readable reason, recorded in provenance.
    pub reason: Option<String>,
    /// Extra provenance entries merged alongside the status change.
    pub patch: Map<String, Value>,
}

impl TransitionRequest {
    /// Build a request with an empty patch.
    #[must_use]
    pub fn new(status: OrderStatus, source: impl Into<String>) -> Self {
        Self {
            status,
            source: source.into(),
            reason: None,
            patch: Map::new(),
        }
    }

    /// Attach a reason.
    #[must_use]
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attach one extra provenance entry.
    #[must_use]
    pub fn with_entry(mut self, key: &str, value: Value) -> Self {
        self.patch.insert(key.to_string(), value);
        self
    }
}

/// Outcome of applying a fill.
#[derive(Debug)]
pub enum FillOutcome {
    /// The fill was recorded and the order updated.
    Applied {
        /// The stored fill.
        fill: Fill,
        /// The order after the update.
        order: Order,
    },
    /// The fill duplicates one already recorded; nothing changed.
    Duplicate,
}

/// Applies validated transitions and fills to the ledger.
pub struct LifecycleManager {
    store: Arc<LedgerStore>,
}

impl LifecycleManager {
    /// Create a manager over a shared store.
    #[must_use]
    pub fn new(store: Arc<LedgerStore>) -> Self {
        Self { store }
    }

    /// The underlying store.
    #[must_use]
    pub fn store(&self) -> &Arc<LedgerStore> {
        &self.store
    }

    /// Apply a status transition.
    ///
    /// The provenance patch is merged into the order's log whether or not
    /// the status value itself changes (a `CANCEL_REQUESTED` repeat is an
    /// accepted idempotent merge).
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InvalidTransition`] if the move is not
    /// permitted, or [`LedgerError::UnknownOrder`] if the order does not
    /// exist. Neither mutates the order.
    pub fn transition(
        &self,
        order_id: &str,
        request: TransitionRequest,
    ) -> Result<Order, LedgerError> {
        let updated = self.store.mutate(order_id, |order| {
            OrderStateMachine::validate_transition(&order.id, order.status, request.status)?;

            let from = order.status;
            order.status = request.status;
            order
                .provenance
                .record(&request.source, keys::STATUS, json!(request.status));
            if let Some(reason) = &request.reason {
                order
                    .provenance
                    .record(&request.source, keys::REASON, json!(reason));
            }
            order.provenance.merge(&request.source, request.patch.clone());
            order.updated_at = chrono::Utc::now();

            debug!(
                order_id = %order.id,
                from = ?from,
                to = ?order.status,
                source = %request.source,
                "Order transitioned"
            );
            Ok(order.clone())
        })?;
        Ok(updated)
    }

    /// Apply a fill to an order.
    ///
    /// Duplicates (same execution id, or same quantity/price/event-time)
    /// are skipped without error. A fill that completes the requested
    /// quantity transitions the order to `FILLED`, otherwise `PARTIAL`.
    /// Fills are accepted in `CANCEL_REQUESTED` - a fill always takes
    /// precedence over a concurrently observed cancel signal.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InvalidTransition`] if the order can no
    /// longer receive fills, or [`LedgerError::QuantityExceeded`] if the
    /// fill would push cumulative quantity past the requested quantity.
    pub fn apply_fill(
        &self,
        order_id: &str,
        report: FillReport,
        patch: Map<String, Value>,
    ) -> Result<FillOutcome, LedgerError> {
        let store = Arc::clone(&self.store);
        self.store.mutate(order_id, |order| {
            if !order.status.can_fill() {
                return Err(LedgerError::InvalidTransition {
                    order_id: order.id.clone(),
                    from: order.status,
                    to: OrderStatus::Filled,
                    reason: "order can no longer receive fills".to_string(),
                });
            }

            let attempted = order.filled_quantity + report.quantity;
            if attempted > order.requested_quantity {
                return Err(LedgerError::QuantityExceeded {
                    order_id: order.id.clone(),
                    requested: order.requested_quantity,
                    attempted,
                });
            }

            let Some(fill) = store.record_fill(&order.id, &report) else {
                debug!(order_id = %order.id, "Duplicate fill skipped");
                return Ok(FillOutcome::Duplicate);
            };

            Self::apply_fill_to_order(order, &fill);
            order.provenance.merge(&report.source, patch.clone());

            debug!(
                order_id = %order.id,
                fill_id = fill.id,
                quantity = %fill.quantity,
                price = %fill.price,
                status = ?order.status,
                "Fill applied"
            );
            Ok(FillOutcome::Applied {
                fill,
                order: order.clone(),
            })
        })
    }

    /// Recover a low-confidence cancellation to `FILLED`.
    ///
    /// This is the one privileged edge out of a terminal state. It is
    /// accepted only when the order is `CANCELED`, the cancellation is
    /// marked low-confidence, and the order has not already been
    /// recovered - recovery is monotonic.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InvalidTransition`] if the preconditions do
    /// not hold.
    pub fn recover_fill(
        &self,
        order_id: &str,
        report: FillReport,
        reason: &str,
    ) -> Result<Order, LedgerError> {
        let store = Arc::clone(&self.store);
        self.store.mutate(order_id, |order| {
            if order.status != OrderStatus::Canceled {
                return Err(LedgerError::InvalidTransition {
                    order_id: order.id.clone(),
                    from: order.status,
                    to: OrderStatus::Filled,
                    reason: "recovery applies only to canceled orders".to_string(),
                });
            }
            if order.provenance.latest_str(keys::CANCEL_CONFIDENCE) != Some("low") {
                return Err(LedgerError::InvalidTransition {
                    order_id: order.id.clone(),
                    from: order.status,
                    to: OrderStatus::Filled,
                    reason: "cancellation was not low-confidence".to_string(),
                });
            }
            if order.provenance.contains(keys::RECOVERED) {
                return Err(LedgerError::InvalidTransition {
                    order_id: order.id.clone(),
                    from: order.status,
                    to: OrderStatus::Filled,
                    reason: "order already recovered".to_string(),
                });
            }

            let Some(fill) = store.record_fill(&order.id, &report) else {
                warn!(order_id = %order.id, "Recovery fill already recorded");
                return Ok(order.clone());
            };

            Self::apply_fill_to_order(order, &fill);
            order.status = OrderStatus::Filled;
            order
                .provenance
                .record(&report.source, keys::STATUS, json!(OrderStatus::Filled));
            order
                .provenance
                .record(&report.source, keys::RECOVERED, json!(true));
            order
                .provenance
                .record(&report.source, keys::REASON, json!(reason));
            order.updated_at = chrono::Utc::now();

            debug!(
                order_id = %order.id,
                fill_id = fill.id,
                "Low-confidence cancellation recovered to FILLED"
            );
            Ok(order.clone())
        })
    }

    /// Update quantity, average price, and status for a recorded fill.
    fn apply_fill_to_order(order: &mut Order, fill: &Fill) {
        let previous_filled = order.filled_quantity;
        order.filled_quantity += fill.quantity;

        let previous_notional =
            order.avg_fill_price.unwrap_or(Decimal::ZERO) * previous_filled;
        let notional = previous_notional + fill.price * fill.quantity;
        if order.filled_quantity > Decimal::ZERO {
            order.avg_fill_price = Some(notional / order.filled_quantity);
        }

        order.status = if order.filled_quantity >= order.requested_quantity {
            OrderStatus::Filled
        } else {
            OrderStatus::Partial
        };
        order
            .provenance
            .record(&fill.source, "fill", json!({ "id": fill.id, "quantity": fill.quantity, "price": fill.price }));
        order.updated_at = chrono::Utc::now();
    }
}
