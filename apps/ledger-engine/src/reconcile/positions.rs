//! Positions reconciliation - low-confidence cancellation recovery.
//!
//! Broker open-order feeds can race with fills during volatile periods,
//! so an order inferred canceled from open-orders absence may in fact
//! have filled. This pass compares the latest positions snapshot against
//! the baseline plus all recorded fills; when the unexplained position
//! change matches a low-confidence cancellation's direction and size, the
//! order is recovered to `FILLED` with a synthetic fill at the reported
//! average cost. Recovery is monotonic - a recovered order is never
//! re-canceled.

use std::sync::Arc;
use std::time::Instant;

use rust_decimal::Decimal;
use tracing::{info, warn};

use super::report::ReconcileReport;
use crate::lifecycle::LifecycleManager;
use crate::models::{BaselineSnapshot, FillReport, Order, OrderStatus, PositionsSnapshot, keys};

/// Source label recorded for everything this pass writes.
const SOURCE: &str = "positions_reconciler";

/// Recovers low-confidence cancellations contradicted by position
/// changes.
pub struct PositionsReconciler {
    lifecycle: Arc<LifecycleManager>,
}

impl PositionsReconciler {
    /// Create the pass.
    #[must_use]
    pub fn new(lifecycle: Arc<LifecycleManager>) -> Self {
        Self { lifecycle }
    }

    /// Run one pass against a positions snapshot and the baseline.
    pub fn run(
        &self,
        snapshot: &PositionsSnapshot,
        baseline: &BaselineSnapshot,
    ) -> ReconcileReport {
        let start = Instant::now();
        let mut report = ReconcileReport::new(SOURCE);

        if snapshot.stale {
            warn!("Positions snapshot marked stale; recovery disabled");
            report.duration_ms = start.elapsed().as_millis() as u64;
            return report;
        }

        for order in self.candidates() {
            report.examined += 1;

            let position_qty = snapshot
                .items
                .iter()
                .find(|p| p.symbol == order.symbol)
                .map_or(Decimal::ZERO, |p| p.quantity);

            // Position change not explained by recorded fills. Recomputed
            // per candidate: each recovery records a fill that explains
            // its own share of the change.
            let fill_delta: Decimal = self
                .lifecycle
                .store()
                .fill_lines_since(baseline.created_at)
                .iter()
                .filter(|line| line.symbol == order.symbol)
                .map(|line| line.fill.quantity * Decimal::from(line.side.sign()))
                .sum();
            let implied = position_qty - baseline.quantity(&order.symbol) - fill_delta;

            let remaining = order.leaves_quantity();
            let expected = remaining * Decimal::from(order.side.sign());
            if implied != expected || remaining <= Decimal::ZERO {
                continue;
            }

            let avg_cost = snapshot
                .items
                .iter()
                .find(|p| p.symbol == order.symbol)
                .map_or(Decimal::ZERO, |p| p.avg_cost);

            let fill = FillReport {
                quantity: remaining,
                price: avg_cost,
                commission: Decimal::ZERO,
                exec_id: None,
                executed_at: snapshot.refreshed_at,
                source: SOURCE.to_string(),
            };
            match self.lifecycle.recover_fill(
                &order.id,
                fill,
                "position change matches canceled order",
            ) {
                Ok(_) => {
                    info!(
                        order_id = %order.id,
                        symbol = %order.symbol,
                        quantity = %remaining,
                        avg_cost = %avg_cost,
                        "Low-confidence cancellation recovered to FILLED"
                    );
                    report.recovered += 1;
                }
                Err(e) => report.warnings.push(e.to_string()),
            }
        }

        report.duration_ms = start.elapsed().as_millis() as u64;
        report.log();
        report
    }

    /// Orders whose cancellation was derived purely from open-orders
    /// absence and not yet recovered.
    fn candidates(&self) -> Vec<Order> {
        self.lifecycle
            .store()
            .orders_in_status(OrderStatus::Canceled)
            .into_iter()
            .filter(|o| {
                o.provenance.latest_str(keys::CANCEL_CONFIDENCE) == Some("low")
                    && !o.provenance.contains(keys::RECOVERED)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::LedgerStore;
    use crate::lifecycle::TransitionRequest;
    use crate::models::{OrderRequest, OrderSide, OrderType, PositionItem};
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn make_reconciler() -> PositionsReconciler {
        PositionsReconciler::new(Arc::new(LifecycleManager::new(Arc::new(LedgerStore::new()))))
    }

    fn insert_low_confidence_cancel(
        reconciler: &PositionsReconciler,
        symbol: &str,
        side: OrderSide,
        qty: Decimal,
    ) -> String {
        let order = Order::new(OrderRequest {
            run_id: Some("run-7".to_string()),
            tag: format!("t-{}", uuid::Uuid::new_v4().simple()),
            symbol: symbol.to_string(),
            side,
            order_type: OrderType::Market,
            quantity: qty,
            limit_price: None,
            attempt: 0,
        })
        .unwrap();
        let id = order.id.clone();
        reconciler.lifecycle.store().insert(order).unwrap();
        reconciler
            .lifecycle
            .transition(
                &id,
                TransitionRequest::new(OrderStatus::Canceled, "open_orders")
                    .with_reason("missing from open orders")
                    .with_entry(keys::CANCEL_CONFIDENCE, json!("low")),
            )
            .unwrap();
        id
    }

    fn make_snapshot(symbol: &str, qty: Decimal, avg_cost: Decimal) -> PositionsSnapshot {
        PositionsSnapshot {
            items: vec![PositionItem {
                symbol: symbol.to_string(),
                quantity: qty,
                avg_cost,
            }],
            refreshed_at: Utc::now(),
            stale: false,
        }
    }

    #[test]
    fn matching_position_change_recovers_order() {
        let reconciler = make_reconciler();
        let id = insert_low_confidence_cancel(&reconciler, "AAPL", OrderSide::Buy, dec!(100));
        let baseline = BaselineSnapshot::empty(Utc::now() - chrono::Duration::hours(1));

        let report = reconciler.run(&make_snapshot("AAPL", dec!(100), dec!(150.25)), &baseline);
        assert_eq!(report.recovered, 1);

        let order = reconciler.lifecycle.store().get(&id).unwrap();
        assert_eq!(order.status, OrderStatus::Filled);
        assert_eq!(order.filled_quantity, dec!(100));
        assert_eq!(order.avg_fill_price, Some(dec!(150.25)));
        assert!(order.provenance.contains(keys::RECOVERED));

        let fills = reconciler.lifecycle.store().fills_for_order(&id);
        assert_eq!(fills.len(), 1);
        assert_eq!(fills[0].source, SOURCE);
    }

    #[test]
    fn mismatched_size_leaves_order_canceled() {
        let reconciler = make_reconciler();
        let id = insert_low_confidence_cancel(&reconciler, "AAPL", OrderSide::Buy, dec!(100));
        let baseline = BaselineSnapshot::empty(Utc::now() - chrono::Duration::hours(1));

        // Position grew by 40, order wanted 100: not a match.
        let report = reconciler.run(&make_snapshot("AAPL", dec!(40), dec!(150)), &baseline);
        assert_eq!(report.recovered, 0);
        assert_eq!(
            reconciler.lifecycle.store().get(&id).unwrap().status,
            OrderStatus::Canceled
        );
    }

    #[test]
    fn wrong_direction_leaves_order_canceled() {
        let reconciler = make_reconciler();
        let id = insert_low_confidence_cancel(&reconciler, "AAPL", OrderSide::Sell, dec!(100));
        let baseline = BaselineSnapshot::empty(Utc::now() - chrono::Duration::hours(1));

        // A SELL order expects the position to fall, not rise.
        let report = reconciler.run(&make_snapshot("AAPL", dec!(100), dec!(150)), &baseline);
        assert_eq!(report.recovered, 0);
        assert_eq!(
            reconciler.lifecycle.store().get(&id).unwrap().status,
            OrderStatus::Canceled
        );
    }

    #[test]
    fn high_confidence_cancellation_is_never_recovered() {
        let reconciler = make_reconciler();
        let order = Order::new(OrderRequest {
            run_id: None,
            tag: "t-high".to_string(),
            symbol: "AAPL".to_string(),
            side: OrderSide::Buy,
            order_type: OrderType::Market,
            quantity: dec!(100),
            limit_price: None,
            attempt: 0,
        })
        .unwrap();
        let id = order.id.clone();
        reconciler.lifecycle.store().insert(order).unwrap();
        reconciler
            .lifecycle
            .transition(
                &id,
                TransitionRequest::new(OrderStatus::Canceled, "completed_orders")
                    .with_entry(keys::CANCEL_CONFIDENCE, json!("high")),
            )
            .unwrap();
        let baseline = BaselineSnapshot::empty(Utc::now() - chrono::Duration::hours(1));

        let report = reconciler.run(&make_snapshot("AAPL", dec!(100), dec!(150)), &baseline);
        assert_eq!(report.examined, 0);
        assert_eq!(report.recovered, 0);
    }

    #[test]
    fn recorded_fills_explain_position_changes() {
        // Another order's recorded fill accounts for the position change;
        // the canceled order is not recovered.
        let reconciler = make_reconciler();
        let canceled = insert_low_confidence_cancel(&reconciler, "AAPL", OrderSide::Buy, dec!(100));

        let filled = Order::new(OrderRequest {
            run_id: None,
            tag: "t-filled".to_string(),
            symbol: "AAPL".to_string(),
            side: OrderSide::Buy,
            order_type: OrderType::Market,
            quantity: dec!(100),
            limit_price: None,
            attempt: 0,
        })
        .unwrap();
        let filled_id = filled.id.clone();
        reconciler.lifecycle.store().insert(filled).unwrap();
        reconciler
            .lifecycle
            .apply_fill(
                &filled_id,
                FillReport {
                    quantity: dec!(100),
                    price: dec!(150),
                    commission: Decimal::ZERO,
                    exec_id: None,
                    executed_at: Utc::now(),
                    source: "event_log".to_string(),
                },
                serde_json::Map::new(),
            )
            .unwrap();

        let baseline = BaselineSnapshot::empty(Utc::now() - chrono::Duration::hours(1));
        let report = reconciler.run(&make_snapshot("AAPL", dec!(100), dec!(150)), &baseline);

        assert_eq!(report.recovered, 0);
        assert_eq!(
            reconciler.lifecycle.store().get(&canceled).unwrap().status,
            OrderStatus::Canceled
        );
    }

    #[test]
    fn stale_positions_snapshot_disables_recovery() {
        let reconciler = make_reconciler();
        insert_low_confidence_cancel(&reconciler, "AAPL", OrderSide::Buy, dec!(100));
        let baseline = BaselineSnapshot::empty(Utc::now() - chrono::Duration::hours(1));

        let mut snapshot = make_snapshot("AAPL", dec!(100), dec!(150));
        snapshot.stale = true;
        let report = reconciler.run(&snapshot, &baseline);
        assert_eq!(report.recovered, 0);
        assert_eq!(report.examined, 0);
    }
}
