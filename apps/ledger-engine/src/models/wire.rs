//! Wire formats exchanged with the broker-connected process.
//!
//! All inputs arrive as files in a shared data directory; deserialization
//! is permissive (unknown fields ignored) so an upgraded producer never
//! breaks a pass.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::order::OrderSide;

/// Lifecycle status carried by an execution event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LifecycleStatus {
    /// Order acknowledged by the broker.
    Submitted,
    /// Order fully executed.
    Filled,
    /// Order canceled at the broker.
    Cancelled,
    /// Order rejected by the broker.
    Rejected,
    /// Order deemed invalid by the broker.
    Invalid,
}

/// One line of an append-only execution-event log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionEvent {
    /// Broker order id.
    pub order_id: i64,
    /// Symbol the event concerns.
    pub symbol: String,
    /// Lifecycle status reported by the broker.
    pub status: LifecycleStatus,
    /// Cumulative filled quantity at event time.
    #[serde(default)]
    pub filled: Decimal,
    /// Fill price, when the event carries one.
    #[serde(default)]
    pub fill_price: Option<Decimal>,
    /// Order direction.
    pub direction: OrderSide,
    /// When the event occurred.
    pub time: DateTime<Utc>,
    /// Correlation tag linking the event to a ledger order.
    pub tag: String,
    /// Broker execution id, when known.
    #[serde(default)]
    pub exec_id: Option<String>,
    /// Free-form reason, present on rejections and cancellations.
    #[serde(default)]
    pub reason: Option<String>,
}

/// One open order as reported by the broker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenOrderItem {
    /// Correlation tag.
    pub tag: String,
    /// Symbol.
    pub symbol: String,
    /// Broker-side status string.
    pub status: String,
}

/// The broker's currently-open-order set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenOrdersSnapshot {
    /// Open orders.
    pub items: Vec<OpenOrderItem>,
    /// When the producer refreshed the snapshot.
    pub refreshed_at: DateTime<Utc>,
    /// Marked by the producer when the snapshot could not be refreshed.
    /// A stale snapshot is never used to infer cancellation.
    #[serde(default)]
    pub stale: bool,
}

/// One position as reported by the broker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionItem {
    /// Symbol.
    pub symbol: String,
    /// Signed quantity (positive = long, negative = short).
    pub quantity: Decimal,
    /// Average cost per share.
    pub avg_cost: Decimal,
}

/// The broker's latest positions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionsSnapshot {
    /// Positions.
    pub items: Vec<PositionItem>,
    /// When the producer refreshed the snapshot.
    pub refreshed_at: DateTime<Utc>,
    /// Marked by the producer when the snapshot could not be refreshed.
    #[serde(default)]
    pub stale: bool,
}

/// One row of the broker's completed-order history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletedOrderRow {
    /// Broker order id.
    pub order_id: i64,
    /// Broker permanent id.
    pub perm_id: i64,
    /// Symbol.
    pub symbol: String,
    /// Side string (`BUY`/`SELL`).
    pub side: String,
    /// Disposition string (`Filled`, `Cancelled`, ...).
    pub status: String,
    /// When the order completed, when reported.
    #[serde(default)]
    pub completed_time: Option<DateTime<Utc>>,
    /// Client order reference (our correlation tag).
    pub order_ref: String,
}

impl CompletedOrderRow {
    /// Whether this row reports a filled disposition.
    #[must_use]
    pub fn is_filled(&self) -> bool {
        self.status.eq_ignore_ascii_case("filled")
    }

    /// Whether this row reports a canceled or rejected disposition.
    #[must_use]
    pub fn is_canceled(&self) -> bool {
        let status = self.status.to_ascii_lowercase();
        matches!(
            status.as_str(),
            "canceled" | "cancelled" | "apicancelled" | "rejected" | "inactive"
        )
    }
}

/// Outcome reported in a command result file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandStatus {
    /// Command applied at the broker.
    Ok,
    /// The broker no longer knows the order; treated as canceled.
    NotFound,
    /// Still being processed; check again next pass.
    Pending,
}

/// Result file written by the broker-connected process for one command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandResult {
    /// Id of the command this result answers.
    pub command_id: String,
    /// Outcome.
    pub status: CommandStatus,
    /// When the command was processed.
    #[serde(default)]
    pub processed_at: Option<DateTime<Utc>>,
    /// Brokerage-side ids touched by the command.
    #[serde(default)]
    pub brokerage_ids: Option<Vec<i64>>,
}

/// Cancel command file written for the broker-connected process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelCommand {
    /// Unique command id; doubles as the result file key.
    pub command_id: String,
    /// Command type discriminator, always `"cancel_order"`.
    #[serde(rename = "type")]
    pub command_type: String,
    /// Ledger order id to cancel.
    pub order_id: String,
    /// Correlation tag of the order.
    pub tag: String,
    /// When the cancel was requested.
    pub requested_at: DateTime<Utc>,
    /// When the command expires if unprocessed.
    pub expires_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn execution_event_parses_minimal_line() {
        let line = r#"{"order_id":42,"symbol":"AAPL","status":"Submitted","direction":"BUY","time":"2026-03-02T14:30:00Z","tag":"meridian:run-7:0:AAPL"}"#;
        let event: ExecutionEvent = serde_json::from_str(line).unwrap();
        assert_eq!(event.order_id, 42);
        assert_eq!(event.status, LifecycleStatus::Submitted);
        assert_eq!(event.filled, Decimal::ZERO);
        assert!(event.fill_price.is_none());
        assert!(event.exec_id.is_none());
    }

    #[test]
    fn execution_event_parses_fill_line() {
        let line = r#"{"order_id":42,"symbol":"AAPL","status":"Filled","filled":"100","fill_price":"150.25","direction":"BUY","time":"2026-03-02T14:30:00Z","tag":"t-1","exec_id":"e-9"}"#;
        let event: ExecutionEvent = serde_json::from_str(line).unwrap();
        assert_eq!(event.filled, dec!(100));
        assert_eq!(event.fill_price, Some(dec!(150.25)));
        assert_eq!(event.exec_id.as_deref(), Some("e-9"));
    }

    #[test]
    fn open_orders_snapshot_defaults_stale_to_false() {
        let json = r#"{"items":[{"tag":"t-1","symbol":"AAPL","status":"Submitted"}],"refreshed_at":"2026-03-02T14:30:00Z"}"#;
        let snapshot: OpenOrdersSnapshot = serde_json::from_str(json).unwrap();
        assert!(!snapshot.stale);
        assert_eq!(snapshot.items.len(), 1);
    }

    #[test]
    fn completed_row_dispositions() {
        let row = CompletedOrderRow {
            order_id: 1,
            perm_id: 2,
            symbol: "AAPL".to_string(),
            side: "BUY".to_string(),
            status: "Cancelled".to_string(),
            completed_time: None,
            order_ref: "t-1".to_string(),
        };
        assert!(row.is_canceled());
        assert!(!row.is_filled());
    }

    #[test]
    fn command_status_uses_snake_case() {
        let result: CommandResult =
            serde_json::from_str(r#"{"command_id":"c-1","status":"not_found"}"#).unwrap();
        assert_eq!(result.status, CommandStatus::NotFound);
    }
}
