//! Fill types for ledger tracking.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A broker-reported execution to record against an order.
///
/// This is the write-side shape; the store assigns the id and the
/// recording timestamp when the fill is accepted.
#[derive(Debug, Clone)]
pub struct FillReport {
    /// Executed quantity (unsigned).
    pub quantity: Decimal,
    /// Execution price.
    pub price: Decimal,
    /// Commission charged for this execution.
    pub commission: Decimal,
    /// Broker execution id, when known.
    pub exec_id: Option<String>,
    /// When the execution happened.
    pub executed_at: DateTime<Utc>,
    /// Component that reported the fill (e.g. `"event_log"`,
    /// `"positions_reconciler"`).
    pub source: String,
}

/// One recorded partial or full execution against an order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fill {
    /// Store-assigned id, monotonically increasing.
    pub id: u64,
    /// Owning order id.
    pub order_id: String,
    /// Executed quantity (unsigned).
    pub quantity: Decimal,
    /// Execution price.
    pub price: Decimal,
    /// Commission charged for this execution.
    pub commission: Decimal,
    /// Broker execution id, when known.
    pub exec_id: Option<String>,
    /// When the execution happened.
    pub executed_at: DateTime<Utc>,
    /// When the ledger recorded it.
    pub recorded_at: DateTime<Utc>,
    /// Component that reported the fill.
    pub source: String,
}

impl Fill {
    /// Whether `report` describes this already-recorded fill.
    ///
    /// A report is a duplicate if it shares the broker execution id, or
    /// shares (quantity, price) and an event time matching the recorded
    /// execution time.
    #[must_use]
    pub fn is_duplicate_of(&self, report: &FillReport) -> bool {
        if let (Some(recorded), Some(incoming)) = (&self.exec_id, &report.exec_id)
            && recorded == incoming
        {
            return true;
        }
        self.quantity == report.quantity
            && self.price == report.price
            && self.executed_at == report.executed_at
    }
}
