//! Order types for ledger tracking.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::provenance::{ProvenanceLog, keys};
use crate::error::LedgerError;

/// Order side (buy or sell).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderSide {
    /// Buy order.
    Buy,
    /// Sell order.
    Sell,
}

impl OrderSide {
    /// Sign applied to quantities when computing position deltas.
    #[must_use]
    pub const fn sign(&self) -> i64 {
        match self {
            Self::Buy => 1,
            Self::Sell => -1,
        }
    }

    /// Uppercase wire form (`BUY`/`SELL`).
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Buy => "BUY",
            Self::Sell => "SELL",
        }
    }
}

/// Order type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderType {
    /// Market order - execute at best available price.
    Market,
    /// Limit order - execute at specified price or better.
    Limit,
    /// Adaptive limit - limit order with broker-side price adaptation.
    AdaptiveLimit,
    /// Peg-to-midpoint - tracks the midpoint of the NBBO.
    PegMidpoint,
}

impl OrderType {
    /// Whether this type requires a limit price.
    #[must_use]
    pub const fn requires_limit_price(&self) -> bool {
        matches!(self, Self::Limit | Self::AdaptiveLimit)
    }
}

/// Order status in the lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Order created but not yet acknowledged by the broker.
    New,
    /// Order acknowledged by the broker.
    Submitted,
    /// Order partially filled.
    Partial,
    /// Order completely filled.
    Filled,
    /// Order canceled.
    Canceled,
    /// Order rejected by the broker.
    Rejected,
    /// Cancel requested; awaiting confirmation. A fill arriving before
    /// the cancel confirms still wins.
    CancelRequested,
    /// Order deemed invalid by the broker.
    Invalid,
    /// Order skipped by the planner before submission.
    Skipped,
}

impl OrderStatus {
    /// Returns true if the order is in a terminal state.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Filled | Self::Canceled | Self::Rejected | Self::Invalid | Self::Skipped
        )
    }

    /// Returns true if the ledger still considers the order open.
    #[must_use]
    pub const fn is_open(&self) -> bool {
        !self.is_terminal()
    }

    /// Returns true if the order can still receive fills.
    #[must_use]
    pub const fn can_fill(&self) -> bool {
        matches!(
            self,
            Self::New | Self::Submitted | Self::Partial | Self::CancelRequested
        )
    }
}

/// Parameters for creating a new order.
#[derive(Debug, Clone)]
pub struct OrderRequest {
    /// Owning run id, `None` for manually-placed orders.
    pub run_id: Option<String>,
    /// Unique client-assigned correlation tag.
    pub tag: String,
    /// Symbol to trade.
    pub symbol: String,
    /// Order side.
    pub side: OrderSide,
    /// Order type.
    pub order_type: OrderType,
    /// Requested quantity.
    pub quantity: Decimal,
    /// Limit price (required for limit-like types).
    pub limit_price: Option<Decimal>,
    /// Automatic-replacement attempt counter.
    pub attempt: u32,
}

impl OrderRequest {
    /// Validate the request parameters.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InvalidParameters`] if required parameters
    /// are missing or invalid.
    pub fn validate(&self) -> Result<(), LedgerError> {
        if self.tag.trim().is_empty() {
            return Err(LedgerError::InvalidParameters {
                field: "tag".to_string(),
                message: "correlation tag must not be empty".to_string(),
            });
        }
        if self.symbol.trim().is_empty() {
            return Err(LedgerError::InvalidParameters {
                field: "symbol".to_string(),
                message: "symbol must not be empty".to_string(),
            });
        }
        if self.quantity <= Decimal::ZERO {
            return Err(LedgerError::InvalidParameters {
                field: "quantity".to_string(),
                message: format!("quantity must be positive, got {}", self.quantity),
            });
        }
        if self.order_type.requires_limit_price() && self.limit_price.is_none() {
            return Err(LedgerError::InvalidParameters {
                field: "limit_price".to_string(),
                message: format!("{:?} orders require a limit price", self.order_type),
            });
        }
        if let Some(price) = self.limit_price
            && price <= Decimal::ZERO
        {
            return Err(LedgerError::InvalidParameters {
                field: "limit_price".to_string(),
                message: format!("limit price must be positive, got {price}"),
            });
        }
        Ok(())
    }
}

/// One intended or placed unit of trading activity.
///
/// Created by the execution planner or a direct-order request, mutated only
/// through the lifecycle manager, never deleted - an order only ever
/// reaches a terminal status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    /// Internal order id.
    pub id: String,
    /// Owning run id, `None` for manually-placed orders.
    pub run_id: Option<String>,
    /// Unique client-assigned correlation tag.
    pub tag: String,
    /// Symbol being traded.
    pub symbol: String,
    /// Order side.
    pub side: OrderSide,
    /// Order type.
    pub order_type: OrderType,
    /// Requested quantity.
    pub requested_quantity: Decimal,
    /// Limit price (required for limit-like types).
    pub limit_price: Option<Decimal>,
    /// Broker-assigned numeric id, set once accepted.
    pub broker_order_id: Option<i64>,
    /// Current status.
    pub status: OrderStatus,
    /// Cumulative filled quantity. Never exceeds `requested_quantity`.
    pub filled_quantity: Decimal,
    /// Average fill price; defined only once `filled_quantity > 0`.
    pub avg_fill_price: Option<Decimal>,
    /// Automatic-replacement attempt counter.
    pub attempt: u32,
    /// Append-only record of every status change and its origin.
    pub provenance: ProvenanceLog,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Create a new order in `NEW` status from a validated request.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InvalidParameters`] if the request fails
    /// validation.
    pub fn new(request: OrderRequest) -> Result<Self, LedgerError> {
        request.validate()?;
        let now = Utc::now();
        let mut provenance = ProvenanceLog::new();
        provenance.record("ledger", keys::STATUS, json!(OrderStatus::New));

        Ok(Self {
            id: uuid::Uuid::new_v4().to_string(),
            run_id: request.run_id,
            tag: request.tag,
            symbol: request.symbol,
            side: request.side,
            order_type: request.order_type,
            requested_quantity: request.quantity,
            limit_price: request.limit_price,
            broker_order_id: None,
            status: OrderStatus::New,
            filled_quantity: Decimal::ZERO,
            avg_fill_price: None,
            attempt: request.attempt,
            provenance,
            created_at: now,
            updated_at: now,
        })
    }

    /// Remaining unfilled quantity.
    #[must_use]
    pub fn leaves_quantity(&self) -> Decimal {
        self.requested_quantity - self.filled_quantity
    }

    /// Age of the order relative to `now`, in whole seconds.
    #[must_use]
    pub fn age_secs(&self, now: DateTime<Utc>) -> u64 {
        now.signed_duration_since(self.created_at)
            .num_seconds()
            .max(0) as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn make_request() -> OrderRequest {
        OrderRequest {
            run_id: Some("run-7".to_string()),
            tag: "meridian:run-7:0:AAPL".to_string(),
            symbol: "AAPL".to_string(),
            side: OrderSide::Buy,
            order_type: OrderType::Limit,
            quantity: dec!(100),
            limit_price: Some(dec!(150.00)),
            attempt: 0,
        }
    }

    #[test]
    fn order_status_terminal() {
        assert!(OrderStatus::Filled.is_terminal());
        assert!(OrderStatus::Canceled.is_terminal());
        assert!(OrderStatus::Rejected.is_terminal());
        assert!(OrderStatus::Invalid.is_terminal());
        assert!(OrderStatus::Skipped.is_terminal());
        assert!(!OrderStatus::New.is_terminal());
        assert!(!OrderStatus::CancelRequested.is_terminal());
    }

    #[test]
    fn cancel_requested_can_still_fill() {
        assert!(OrderStatus::CancelRequested.can_fill());
        assert!(!OrderStatus::Canceled.can_fill());
    }

    #[test]
    fn new_order_starts_clean() {
        let order = Order::new(make_request()).unwrap();
        assert_eq!(order.status, OrderStatus::New);
        assert_eq!(order.filled_quantity, Decimal::ZERO);
        assert!(order.avg_fill_price.is_none());
        assert!(order.broker_order_id.is_none());
        assert_eq!(order.leaves_quantity(), dec!(100));
        assert!(!order.provenance.is_empty());
    }

    #[test]
    fn limit_order_requires_limit_price() {
        let mut request = make_request();
        request.limit_price = None;
        assert!(Order::new(request).is_err());
    }

    #[test]
    fn peg_midpoint_does_not_require_limit_price() {
        let mut request = make_request();
        request.order_type = OrderType::PegMidpoint;
        request.limit_price = None;
        assert!(Order::new(request).is_ok());
    }

    #[test]
    fn zero_quantity_rejected() {
        let mut request = make_request();
        request.quantity = Decimal::ZERO;
        assert!(Order::new(request).is_err());
    }

    #[test]
    fn side_sign_matches_direction() {
        assert_eq!(OrderSide::Buy.sign(), 1);
        assert_eq!(OrderSide::Sell.sign(), -1);
    }
}
