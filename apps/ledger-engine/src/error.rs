//! Error taxonomy for the ledger engine.
//!
//! Every failure mode in this crate degrades to "leave the order's state
//! unchanged and retry on the next pass". Nothing here is fatal to the
//! process: passes catch these errors, record them in their reports, and
//! move on.

use std::time::Duration;

use rust_decimal::Decimal;
use thiserror::Error;

use crate::models::OrderStatus;

/// Errors surfaced by the ledger engine.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Attempted move from/to an incompatible status. The request is
    /// rejected and no mutation takes place.
    #[error("invalid transition for order {order_id}: {from:?} -> {to:?} ({reason})")]
    InvalidTransition {
        /// Order the transition was attempted on.
        order_id: String,
        /// Status the order is currently in.
        from: OrderStatus,
        /// Status the caller asked for.
        to: OrderStatus,
        /// Why the transition was rejected.
        reason: String,
    },

    /// An event references no known order and no synthesizable identifier.
    /// The event is skipped; ingestion continues.
    #[error("unresolved event: {0}")]
    UnresolvedEvent(String),

    /// The minimum interval between broker queries has not yet elapsed.
    /// The caller retries on the next schedule tick.
    #[error("query throttled; ready in {retry_after:?}")]
    ThrottledQuery {
        /// Time remaining until the rate limiter admits another call.
        retry_after: Duration,
    },

    /// The broker connectivity probe failed. Affected orders are skipped
    /// with the reason recorded; state is never guessed.
    #[error("broker unreachable: {0}")]
    BrokerUnreachable(String),

    /// A required exclusive resource is held by another pass. The
    /// operation is deferred, not failed permanently.
    #[error("lock busy: {0}")]
    LockBusy(String),

    /// The referenced order does not exist in the ledger.
    #[error("unknown order: {0}")]
    UnknownOrder(String),

    /// An order with this client correlation tag already exists.
    #[error("duplicate correlation tag: {0}")]
    DuplicateTag(String),

    /// Applying the fill would push cumulative filled quantity past the
    /// requested quantity.
    #[error(
        "fill would exceed requested quantity for order {order_id}: \
         requested {requested}, cumulative {attempted}"
    )]
    QuantityExceeded {
        /// Order the fill was attempted on.
        order_id: String,
        /// Requested order quantity.
        requested: Decimal,
        /// Cumulative filled quantity the fill would have produced.
        attempted: Decimal,
    },

    /// Order creation parameters failed validation.
    #[error("invalid order parameters: {field}: {message}")]
    InvalidParameters {
        /// Offending field.
        field: String,
        /// What was wrong with it.
        message: String,
    },

    /// Filesystem error on a command, result, or lock file.
    #[error("i/o error at {path}: {source}")]
    Io {
        /// Path the operation failed on.
        path: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A command or result file could not be parsed.
    #[error("malformed file {path}: {message}")]
    Malformed {
        /// Path of the unreadable file.
        path: String,
        /// Parse failure detail.
        message: String,
    },
}

impl LedgerError {
    /// Build an [`LedgerError::Io`] from a path and error.
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_transition_display_names_statuses() {
        let err = LedgerError::InvalidTransition {
            order_id: "ord-1".to_string(),
            from: OrderStatus::Filled,
            to: OrderStatus::Canceled,
            reason: "order is terminal".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("ord-1"));
        assert!(msg.contains("Filled"));
        assert!(msg.contains("terminal"));
    }

    #[test]
    fn throttled_query_carries_retry_hint() {
        let err = LedgerError::ThrottledQuery {
            retry_after: Duration::from_secs(3),
        };
        assert!(err.to_string().contains("ready in"));
    }
}
