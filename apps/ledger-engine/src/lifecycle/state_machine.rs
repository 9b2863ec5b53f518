//! Order state machine.
//!
//! Validates status transitions. Terminal states accept no further
//! transition; an attempt fails with `InvalidTransition` and is a no-op.

use crate::error::LedgerError;
use crate::models::OrderStatus;

/// Order state machine for validating transitions.
pub struct OrderStateMachine;

impl OrderStateMachine {
    /// Check if a status transition is valid.
    ///
    /// `CANCELED -> FILLED` is deliberately absent: the one recovery edge
    /// is privileged and goes through
    /// [`crate::lifecycle::LifecycleManager::recover_fill`].
    #[must_use]
    pub fn is_valid_transition(from: OrderStatus, to: OrderStatus) -> bool {
        use OrderStatus::{
            CancelRequested, Canceled, Filled, Invalid, New, Partial, Rejected, Skipped, Submitted,
        };
        matches!(
            (from, to),
            // From New. Fills may land before the Submitted event is seen,
            // and the planner may skip an order before submission.
            (
                New,
                Submitted
                    | Partial
                    | Filled
                    | Canceled
                    | Rejected
                    | Invalid
                    | Skipped
                    | CancelRequested
            )
            // From Submitted
            | (
                Submitted,
                Partial | Filled | Canceled | Rejected | Invalid | CancelRequested
            )
            // From Partial. Rejected/Invalid included so a late broker
            // verdict on a partially filled order still lands.
            | (
                Partial,
                Partial | Filled | Canceled | Rejected | Invalid | CancelRequested
            )
            // From CancelRequested. Fills arriving before the cancel
            // confirms take the order back to a fill-derived terminal.
            | (
                CancelRequested,
                CancelRequested | Partial | Filled | Canceled | Rejected | Invalid
            )
        )
    }

    /// Validate a status transition.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InvalidTransition`] if the transition is not
    /// permitted.
    pub fn validate_transition(
        order_id: &str,
        from: OrderStatus,
        to: OrderStatus,
    ) -> Result<(), LedgerError> {
        if Self::is_valid_transition(from, to) {
            Ok(())
        } else {
            Err(LedgerError::InvalidTransition {
                order_id: order_id.to_string(),
                from,
                to,
                reason: Self::transition_error_reason(from, to),
            })
        }
    }

    /// Human-readable reason for an invalid transition.
    #[must_use]
    pub fn transition_error_reason(from: OrderStatus, to: OrderStatus) -> String {
        if from.is_terminal() {
            format!("order is terminal in {from:?}, cannot transition to {to:?}")
        } else {
            format!("invalid transition from {from:?} to {to:?}")
        }
    }

    /// All valid next states from a given state.
    #[must_use]
    pub fn valid_next_states(from: OrderStatus) -> Vec<OrderStatus> {
        use OrderStatus::{
            CancelRequested, Canceled, Filled, Invalid, New, Partial, Rejected, Skipped, Submitted,
        };
        let all = [
            New,
            Submitted,
            Partial,
            Filled,
            Canceled,
            Rejected,
            CancelRequested,
            Invalid,
            Skipped,
        ];
        all.into_iter()
            .filter(|&to| Self::is_valid_transition(from, to))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(OrderStatus::New, OrderStatus::Submitted => true)]
    #[test_case(OrderStatus::New, OrderStatus::Skipped => true)]
    #[test_case(OrderStatus::New, OrderStatus::Filled => true)]
    #[test_case(OrderStatus::Submitted, OrderStatus::Partial => true)]
    #[test_case(OrderStatus::Submitted, OrderStatus::Skipped => false)]
    #[test_case(OrderStatus::Partial, OrderStatus::Filled => true)]
    #[test_case(OrderStatus::Partial, OrderStatus::Partial => true)]
    #[test_case(OrderStatus::Partial, OrderStatus::Submitted => false)]
    #[test_case(OrderStatus::CancelRequested, OrderStatus::Filled => true)]
    #[test_case(OrderStatus::CancelRequested, OrderStatus::Canceled => true)]
    #[test_case(OrderStatus::CancelRequested, OrderStatus::CancelRequested => true)]
    #[test_case(OrderStatus::Filled, OrderStatus::Canceled => false)]
    #[test_case(OrderStatus::Canceled, OrderStatus::Filled => false)]
    #[test_case(OrderStatus::Rejected, OrderStatus::Submitted => false)]
    #[test_case(OrderStatus::Skipped, OrderStatus::New => false)]
    fn transition_table(from: OrderStatus, to: OrderStatus) -> bool {
        OrderStateMachine::is_valid_transition(from, to)
    }

    #[test]
    fn terminal_states_have_no_next_states() {
        for terminal in [
            OrderStatus::Filled,
            OrderStatus::Canceled,
            OrderStatus::Rejected,
            OrderStatus::Invalid,
            OrderStatus::Skipped,
        ] {
            assert!(OrderStateMachine::valid_next_states(terminal).is_empty());
        }
    }

    #[test]
    fn validate_transition_reports_terminal_reason() {
        let err = OrderStateMachine::validate_transition(
            "ord-1",
            OrderStatus::Filled,
            OrderStatus::Canceled,
        )
        .unwrap_err();
        assert!(err.to_string().contains("terminal"));
    }

    #[test]
    fn every_non_terminal_state_can_reach_cancel_requested() {
        for open in [
            OrderStatus::New,
            OrderStatus::Submitted,
            OrderStatus::Partial,
            OrderStatus::CancelRequested,
        ] {
            assert!(OrderStateMachine::is_valid_transition(
                open,
                OrderStatus::CancelRequested
            ));
        }
    }
}
