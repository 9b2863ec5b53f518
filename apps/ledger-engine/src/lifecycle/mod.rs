//! Order lifecycle: transition table and the single write path.

mod manager;
mod state_machine;

pub use manager::{FillOutcome, LifecycleManager, TransitionRequest};
pub use state_machine::OrderStateMachine;
