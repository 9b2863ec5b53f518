//! Global trading guard.
//!
//! A process-wide halt flag consulted before any pass takes a
//! market-facing action. Halted means: leave orders pending, touch
//! nothing.

use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{info, warn};

/// Process-wide halt flag.
#[derive(Debug, Default)]
pub struct TradingGuard {
    halted: AtomicBool,
    reason: RwLock<Option<String>>,
}

impl TradingGuard {
    /// Create a guard in the running state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether trading is currently halted.
    pub fn is_halted(&self) -> bool {
        self.halted.load(Ordering::SeqCst)
    }

    /// Halt trading, recording the reason.
    pub fn halt(&self, reason: &str) {
        self.halted.store(true, Ordering::SeqCst);
        if let Ok(mut guard) = self.reason.write() {
            *guard = Some(reason.to_string());
        }
        warn!(reason, "Trading halted");
    }

    /// Resume trading (after manual intervention).
    pub fn resume(&self) {
        self.halted.store(false, Ordering::SeqCst);
        if let Ok(mut guard) = self.reason.write() {
            *guard = None;
        }
        info!("Trading resumed");
    }

    /// Reason for the current halt, if halted.
    #[must_use]
    pub fn halt_reason(&self) -> Option<String> {
        self.reason.read().ok().and_then(|r| r.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn halt_and_resume() {
        let guard = TradingGuard::new();
        assert!(!guard.is_halted());

        guard.halt("reconciliation drift");
        assert!(guard.is_halted());
        assert_eq!(guard.halt_reason().as_deref(), Some("reconciliation drift"));

        guard.resume();
        assert!(!guard.is_halted());
        assert!(guard.halt_reason().is_none());
    }
}
