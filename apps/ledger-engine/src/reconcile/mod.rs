//! Broker-state reconciliation.
//!
//! Three independently-scheduled passes applied in decreasing confidence
//! order: completed-orders history, open-orders diff, positions-based
//! recovery. Each acts only on orders still non-terminal when it runs,
//! writes exclusively through the lifecycle manager, and is idempotent -
//! re-running a pass with unchanged broker snapshots mutates nothing.

mod completed;
mod history;
mod open_orders;
mod positions;
mod report;

pub use completed::CompletedOrdersReconciler;
pub use history::{BrokerHistoryClient, HttpBrokerHistoryClient};
pub use open_orders::OpenOrdersReconciler;
pub use positions::PositionsReconciler;
pub use report::ReconcileReport;

use std::path::Path;

use tracing::warn;

use crate::error::LedgerError;
use crate::models::{OpenOrdersSnapshot, PositionsSnapshot};

/// Load the open-orders snapshot from the data directory.
///
/// # Errors
///
/// Returns [`LedgerError::Io`] if the file cannot be read or
/// [`LedgerError::Malformed`] if it cannot be parsed. Callers treat both
/// as "skip this tick".
pub fn load_open_orders(path: &Path) -> Result<OpenOrdersSnapshot, LedgerError> {
    load_snapshot(path)
}

/// Load the positions snapshot from the data directory.
///
/// # Errors
///
/// Same contract as [`load_open_orders`].
pub fn load_positions(path: &Path) -> Result<PositionsSnapshot, LedgerError> {
    load_snapshot(path)
}

fn load_snapshot<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, LedgerError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| LedgerError::io(path.display().to_string(), e))?;
    serde_json::from_str(&content).map_err(|e| {
        warn!(path = %path.display(), error = %e, "Unreadable snapshot");
        LedgerError::Malformed {
            path: path.display().to_string(),
            message: e.to_string(),
        }
    })
}
