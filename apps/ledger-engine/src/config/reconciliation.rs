//! Reconciliation configuration for periodic broker state sync.

use serde::{Deserialize, Serialize};

/// Configuration shared by the three reconciliation passes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconciliationConfig {
    /// File name of the open-orders snapshot in the data directory.
    #[serde(default = "default_open_orders_file")]
    pub open_orders_file: String,
    /// File name of the positions snapshot in the data directory.
    #[serde(default = "default_positions_file")]
    pub positions_file: String,
    /// Protection window for recently created orders, in seconds. Within
    /// it, absence from an open-orders snapshot never infers cancellation.
    #[serde(default = "default_protection_window")]
    pub protection_window_secs: u64,
}

impl Default for ReconciliationConfig {
    fn default() -> Self {
        Self {
            open_orders_file: default_open_orders_file(),
            positions_file: default_positions_file(),
            protection_window_secs: default_protection_window(),
        }
    }
}

fn default_open_orders_file() -> String {
    "open_orders.json".to_string()
}

fn default_positions_file() -> String {
    "positions.json".to_string()
}

const fn default_protection_window() -> u64 {
    120
}
