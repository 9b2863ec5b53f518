//! Pass scheduling intervals for the binary's convenience driver.

use serde::{Deserialize, Serialize};

/// Interval, in seconds, at which each idempotent pass runs.
///
/// Production deployments drive the passes from an external scheduler;
/// these intervals only configure the built-in driver loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Event-log ingestion interval.
    #[serde(default = "default_ingest")]
    pub ingest_secs: u64,
    /// Completed-orders reconciliation interval.
    #[serde(default = "default_completed")]
    pub completed_orders_secs: u64,
    /// Open-orders reconciliation interval.
    #[serde(default = "default_open_orders")]
    pub open_orders_secs: u64,
    /// Positions reconciliation interval.
    #[serde(default = "default_positions")]
    pub positions_secs: u64,
    /// Cancel-result finalization interval.
    #[serde(default = "default_cancel_results")]
    pub cancel_results_secs: u64,
    /// Auto-recovery sweep interval.
    #[serde(default = "default_recovery")]
    pub recovery_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            ingest_secs: default_ingest(),
            completed_orders_secs: default_completed(),
            open_orders_secs: default_open_orders(),
            positions_secs: default_positions(),
            cancel_results_secs: default_cancel_results(),
            recovery_secs: default_recovery(),
        }
    }
}

const fn default_ingest() -> u64 {
    5
}

const fn default_completed() -> u64 {
    120
}

const fn default_open_orders() -> u64 {
    30
}

const fn default_positions() -> u64 {
    60
}

const fn default_cancel_results() -> u64 {
    10
}

const fn default_recovery() -> u64 {
    60
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = SchedulerConfig::default();
        assert_eq!(config.ingest_secs, 5);
        assert_eq!(config.completed_orders_secs, 120);
        assert_eq!(config.open_orders_secs, 30);
        assert_eq!(config.positions_secs, 60);
        assert_eq!(config.cancel_results_secs, 10);
        assert_eq!(config.recovery_secs, 60);
    }
}
