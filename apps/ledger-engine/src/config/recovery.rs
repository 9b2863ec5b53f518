//! Auto-recovery sweep configuration.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Configuration for the stale-order auto-recovery sweep.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryConfig {
    /// Whether the sweep runs at all.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Age after which a zero-fill `NEW` order counts as stale, in
    /// seconds.
    #[serde(default = "default_stale_after")]
    pub stale_after_secs: u64,
    /// Maximum automatic replacements per original order.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Maximum allowed deviation of a limit price from the quote
    /// midpoint, as a fraction (0.02 = 2%).
    #[serde(default = "default_max_price_deviation")]
    pub max_price_deviation: Decimal,
    /// Whether replacements may be created while quotes are stale
    /// (extended-hours trading).
    #[serde(default)]
    pub allow_extended_hours: bool,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            stale_after_secs: default_stale_after(),
            max_attempts: default_max_attempts(),
            max_price_deviation: default_max_price_deviation(),
            allow_extended_hours: false,
        }
    }
}

const fn default_enabled() -> bool {
    true
}

const fn default_stale_after() -> u64 {
    600
}

const fn default_max_attempts() -> u32 {
    3
}

fn default_max_price_deviation() -> Decimal {
    Decimal::new(2, 2) // 2%
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn defaults() {
        let config = RecoveryConfig::default();
        assert!(config.enabled);
        assert_eq!(config.stale_after_secs, 600);
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.max_price_deviation, dec!(0.02));
        assert!(!config.allow_extended_hours);
    }
}
