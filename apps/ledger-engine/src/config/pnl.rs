//! Realized-P&L engine configuration.

use serde::{Deserialize, Serialize};

/// Configuration for the realized-P&L cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PnlConfig {
    /// Unconditional cache TTL in seconds. Within it, cached results are
    /// served without consulting the fill revision token, absorbing call
    /// bursts.
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_secs: u64,
}

impl Default for PnlConfig {
    fn default() -> Self {
        Self {
            cache_ttl_secs: default_cache_ttl(),
        }
    }
}

const fn default_cache_ttl() -> u64 {
    2
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        assert_eq!(PnlConfig::default().cache_ttl_secs, 2);
    }
}
