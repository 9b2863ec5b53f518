//! Broker history API configuration.

use serde::{Deserialize, Serialize};

/// Configuration for the live completed-order history API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    /// Base URL of the broker history API.
    #[serde(default = "default_history_url")]
    pub history_url: String,
    /// Minimum interval between successive history queries, in seconds.
    /// Callers arriving earlier receive a throttled outcome.
    #[serde(default = "default_min_query_interval")]
    pub min_query_interval_secs: u64,
    /// HTTP request timeout in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            history_url: default_history_url(),
            min_query_interval_secs: default_min_query_interval(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

fn default_history_url() -> String {
    "http://localhost:7496".to_string()
}

const fn default_min_query_interval() -> u64 {
    30
}

const fn default_request_timeout() -> u64 {
    10
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = BrokerConfig::default();
        assert_eq!(config.min_query_interval_secs, 30);
        assert_eq!(config.request_timeout_secs, 10);
        assert!(config.history_url.starts_with("http://"));
    }
}
