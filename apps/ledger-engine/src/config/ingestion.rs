//! Event ingestion configuration.

use serde::{Deserialize, Serialize};

/// Configuration for the execution-event ingestor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionConfig {
    /// File name of the append-only event log inside each event
    /// directory.
    #[serde(default = "default_event_log")]
    pub event_log: String,
    /// Prefix of per-order event directories (`direct_<order-id>/`).
    #[serde(default = "default_direct_prefix")]
    pub direct_prefix: String,
    /// Namespace accepted in structured run tags
    /// (`<namespace>:<run-id>:<index>:<symbol>`).
    #[serde(default = "default_namespace")]
    pub namespace: String,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            event_log: default_event_log(),
            direct_prefix: default_direct_prefix(),
            namespace: default_namespace(),
        }
    }
}

fn default_event_log() -> String {
    "execution_events.jsonl".to_string()
}

fn default_direct_prefix() -> String {
    "direct_".to_string()
}

fn default_namespace() -> String {
    "meridian".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = IngestionConfig::default();
        assert_eq!(config.event_log, "execution_events.jsonl");
        assert_eq!(config.direct_prefix, "direct_");
        assert_eq!(config.namespace, "meridian");
    }
}
