//! Append-only provenance log attached to every order.
//!
//! Replaces the free-form metadata map of earlier designs with a typed
//! side-record: each status change, fill, and command leaves an entry
//! naming its source, key, value, and timestamp. Merging appends; nothing
//! is ever overwritten, so the full history of *why* each transition
//! happened is retained.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Well-known provenance keys.
pub mod keys {
    /// Status the order moved to, recorded on every transition.
    pub const STATUS: &str = "status";
    /// Human-readable reason for a transition.
    pub const REASON: &str = "reason";
    /// Confidence of a cancellation: `"high"` (completed-orders evidence)
    /// or `"low"` (inferred from open-orders absence).
    pub const CANCEL_CONFIDENCE: &str = "cancel_confidence";
    /// Set once a low-confidence cancellation has been recovered to a fill.
    pub const RECOVERED: &str = "recovered";
    /// Command id of the in-flight cancel request.
    pub const CANCEL_COMMAND_ID: &str = "cancel_command_id";
    /// Correlation tag echoed into the cancel command file.
    pub const CANCEL_TAG: &str = "cancel_tag";
    /// PID of the process that submitted the order to the broker.
    pub const SUBMITTER_PID: &str = "submitter_pid";
    /// Broker connection identity the order was submitted under.
    pub const CONNECTION_ID: &str = "connection_id";
    /// Marks an order synthesized from an otherwise unresolved event.
    pub const SYNTHESIZED: &str = "synthesized";
    /// Id of the replacement order created by auto-recovery.
    pub const REPLACED_BY: &str = "replaced_by";
    /// Id of the stale order this one replaces.
    pub const REPLACES: &str = "replaces";
}

/// One recorded fact about an order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvenanceEntry {
    /// What the entry describes (see [`keys`]).
    pub key: String,
    /// The recorded value.
    pub value: Value,
    /// Component that recorded it (e.g. `"event_log"`, `"open_orders"`).
    pub source: String,
    /// When it was recorded.
    pub recorded_at: DateTime<Utc>,
}

/// Append-only record of every status change and its origin.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProvenanceLog {
    entries: Vec<ProvenanceEntry>,
}

impl ProvenanceLog {
    /// Create an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a single entry.
    pub fn record(&mut self, source: &str, key: &str, value: Value) {
        self.entries.push(ProvenanceEntry {
            key: key.to_string(),
            value,
            source: source.to_string(),
            recorded_at: Utc::now(),
        });
    }

    /// Append every entry of a patch. Existing entries are never touched.
    pub fn merge(&mut self, source: &str, patch: serde_json::Map<String, Value>) {
        for (key, value) in patch {
            self.record(source, &key, value);
        }
    }

    /// Latest value recorded under `key`, if any.
    #[must_use]
    pub fn latest(&self, key: &str) -> Option<&Value> {
        self.entries
            .iter()
            .rev()
            .find(|e| e.key == key)
            .map(|e| &e.value)
    }

    /// Latest value under `key` as a string slice.
    #[must_use]
    pub fn latest_str(&self, key: &str) -> Option<&str> {
        self.latest(key).and_then(Value::as_str)
    }

    /// Latest value under `key` as an unsigned integer.
    #[must_use]
    pub fn latest_u64(&self, key: &str) -> Option<u64> {
        self.latest(key).and_then(Value::as_u64)
    }

    /// Whether any entry was recorded under `key`.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.entries.iter().any(|e| e.key == key)
    }

    /// All entries in recording order.
    #[must_use]
    pub fn entries(&self) -> &[ProvenanceEntry] {
        &self.entries
    }

    /// Number of recorded entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the log is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn merge_appends_without_overwriting() {
        let mut log = ProvenanceLog::new();
        log.record("event_log", keys::STATUS, json!("SUBMITTED"));

        let mut patch = serde_json::Map::new();
        patch.insert(keys::STATUS.to_string(), json!("CANCELED"));
        patch.insert(keys::REASON.to_string(), json!("missing from open orders"));
        log.merge("open_orders", patch);

        // Both status entries retained; latest wins on lookup.
        assert_eq!(log.len(), 3);
        assert_eq!(log.latest_str(keys::STATUS), Some("CANCELED"));
        assert_eq!(
            log.entries()
                .iter()
                .filter(|e| e.key == keys::STATUS)
                .count(),
            2
        );
    }

    #[test]
    fn latest_returns_none_for_missing_key() {
        let log = ProvenanceLog::new();
        assert!(log.latest(keys::RECOVERED).is_none());
        assert!(!log.contains(keys::RECOVERED));
    }

    #[test]
    fn latest_u64_parses_numeric_values() {
        let mut log = ProvenanceLog::new();
        log.record("submitter", keys::SUBMITTER_PID, json!(4242));
        assert_eq!(log.latest_u64(keys::SUBMITTER_PID), Some(4242));
    }

    #[test]
    fn serde_roundtrip_preserves_order() {
        let mut log = ProvenanceLog::new();
        log.record("a", "k1", json!(1));
        log.record("b", "k2", json!("two"));

        let json = serde_json::to_string(&log).unwrap();
        let parsed: ProvenanceLog = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed.entries()[0].key, "k1");
        assert_eq!(parsed.entries()[1].source, "b");
    }
}
