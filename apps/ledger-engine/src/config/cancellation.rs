//! Cancellation protocol configuration.

use serde::{Deserialize, Serialize};

/// Configuration for the cancellation coordinator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancellationConfig {
    /// Directory name for the leader process's shared command queue.
    #[serde(default = "default_leader_dirname")]
    pub leader_dirname: String,
    /// Directory name for command files inside an owning process's
    /// directory.
    #[serde(default = "default_commands_dirname")]
    pub commands_dirname: String,
    /// Directory name for result files inside an owning process's
    /// directory.
    #[serde(default = "default_results_dirname")]
    pub results_dirname: String,
    /// How long a written command remains valid, in seconds.
    #[serde(default = "default_command_ttl")]
    pub command_ttl_secs: u64,
    /// Wall-clock bound on a stand-in cancel worker, in seconds.
    #[serde(default = "default_worker_timeout")]
    pub worker_timeout_secs: u64,
    /// Executable spawned as a stand-in cancel worker when the original
    /// submitting process is gone. `None` disables worker spawning.
    #[serde(default)]
    pub worker_bin: Option<String>,
}

impl Default for CancellationConfig {
    fn default() -> Self {
        Self {
            leader_dirname: default_leader_dirname(),
            commands_dirname: default_commands_dirname(),
            results_dirname: default_results_dirname(),
            command_ttl_secs: default_command_ttl(),
            worker_timeout_secs: default_worker_timeout(),
            worker_bin: None,
        }
    }
}

fn default_leader_dirname() -> String {
    "leader".to_string()
}

fn default_commands_dirname() -> String {
    "commands".to_string()
}

fn default_results_dirname() -> String {
    "command_results".to_string()
}

const fn default_command_ttl() -> u64 {
    900
}

const fn default_worker_timeout() -> u64 {
    45
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = CancellationConfig::default();
        assert_eq!(config.leader_dirname, "leader");
        assert_eq!(config.commands_dirname, "commands");
        assert_eq!(config.results_dirname, "command_results");
        assert_eq!(config.command_ttl_secs, 900);
        assert_eq!(config.worker_timeout_secs, 45);
        assert!(config.worker_bin.is_none());
    }
}
