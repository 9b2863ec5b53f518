//! Command/result transport to the broker-connected process.
//!
//! Modeled as message passing: a directory is a queue, a filename is a
//! message id. The trait keeps the coordinator decoupled from the
//! transport; the filesystem implementation matches the production
//! exchange layout.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::CancellationConfig;
use crate::error::LedgerError;
use crate::models::{CancelCommand, CommandResult};

/// Where a command is addressed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandTarget {
    /// The leader process's shared command directory, used for
    /// broker-submitted orders.
    Leader,
    /// The per-order directory of a directly-placed order.
    Direct(String),
}

/// Message-passing channel for cancel commands and their results.
pub trait CommandChannel: Send + Sync {
    /// Enqueue a command for the owning process.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Io`] if the command file cannot be written.
    fn send(&self, target: &CommandTarget, command: &CancelCommand) -> Result<(), LedgerError>;

    /// Look for a result keyed by `command_id` across all known result
    /// directories.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Malformed`] for an unreadable result file;
    /// callers count it as a warning and retry next pass.
    fn poll_result(&self, command_id: &str) -> Result<Option<CommandResult>, LedgerError>;
}

/// Filesystem-backed channel rooted at the shared data directory.
pub struct FsCommandChannel {
    root: PathBuf,
    config: CancellationConfig,
    direct_prefix: String,
}

impl FsCommandChannel {
    /// Create a channel rooted at `root`.
    #[must_use]
    pub fn new(root: PathBuf, config: CancellationConfig, direct_prefix: String) -> Self {
        Self {
            root,
            config,
            direct_prefix,
        }
    }

    fn target_dir(&self, target: &CommandTarget) -> PathBuf {
        match target {
            CommandTarget::Leader => self.root.join(&self.config.leader_dirname),
            CommandTarget::Direct(order_id) => {
                self.root.join(format!("{}{order_id}", self.direct_prefix))
            }
        }
    }

    /// All directories a result file may appear in.
    fn result_dirs(&self) -> Vec<PathBuf> {
        let mut dirs = vec![
            self.root
                .join(&self.config.leader_dirname)
                .join(&self.config.results_dirname),
        ];
        if let Ok(entries) = fs::read_dir(&self.root) {
            for entry in entries.flatten() {
                let name = entry.file_name();
                if name
                    .to_str()
                    .is_some_and(|n| n.starts_with(&self.direct_prefix))
                    && entry.path().is_dir()
                {
                    dirs.push(entry.path().join(&self.config.results_dirname));
                }
            }
        }
        dirs
    }
}

impl CommandChannel for FsCommandChannel {
    fn send(&self, target: &CommandTarget, command: &CancelCommand) -> Result<(), LedgerError> {
        let dir = self.target_dir(target).join(&self.config.commands_dirname);
        fs::create_dir_all(&dir).map_err(|e| LedgerError::io(dir.display().to_string(), e))?;

        let path = dir.join(format!("{}.json", command.command_id));
        let body = serde_json::to_vec_pretty(command).map_err(|e| LedgerError::Malformed {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        // Write-then-rename so the consumer never sees a partial file.
        let tmp = dir.join(format!(".{}.tmp", command.command_id));
        fs::write(&tmp, body).map_err(|e| LedgerError::io(tmp.display().to_string(), e))?;
        fs::rename(&tmp, &path).map_err(|e| LedgerError::io(path.display().to_string(), e))?;

        debug!(command_id = %command.command_id, path = %path.display(), "Cancel command written");
        Ok(())
    }

    fn poll_result(&self, command_id: &str) -> Result<Option<CommandResult>, LedgerError> {
        for dir in self.result_dirs() {
            let path = dir.join(format!("{command_id}.json"));
            let content = match fs::read_to_string(&path) {
                Ok(content) => content,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(LedgerError::io(path.display().to_string(), e)),
            };
            let result =
                serde_json::from_str(&content).map_err(|e| LedgerError::Malformed {
                    path: path.display().to_string(),
                    message: e.to_string(),
                })?;
            return Ok(Some(result));
        }
        Ok(None)
    }
}

/// Helper for building the conventional command id.
#[must_use]
pub fn command_id(order_id: &str, nonce: u32) -> String {
    format!("cancel_order_{order_id}_{nonce:08x}")
}

/// Write a result file the way the broker-connected process does.
/// Test-support shared by the coordinator's tests.
#[cfg(test)]
pub fn write_result(dir: &Path, result: &CommandResult) {
    std::fs::create_dir_all(dir).unwrap();
    std::fs::write(
        dir.join(format!("{}.json", result.command_id)),
        serde_json::to_vec(result).unwrap(),
    )
    .unwrap();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CommandStatus;
    use chrono::Utc;

    fn make_channel(root: &Path) -> FsCommandChannel {
        FsCommandChannel::new(
            root.to_path_buf(),
            CancellationConfig::default(),
            "direct_".to_string(),
        )
    }

    fn make_command(id: &str) -> CancelCommand {
        CancelCommand {
            command_id: id.to_string(),
            command_type: "cancel_order".to_string(),
            order_id: "ord-1".to_string(),
            tag: "t-1".to_string(),
            requested_at: Utc::now(),
            expires_at: Utc::now() + chrono::Duration::minutes(15),
        }
    }

    #[test]
    fn send_writes_command_into_leader_queue() {
        let dir = tempfile::tempdir().unwrap();
        let channel = make_channel(dir.path());

        channel
            .send(&CommandTarget::Leader, &make_command("cancel_order_ord-1_1"))
            .unwrap();

        let path = dir
            .path()
            .join("leader/commands/cancel_order_ord-1_1.json");
        assert!(path.exists());
        let parsed: CancelCommand =
            serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(parsed.command_type, "cancel_order");
        assert_eq!(parsed.tag, "t-1");
    }

    #[test]
    fn send_writes_into_per_order_directory_for_direct_orders() {
        let dir = tempfile::tempdir().unwrap();
        let channel = make_channel(dir.path());

        channel
            .send(
                &CommandTarget::Direct("ord-9".to_string()),
                &make_command("cancel_order_ord-9_2"),
            )
            .unwrap();

        assert!(
            dir.path()
                .join("direct_ord-9/commands/cancel_order_ord-9_2.json")
                .exists()
        );
    }

    #[test]
    fn poll_finds_results_in_any_known_directory() {
        let dir = tempfile::tempdir().unwrap();
        let channel = make_channel(dir.path());

        assert!(channel.poll_result("c-1").unwrap().is_none());

        write_result(
            &dir.path().join("direct_ord-9/command_results"),
            &CommandResult {
                command_id: "c-1".to_string(),
                status: CommandStatus::Ok,
                processed_at: Some(Utc::now()),
                brokerage_ids: None,
            },
        );

        let result = channel.poll_result("c-1").unwrap().unwrap();
        assert_eq!(result.status, CommandStatus::Ok);
    }

    #[test]
    fn unreadable_result_is_malformed_error() {
        let dir = tempfile::tempdir().unwrap();
        let channel = make_channel(dir.path());

        let results = dir.path().join("leader/command_results");
        std::fs::create_dir_all(&results).unwrap();
        std::fs::write(results.join("c-2.json"), "{broken").unwrap();

        let err = channel.poll_result("c-2").unwrap_err();
        assert!(matches!(err, LedgerError::Malformed { .. }));
    }

    #[test]
    fn command_id_format() {
        assert_eq!(command_id("ord-1", 0xAB), "cancel_order_ord-1_000000ab");
    }
}
