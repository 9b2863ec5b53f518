//! Stand-in cancel workers.
//!
//! When the process that submitted an order has died, nobody is left to
//! carry its cancel command to the broker. The coordinator spawns a
//! short-lived worker that takes over the order's original broker
//! connection identity, lets it process the command, and terminates it
//! once a result appears or the timeout expires.

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::sync::{Mutex, PoisonError};

use tracing::{debug, warn};

use crate::error::LedgerError;

/// Handle to a spawned worker.
#[derive(Debug, Clone)]
pub struct WorkerHandle {
    /// Worker pid.
    pub pid: u32,
}

/// Capability for spawning and terminating stand-in workers.
pub trait WorkerSpawner: Send + Sync {
    /// Spawn a worker using the given broker connection identity.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Io`] if the worker executable cannot be
    /// started.
    fn spawn(&self, connection_id: &str) -> Result<WorkerHandle, LedgerError>;

    /// Terminate a previously spawned worker.
    fn terminate(&self, handle: &WorkerHandle);
}

/// Spawner that runs a configured executable per worker.
pub struct ProcessWorkerSpawner {
    bin: PathBuf,
    data_dir: PathBuf,
    children: Mutex<HashMap<u32, Child>>,
}

impl ProcessWorkerSpawner {
    /// Create a spawner for the given worker executable.
    #[must_use]
    pub fn new(bin: PathBuf, data_dir: PathBuf) -> Self {
        Self {
            bin,
            data_dir,
            children: Mutex::new(HashMap::new()),
        }
    }
}

impl WorkerSpawner for ProcessWorkerSpawner {
    fn spawn(&self, connection_id: &str) -> Result<WorkerHandle, LedgerError> {
        let child = Command::new(&self.bin)
            .arg("--connection-id")
            .arg(connection_id)
            .arg("--data-dir")
            .arg(&self.data_dir)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| LedgerError::io(self.bin.display().to_string(), e))?;

        let pid = child.id();
        debug!(pid, connection_id, "Cancel worker spawned");
        self.children
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(pid, child);
        Ok(WorkerHandle { pid })
    }

    fn terminate(&self, handle: &WorkerHandle) {
        let child = self
            .children
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&handle.pid);
        if let Some(mut child) = child {
            if let Err(e) = child.kill() {
                warn!(pid = handle.pid, error = %e, "Failed to kill cancel worker");
            }
            let _ = child.wait();
            debug!(pid = handle.pid, "Cancel worker terminated");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spawn_failure_surfaces_io_error() {
        let spawner = ProcessWorkerSpawner::new(
            PathBuf::from("/nonexistent/worker-bin"),
            PathBuf::from("/tmp"),
        );
        let err = spawner.spawn("conn-1").unwrap_err();
        assert!(matches!(err, LedgerError::Io { .. }));
    }

    #[test]
    fn spawn_and_terminate_real_process() {
        let spawner =
            ProcessWorkerSpawner::new(PathBuf::from("/bin/sleep"), PathBuf::from("/tmp"));
        // sleep ignores the arguments we pass; it just has to outlive the
        // terminate call.
        let handle = spawner.spawn("30").unwrap();
        assert!(handle.pid > 0);
        spawner.terminate(&handle);
    }
}
