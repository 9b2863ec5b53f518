//! Process liveness probing.
//!
//! The cancellation coordinator needs to know whether the process that
//! originally submitted an order is still alive before deciding to spawn
//! a stand-in worker. The capability is a trait so unit tests can use a
//! static double.

use std::collections::HashSet;
use std::path::Path;
use std::sync::{PoisonError, RwLock};

use tracing::warn;

/// Capability for checking and ending processes by pid.
pub trait LivenessProbe: Send + Sync {
    /// Whether the process is currently alive.
    fn is_alive(&self, pid: u32) -> bool;

    /// Request termination of the process.
    fn terminate(&self, pid: u32);
}

/// Probe backed by the `/proc` filesystem.
#[derive(Debug, Default)]
pub struct ProcLivenessProbe;

impl LivenessProbe for ProcLivenessProbe {
    fn is_alive(&self, pid: u32) -> bool {
        Path::new(&format!("/proc/{pid}")).exists()
    }

    fn terminate(&self, pid: u32) {
        match std::process::Command::new("kill")
            .arg(pid.to_string())
            .status()
        {
            Ok(status) if status.success() => {}
            Ok(status) => warn!(pid, code = ?status.code(), "kill exited non-zero"),
            Err(e) => warn!(pid, error = %e, "Failed to spawn kill"),
        }
    }
}

/// Static probe for tests: alive iff the pid was registered.
#[derive(Debug, Default)]
pub struct StaticLivenessProbe {
    alive: RwLock<HashSet<u32>>,
}

impl StaticLivenessProbe {
    /// Create a probe with no live processes.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a pid as alive.
    pub fn set_alive(&self, pid: u32) {
        self.alive
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(pid);
    }
}

impl LivenessProbe for StaticLivenessProbe {
    fn is_alive(&self, pid: u32) -> bool {
        self.alive
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&pid)
    }

    fn terminate(&self, pid: u32) {
        self.alive
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&pid);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_probe_tracks_registered_pids() {
        let probe = StaticLivenessProbe::new();
        assert!(!probe.is_alive(42));

        probe.set_alive(42);
        assert!(probe.is_alive(42));

        probe.terminate(42);
        assert!(!probe.is_alive(42));
    }

    #[test]
    fn proc_probe_sees_own_process() {
        let probe = ProcLivenessProbe;
        assert!(probe.is_alive(std::process::id()));
    }
}
