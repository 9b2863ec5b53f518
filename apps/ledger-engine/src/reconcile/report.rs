//! Pass report shared by the reconciliation passes.

use tracing::info;

/// Summary of one reconciliation pass.
#[derive(Debug, Clone, Default)]
pub struct ReconcileReport {
    /// Name of the pass that produced the report.
    pub pass: &'static str,
    /// Open orders examined.
    pub examined: usize,
    /// Orders terminalized to `CANCELED`.
    pub canceled: usize,
    /// Orders promoted `NEW -> SUBMITTED`.
    pub promoted: usize,
    /// Low-confidence cancellations recovered to `FILLED`.
    pub recovered: usize,
    /// Orders skipped (protection window, fill disposition, stale data).
    pub skipped: usize,
    /// Warnings accumulated along the way.
    pub warnings: Vec<String>,
    /// Pass duration in milliseconds.
    pub duration_ms: u64,
}

impl ReconcileReport {
    /// Create an empty report for `pass`.
    #[must_use]
    pub fn new(pass: &'static str) -> Self {
        Self {
            pass,
            ..Self::default()
        }
    }

    /// Whether the pass changed any order.
    #[must_use]
    pub const fn mutated(&self) -> bool {
        self.canceled + self.promoted + self.recovered > 0
    }

    /// Log the report at info level.
    pub fn log(&self) {
        info!(
            pass = self.pass,
            examined = self.examined,
            canceled = self.canceled,
            promoted = self.promoted,
            recovered = self.recovered,
            skipped = self.skipped,
            warnings = self.warnings.len(),
            duration_ms = self.duration_ms,
            "Reconciliation pass completed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mutated_reflects_changes() {
        let mut report = ReconcileReport::new("open_orders");
        assert!(!report.mutated());
        report.promoted = 1;
        assert!(report.mutated());
    }
}
