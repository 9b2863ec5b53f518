//! Execution-event ingestion.
//!
//! Parses the append-only event logs written by broker-connected
//! processes, resolves each event to a ledger order, and applies fills
//! and status effects through the lifecycle manager. Safe to re-run over
//! the same log from the start: every effect is idempotent.

mod tag;

pub use tag::{RunTag, direct_order_id};

use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::{Map, json};
use tracing::{debug, info, warn};

use crate::config::IngestionConfig;
use crate::error::LedgerError;
use crate::lifecycle::{FillOutcome, LifecycleManager, TransitionRequest};
use crate::models::{
    ExecutionEvent, FillReport, LifecycleStatus, Order, OrderStatus, ProvenanceLog, keys,
};

/// Source label recorded for everything the ingestor writes.
const SOURCE: &str = "event_log";

/// Summary of one ingestion run.
#[derive(Debug, Default)]
pub struct IngestReport {
    /// Files read.
    pub files: usize,
    /// Event lines seen.
    pub lines: usize,
    /// Fills recorded.
    pub fills_applied: usize,
    /// Status transitions applied.
    pub transitions: usize,
    /// Duplicate fills skipped.
    pub duplicates: usize,
    /// Orders synthesized for run-scoped tags.
    pub synthesized: usize,
    /// Events that resolved to no order.
    pub unresolved: usize,
    /// Lines that failed to parse.
    pub malformed: usize,
    /// Warnings accumulated along the way.
    pub warnings: Vec<String>,
}

impl IngestReport {
    /// Fold another report into this one.
    pub fn absorb(&mut self, other: Self) {
        self.files += other.files;
        self.lines += other.lines;
        self.fills_applied += other.fills_applied;
        self.transitions += other.transitions;
        self.duplicates += other.duplicates;
        self.synthesized += other.synthesized;
        self.unresolved += other.unresolved;
        self.malformed += other.malformed;
        self.warnings.extend(other.warnings);
    }
}

/// Applies execution-event logs to the ledger.
pub struct EventIngestor {
    lifecycle: Arc<LifecycleManager>,
    config: IngestionConfig,
}

impl EventIngestor {
    /// Create an ingestor.
    #[must_use]
    pub fn new(lifecycle: Arc<LifecycleManager>, config: IngestionConfig) -> Self {
        Self { lifecycle, config }
    }

    /// Ingest the shared event log plus every per-order variant under
    /// `direct_<order-id>/` in the data directory.
    pub fn ingest_dir(&self, data_dir: &Path) -> IngestReport {
        let mut report = self.ingest_file(&data_dir.join(&self.config.event_log));

        if let Ok(entries) = std::fs::read_dir(data_dir) {
            for entry in entries.flatten() {
                let name = entry.file_name();
                let Some(name) = name.to_str() else { continue };
                if name.starts_with(&self.config.direct_prefix) && entry.path().is_dir() {
                    report.absorb(self.ingest_file(&entry.path().join(&self.config.event_log)));
                }
            }
        }

        info!(
            files = report.files,
            lines = report.lines,
            fills = report.fills_applied,
            transitions = report.transitions,
            duplicates = report.duplicates,
            unresolved = report.unresolved,
            malformed = report.malformed,
            "Event ingestion completed"
        );
        report
    }

    /// Ingest a single event log. A missing file is an empty run, and a
    /// corrupt line never aborts the pass.
    pub fn ingest_file(&self, path: &Path) -> IngestReport {
        let mut report = IngestReport::default();

        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No event log present");
                return report;
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read event log");
                report
                    .warnings
                    .push(format!("unreadable log {}: {e}", path.display()));
                return report;
            }
        };
        report.files = 1;

        for line in content.lines() {
            if line.trim().is_empty() {
                continue;
            }
            report.lines += 1;

            let event: ExecutionEvent = match serde_json::from_str(line) {
                Ok(event) => event,
                Err(e) => {
                    report.malformed += 1;
                    warn!(path = %path.display(), error = %e, "Malformed event line skipped");
                    continue;
                }
            };

            match self.resolve(&event, path, &mut report) {
                Some(order) => self.apply(&event, &order, &mut report),
                None => {
                    report.unresolved += 1;
                    warn!(
                        tag = %event.tag,
                        broker_order_id = event.order_id,
                        "{}",
                        LedgerError::UnresolvedEvent(event.tag.clone())
                    );
                }
            }
        }
        report
    }

    /// Resolve an event to an order: correlation tag first, then the
    /// path-embedded direct-order id, then synthesis from a run-scoped
    /// tag so an event is never silently dropped.
    fn resolve(
        &self,
        event: &ExecutionEvent,
        path: &Path,
        report: &mut IngestReport,
    ) -> Option<Order> {
        let store = self.lifecycle.store();

        if let Some(order) = store.get_by_tag(&event.tag) {
            return Some(order);
        }

        if let Some(order_id) = direct_order_id(path, &self.config.direct_prefix)
            && let Some(order) = store.get(&order_id)
        {
            return Some(order);
        }

        let run_tag = RunTag::parse(&event.tag)?;
        if run_tag.namespace != self.config.namespace {
            return None;
        }

        let order = Self::synthesize(event, &run_tag);
        match store.insert(order.clone()) {
            Ok(()) => {
                report.synthesized += 1;
                info!(
                    tag = %event.tag,
                    order_id = %order.id,
                    "Synthesized order for run-scoped event"
                );
                Some(order)
            }
            // Another pass inserted it between lookup and insert.
            Err(LedgerError::DuplicateTag(_)) => store.get_by_tag(&event.tag),
            Err(e) => {
                report.warnings.push(format!("synthesis failed: {e}"));
                None
            }
        }
    }

    /// Build a ledger order for an event whose run-scoped tag has no
    /// order yet. The requested quantity starts at the event's cumulative
    /// fill and grows if later events report more.
    fn synthesize(event: &ExecutionEvent, run_tag: &RunTag) -> Order {
        let now = Utc::now();
        let mut provenance = ProvenanceLog::new();
        provenance.record(SOURCE, keys::STATUS, json!(OrderStatus::New));
        provenance.record(SOURCE, keys::SYNTHESIZED, json!(true));

        Order {
            id: uuid::Uuid::new_v4().to_string(),
            run_id: Some(run_tag.run_id.clone()),
            tag: event.tag.clone(),
            symbol: event.symbol.clone(),
            side: event.direction,
            order_type: crate::models::OrderType::Market,
            requested_quantity: event.filled.max(Decimal::ZERO),
            limit_price: None,
            broker_order_id: (event.order_id > 0).then_some(event.order_id),
            status: OrderStatus::New,
            filled_quantity: Decimal::ZERO,
            avg_fill_price: None,
            attempt: 0,
            provenance,
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply fill and status effects for one resolved event.
    fn apply(&self, event: &ExecutionEvent, order: &Order, report: &mut IngestReport) {
        let store = self.lifecycle.store();

        // Bind the broker-assigned id once known.
        if order.broker_order_id.is_none() && event.order_id > 0 {
            let bind = store.mutate(&order.id, |o| {
                if o.broker_order_id.is_none() {
                    o.broker_order_id = Some(event.order_id);
                }
                Ok(())
            });
            if let Err(e) = bind {
                report.warnings.push(e.to_string());
            }
        }

        // Fills first: a fill always takes precedence over a concurrently
        // observed cancel/terminal signal for the same order.
        self.apply_fill_delta(event, &order.id, report);

        let Some(current) = store.get(&order.id) else {
            return;
        };

        match event.status {
            LifecycleStatus::Submitted => {
                if current.status == OrderStatus::New {
                    self.apply_transition(
                        &current.id,
                        TransitionRequest::new(OrderStatus::Submitted, SOURCE)
                            .with_reason("broker acknowledged"),
                        report,
                    );
                }
            }
            // Fill handling above already moved the order.
            LifecycleStatus::Filled => {}
            LifecycleStatus::Cancelled => {
                self.terminalize(&current, OrderStatus::Canceled, event, report);
            }
            LifecycleStatus::Rejected => {
                self.terminalize(&current, OrderStatus::Rejected, event, report);
            }
            LifecycleStatus::Invalid => {
                self.terminalize(&current, OrderStatus::Invalid, event, report);
            }
        }
    }

    /// Record the difference between the event's cumulative fill and the
    /// ledger's, if positive.
    fn apply_fill_delta(&self, event: &ExecutionEvent, order_id: &str, report: &mut IngestReport) {
        let store = self.lifecycle.store();
        let Some(order) = store.get(order_id) else {
            return;
        };
        if event.filled <= order.filled_quantity {
            return;
        }

        let Some(price) = event.fill_price else {
            report
                .warnings
                .push(format!("fill event without price for tag {}", event.tag));
            return;
        };

        // Synthesized orders start with an estimated requested quantity;
        // grow it when the broker reports more.
        if order.provenance.contains(keys::SYNTHESIZED)
            && event.filled > order.requested_quantity
        {
            let grow = store.mutate(order_id, |o| {
                o.requested_quantity = event.filled;
                o.provenance
                    .record(SOURCE, "requested_quantity", json!(event.filled));
                Ok(())
            });
            if let Err(e) = grow {
                report.warnings.push(e.to_string());
                return;
            }
        }

        let delta = event.filled - order.filled_quantity;
        let fill = FillReport {
            quantity: delta,
            price,
            commission: Decimal::ZERO,
            exec_id: event.exec_id.clone(),
            executed_at: event.time,
            source: SOURCE.to_string(),
        };
        match self.lifecycle.apply_fill(order_id, fill, Map::new()) {
            Ok(FillOutcome::Applied { .. }) => {
                report.fills_applied += 1;
                report.transitions += 1;
            }
            Ok(FillOutcome::Duplicate) => report.duplicates += 1,
            Err(e) => {
                warn!(order_id, error = %e, "Fill not applied");
                report.warnings.push(e.to_string());
            }
        }
    }

    /// Move an order to a terminal state unless it is already terminal.
    fn terminalize(
        &self,
        order: &Order,
        status: OrderStatus,
        event: &ExecutionEvent,
        report: &mut IngestReport,
    ) {
        if order.status.is_terminal() {
            return;
        }
        let mut request = TransitionRequest::new(status, SOURCE);
        if let Some(reason) = &event.reason {
            request = request.with_reason(reason.clone());
        }
        self.apply_transition(&order.id, request, report);
    }

    fn apply_transition(
        &self,
        order_id: &str,
        request: TransitionRequest,
        report: &mut IngestReport,
    ) {
        match self.lifecycle.transition(order_id, request) {
            Ok(_) => report.transitions += 1,
            Err(e) => {
                debug!(order_id, error = %e, "Transition not applied");
                report.warnings.push(e.to_string());
            }
        }
    }
}
