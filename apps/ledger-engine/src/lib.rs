// Allow unwrap/expect in tests - tests should panic on unexpected errors
#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::too_many_lines,
        clippy::needless_pass_by_value,
        clippy::items_after_statements
    )
)]

//! Ledger Engine - Rust Core Library
//!
//! Order lifecycle and broker reconciliation engine for the Meridian
//! trading desk. Keeps an internal order/fill ledger consistent with a
//! brokerage's authoritative state even though the two are updated by
//! different, independently-crashing processes.
//!
//! # Components
//!
//! - [`ledger`]: the order/fill store - leaf data layer.
//! - [`lifecycle`]: the status transition table and the single write
//!   path enforcing it.
//! - [`ingest`]: idempotent ingestion of append-only execution-event
//!   logs.
//! - [`reconcile`]: three snapshot reconciliation passes (completed
//!   orders, open orders, positions) in decreasing confidence order.
//! - [`cancel`]: the file-based cancellation protocol with the
//!   broker-connected process.
//! - [`pnl`]: FIFO realized-P&L over fills since a positions baseline.
//! - [`recovery`]: the stale-order cancel/replace sweep.
//! - [`resilience`]: rate limiting, filesystem locks, liveness probing,
//!   the trading guard.
//!
//! Every pass is an idempotent unit of work: safe to re-run, safe to
//! interleave, and convergent - re-running against unchanged inputs
//! mutates nothing.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

pub mod cancel;
pub mod config;
pub mod error;
pub mod ingest;
pub mod ledger;
pub mod lifecycle;
pub mod models;
pub mod observability;
pub mod pnl;
pub mod reconcile;
pub mod recovery;
pub mod resilience;

pub use cancel::{CancellationCoordinator, FsCommandChannel};
pub use error::LedgerError;
pub use ingest::EventIngestor;
pub use ledger::LedgerStore;
pub use lifecycle::{LifecycleManager, OrderStateMachine, TransitionRequest};
pub use models::{
    BaselineSnapshot, Fill, FillReport, Order, OrderRequest, OrderSide, OrderStatus, OrderType,
};
pub use pnl::RealizedPnlEngine;
pub use reconcile::{
    CompletedOrdersReconciler, HttpBrokerHistoryClient, OpenOrdersReconciler, PositionsReconciler,
};
pub use recovery::AutoRecovery;
pub use resilience::{FileLock, LivenessProbe, RateLimiter, TradingGuard};
