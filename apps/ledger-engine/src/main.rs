//! Ledger Engine Binary
//!
//! Runs every idempotent pass of the order lifecycle & broker
//! reconciliation engine on its configured interval.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin ledger-engine [config-file]
//! ```
//!
//! # Environment Variables
//!
//! - `LEDGER_DATA_DIR`: shared data directory of the broker-connected
//!   process (default: `data`)
//! - `LEDGER_BROKER__HISTORY_URL`: completed-order history endpoint
//! - `RUST_LOG`: log filter (default: info)
//!
//! Any `Settings` field can be overridden with a `LEDGER_`-prefixed,
//! `__`-separated variable.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::signal;
use tokio::time::interval;
use tracing::{debug, info, warn};

use ledger_engine::cancel::{CancellationCoordinator, FsCommandChannel, ProcessWorkerSpawner};
use ledger_engine::config::Settings;
use ledger_engine::error::LedgerError;
use ledger_engine::ingest::EventIngestor;
use ledger_engine::ledger::LedgerStore;
use ledger_engine::lifecycle::LifecycleManager;
use ledger_engine::models::BaselineSnapshot;
use ledger_engine::pnl::RealizedPnlEngine;
use ledger_engine::reconcile::{
    CompletedOrdersReconciler, HttpBrokerHistoryClient, OpenOrdersReconciler,
    PositionsReconciler, load_open_orders, load_positions,
};
use ledger_engine::recovery::{AutoRecovery, NoQuoteSource, StaticConnectivity};
use ledger_engine::resilience::{ProcLivenessProbe, RateLimiter, TradingGuard};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    ledger_engine::observability::init_tracing();

    let config_path = std::env::args().nth(1);
    let settings =
        Settings::load(config_path.as_deref()).context("failed to load configuration")?;

    info!(
        data_dir = %settings.data_dir.display(),
        history_url = %settings.broker.history_url,
        "Starting Meridian ledger engine"
    );

    // Shared ledger and the single write path into it.
    let store = Arc::new(LedgerStore::new());
    let lifecycle = Arc::new(LifecycleManager::new(Arc::clone(&store)));
    let guard = Arc::new(TradingGuard::new());

    let ingestor = EventIngestor::new(Arc::clone(&lifecycle), settings.ingestion.clone());

    let history = Arc::new(
        HttpBrokerHistoryClient::new(&settings.broker)
            .context("failed to build broker history client")?,
    );
    let limiter = Arc::new(RateLimiter::new(Duration::from_secs(
        settings.broker.min_query_interval_secs,
    )));
    let completed =
        CompletedOrdersReconciler::new(Arc::clone(&lifecycle), history, Arc::clone(&limiter));
    let open_orders =
        OpenOrdersReconciler::new(Arc::clone(&lifecycle), settings.reconciliation.clone());
    let positions = PositionsReconciler::new(Arc::clone(&lifecycle));

    let channel = Arc::new(FsCommandChannel::new(
        settings.data_dir.clone(),
        settings.cancellation.clone(),
        settings.ingestion.direct_prefix.clone(),
    ));
    let spawner = settings.cancellation.worker_bin.as_ref().map(|bin| {
        Arc::new(ProcessWorkerSpawner::new(
            bin.into(),
            settings.data_dir.clone(),
        )) as Arc<dyn ledger_engine::cancel::WorkerSpawner>
    });
    let coordinator = CancellationCoordinator::new(
        Arc::clone(&lifecycle),
        channel,
        Arc::new(ProcLivenessProbe),
        spawner,
        settings.cancellation.clone(),
        settings.data_dir.join("locks"),
    );

    let recovery = AutoRecovery::new(
        Arc::clone(&lifecycle),
        Arc::clone(&guard),
        Arc::new(NoQuoteSource),
        Arc::new(StaticConnectivity(true)),
        settings.recovery.clone(),
    );

    // Realized-P&L accounting starts from the positions at boot.
    let positions_path = settings.data_dir.join(&settings.reconciliation.positions_file);
    let baseline = Arc::new(load_baseline(&positions_path));
    let pnl = RealizedPnlEngine::new(
        Arc::clone(&store) as Arc<dyn ledger_engine::pnl::FillSource>,
        Duration::from_secs(settings.pnl.cache_ttl_secs),
    );

    let open_orders_path = settings
        .data_dir
        .join(&settings.reconciliation.open_orders_file);

    let mut ingest_tick = interval(Duration::from_secs(settings.scheduler.ingest_secs));
    let mut completed_tick =
        interval(Duration::from_secs(settings.scheduler.completed_orders_secs));
    let mut open_tick = interval(Duration::from_secs(settings.scheduler.open_orders_secs));
    let mut positions_tick = interval(Duration::from_secs(settings.scheduler.positions_secs));
    let mut cancel_tick = interval(Duration::from_secs(settings.scheduler.cancel_results_secs));
    let mut recovery_tick = interval(Duration::from_secs(settings.scheduler.recovery_secs));

    info!("Ledger engine running; ctrl-c to stop");
    loop {
        tokio::select! {
            _ = signal::ctrl_c() => {
                info!("Shutdown signal received");
                break;
            }
            _ = ingest_tick.tick() => {
                ingestor.ingest_dir(&settings.data_dir);
            }
            _ = completed_tick.tick() => {
                match completed.run().await {
                    Ok(_) => {}
                    Err(LedgerError::ThrottledQuery { retry_after }) => {
                        debug!(?retry_after, "Completed-orders query throttled");
                    }
                    Err(e) => warn!(error = %e, "Completed-orders pass failed"),
                }
            }
            _ = open_tick.tick() => {
                match load_open_orders(&open_orders_path) {
                    Ok(snapshot) => {
                        open_orders.run(&snapshot);
                    }
                    Err(e) => debug!(error = %e, "Open-orders snapshot unavailable"),
                }
            }
            _ = positions_tick.tick() => {
                match load_positions(&positions_path) {
                    Ok(snapshot) => {
                        positions.run(&snapshot, &baseline);
                        let realized = pnl.realized(&baseline, None);
                        let total: rust_decimal::Decimal =
                            realized.by_symbol.values().copied().sum();
                        info!(
                            symbols = realized.by_symbol.len(),
                            total_realized = %total,
                            "Realized P&L refreshed"
                        );
                    }
                    Err(e) => debug!(error = %e, "Positions snapshot unavailable"),
                }
            }
            _ = cancel_tick.tick() => {
                coordinator.finalize_pending();
            }
            _ = recovery_tick.tick() => {
                recovery.sweep();
            }
        }
    }

    info!(orders = store.count(), "Ledger engine stopped");
    Ok(())
}

/// Load the P&L baseline from the positions snapshot, falling back to an
/// empty baseline when none is readable yet.
fn load_baseline(path: &std::path::Path) -> BaselineSnapshot {
    match load_positions(path) {
        Ok(snapshot) => {
            info!(
                positions = snapshot.items.len(),
                refreshed_at = %snapshot.refreshed_at,
                "Baseline seeded from positions snapshot"
            );
            BaselineSnapshot::from_positions(&snapshot)
        }
        Err(e) => {
            warn!(error = %e, "No positions snapshot; starting from an empty baseline");
            BaselineSnapshot::empty(chrono::Utc::now())
        }
    }
}
