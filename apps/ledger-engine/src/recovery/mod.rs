//! Auto-recovery sweep for stuck orders.
//!
//! Periodically cancels `NEW` orders with zero fill that have sat past
//! the staleness timeout and, when conditions allow, creates a
//! replacement order with a derived, collision-free correlation tag and
//! an incremented attempt counter. Replacements per original order are
//! capped; every skip records its reason.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use rand::Rng;
use rust_decimal::Decimal;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::config::RecoveryConfig;
use crate::error::LedgerError;
use crate::lifecycle::{LifecycleManager, TransitionRequest};
use crate::models::{Order, OrderStatus, keys};
use crate::resilience::TradingGuard;

/// Source label recorded for everything the sweep writes.
const SOURCE: &str = "auto_recovery";

/// A quote observation for one symbol.
#[derive(Debug, Clone)]
pub struct Quote {
    /// Best bid.
    pub bid: Decimal,
    /// Best ask.
    pub ask: Decimal,
    /// When the quote was observed.
    pub at: DateTime<Utc>,
    /// Whether the feed considers the quote stale.
    pub stale: bool,
}

impl Quote {
    /// Midpoint of the quote.
    #[must_use]
    pub fn mid(&self) -> Decimal {
        (self.bid + self.ask) / Decimal::TWO
    }
}

/// Source of latest quotes.
pub trait QuoteSource: Send + Sync {
    /// Latest quote for `symbol`, if any.
    fn latest(&self, symbol: &str) -> Option<Quote>;
}

/// Quote source with no feed attached: every lookup is `None`.
#[derive(Debug, Default)]
pub struct NoQuoteSource;

impl QuoteSource for NoQuoteSource {
    fn latest(&self, _symbol: &str) -> Option<Quote> {
        None
    }
}

/// Broker connectivity probe.
pub trait ConnectivityProbe: Send + Sync {
    /// Whether the broker connection is currently reachable.
    fn is_reachable(&self) -> bool;
}

/// Connectivity probe pinned to a fixed answer; also the test double.
#[derive(Debug)]
pub struct StaticConnectivity(pub bool);

impl ConnectivityProbe for StaticConnectivity {
    fn is_reachable(&self) -> bool {
        self.0
    }
}

/// Summary of one auto-recovery sweep.
#[derive(Debug, Default)]
pub struct SweepReport {
    /// Stale orders examined.
    pub examined: usize,
    /// Stale orders canceled.
    pub canceled: usize,
    /// Replacement orders created.
    pub replaced: usize,
    /// Orders left pending, with reasons in `warnings`.
    pub skipped: usize,
    /// Skip/failure reasons.
    pub warnings: Vec<String>,
    /// Sweep duration in milliseconds.
    pub duration_ms: u64,
}

/// Cancels and replaces orders stuck in `NEW` too long.
pub struct AutoRecovery {
    lifecycle: Arc<LifecycleManager>,
    guard: Arc<TradingGuard>,
    quotes: Arc<dyn QuoteSource>,
    connectivity: Arc<dyn ConnectivityProbe>,
    config: RecoveryConfig,
}

impl AutoRecovery {
    /// Create the sweep.
    #[must_use]
    pub fn new(
        lifecycle: Arc<LifecycleManager>,
        guard: Arc<TradingGuard>,
        quotes: Arc<dyn QuoteSource>,
        connectivity: Arc<dyn ConnectivityProbe>,
        config: RecoveryConfig,
    ) -> Self {
        Self {
            lifecycle,
            guard,
            quotes,
            connectivity,
            config,
        }
    }

    /// Run one sweep.
    pub fn sweep(&self) -> SweepReport {
        let start = Instant::now();
        let mut report = SweepReport::default();
        if !self.config.enabled {
            return report;
        }

        let now = Utc::now();
        for order in self.lifecycle.store().orders_in_status(OrderStatus::New) {
            if order.filled_quantity > Decimal::ZERO
                || order.age_secs(now) < self.config.stale_after_secs
            {
                continue;
            }
            report.examined += 1;

            if let Some(reason) = self.skip_reason(&order) {
                debug!(order_id = %order.id, reason = %reason, "Stale order left pending");
                report.skipped += 1;
                report.warnings.push(format!("{}: {reason}", order.id));
                continue;
            }

            match self.cancel_and_replace(&order, now) {
                Ok(replaced) => {
                    report.canceled += 1;
                    if replaced {
                        report.replaced += 1;
                    }
                }
                Err(e) => {
                    warn!(order_id = %order.id, error = %e, "Auto-recovery failed for order");
                    report.warnings.push(e.to_string());
                }
            }
        }

        report.duration_ms = start.elapsed().as_millis() as u64;
        info!(
            examined = report.examined,
            canceled = report.canceled,
            replaced = report.replaced,
            skipped = report.skipped,
            duration_ms = report.duration_ms,
            "Auto-recovery sweep completed"
        );
        report
    }

    /// Why this order must be left pending, if any reason applies.
    fn skip_reason(&self, order: &Order) -> Option<String> {
        if self.guard.is_halted() {
            return Some("trading guard halted".to_string());
        }
        if !self.connectivity.is_reachable() {
            return Some(LedgerError::BrokerUnreachable("connectivity probe failed".to_string()).to_string());
        }
        if order.attempt >= self.config.max_attempts {
            return Some(format!(
                "attempt limit reached ({}/{})",
                order.attempt, self.config.max_attempts
            ));
        }
        if let (Some(limit), Some(quote)) =
            (order.limit_price, self.quotes.latest(&order.symbol))
        {
            let mid = quote.mid();
            if mid > Decimal::ZERO {
                let deviation = (limit - mid).abs() / mid;
                // No fresher quote exists than the latest one; an
                // excessive deviation means the limit is unsalvageable
                // right now.
                if deviation > self.config.max_price_deviation {
                    return Some(format!(
                        "limit price deviates {deviation:.4} from mid {mid}"
                    ));
                }
            }
        }
        None
    }

    /// Cancel the stale order and, unless quotes forbid it, insert a
    /// replacement. Returns whether a replacement was created.
    fn cancel_and_replace(&self, order: &Order, now: DateTime<Utc>) -> Result<bool, LedgerError> {
        self.lifecycle.transition(
            &order.id,
            TransitionRequest::new(OrderStatus::Canceled, SOURCE)
                .with_reason(format!(
                    "stale for {}s without fill",
                    order.age_secs(now)
                )),
        )?;

        let quotes_stale = self
            .quotes
            .latest(&order.symbol)
            .is_none_or(|quote| quote.stale);
        if quotes_stale && !self.config.allow_extended_hours {
            debug!(
                order_id = %order.id,
                "Quotes stale and extended hours disallowed; no replacement"
            );
            return Ok(false);
        }

        let replacement = self.build_replacement(order)?;
        let replacement_id = replacement.id.clone();
        let replacement_tag = replacement.tag.clone();
        self.lifecycle.store().insert(replacement)?;
        self.lifecycle.store().mutate(&order.id, |o| {
            o.provenance
                .record(SOURCE, keys::REPLACED_BY, json!(replacement_id));
            Ok(())
        })?;

        info!(
            order_id = %order.id,
            replacement_id = %replacement_id,
            replacement_tag = %replacement_tag,
            attempt = order.attempt + 1,
            "Stale order replaced"
        );
        Ok(true)
    }

    /// Build the replacement order: same symbol/side/quantity/type, a
    /// derived collision-free tag, incremented attempt counter.
    fn build_replacement(&self, order: &Order) -> Result<Order, LedgerError> {
        let store = self.lifecycle.store();
        let attempt = order.attempt + 1;

        let mut tag = Self::derive_tag(&order.tag, attempt);
        while store.get_by_tag(&tag).is_some() {
            tag = Self::derive_tag(&order.tag, attempt);
        }

        let mut replacement = Order::new(crate::models::OrderRequest {
            run_id: order.run_id.clone(),
            tag,
            symbol: order.symbol.clone(),
            side: order.side,
            order_type: order.order_type,
            quantity: order.requested_quantity,
            limit_price: order.limit_price,
            attempt,
        })?;
        replacement
            .provenance
            .record(SOURCE, keys::REPLACES, json!(order.id));
        Ok(replacement)
    }

    fn derive_tag(base: &str, attempt: u32) -> String {
        let nonce: u16 = rand::rng().random();
        format!("{base}-r{attempt}-{nonce:04x}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::LedgerStore;
    use crate::models::{OrderRequest, OrderSide, OrderType};
    use rust_decimal_macros::dec;
    use std::sync::Mutex;

    struct StaticQuotes {
        quote: Mutex<Option<Quote>>,
    }

    impl StaticQuotes {
        fn fresh(bid: Decimal, ask: Decimal) -> Self {
            Self {
                quote: Mutex::new(Some(Quote {
                    bid,
                    ask,
                    at: Utc::now(),
                    stale: false,
                })),
            }
        }

        fn stale(bid: Decimal, ask: Decimal) -> Self {
            Self {
                quote: Mutex::new(Some(Quote {
                    bid,
                    ask,
                    at: Utc::now() - chrono::Duration::hours(2),
                    stale: true,
                })),
            }
        }
    }

    impl QuoteSource for StaticQuotes {
        fn latest(&self, _symbol: &str) -> Option<Quote> {
            self.quote.lock().unwrap().clone()
        }
    }

    fn make_recovery(
        quotes: Arc<dyn QuoteSource>,
        reachable: bool,
        config: RecoveryConfig,
    ) -> AutoRecovery {
        AutoRecovery::new(
            Arc::new(LifecycleManager::new(Arc::new(LedgerStore::new()))),
            Arc::new(TradingGuard::new()),
            quotes,
            Arc::new(StaticConnectivity(reachable)),
            config,
        )
    }

    fn insert_stale_order(recovery: &AutoRecovery, attempt: u32, age_secs: i64) -> String {
        let mut order = Order::new(OrderRequest {
            run_id: Some("run-7".to_string()),
            tag: format!("t-{}", uuid::Uuid::new_v4().simple()),
            symbol: "AAPL".to_string(),
            side: OrderSide::Buy,
            order_type: OrderType::Limit,
            quantity: dec!(100),
            limit_price: Some(dec!(150)),
            attempt,
        })
        .unwrap();
        order.created_at = Utc::now() - chrono::Duration::seconds(age_secs);
        let id = order.id.clone();
        recovery.lifecycle.store().insert(order).unwrap();
        id
    }

    fn default_config() -> RecoveryConfig {
        RecoveryConfig {
            stale_after_secs: 60,
            ..RecoveryConfig::default()
        }
    }

    #[test]
    fn stale_order_is_canceled_and_replaced() {
        let recovery = make_recovery(
            Arc::new(StaticQuotes::fresh(dec!(149), dec!(151))),
            true,
            default_config(),
        );
        let id = insert_stale_order(&recovery, 0, 600);

        let report = recovery.sweep();
        assert_eq!(report.canceled, 1);
        assert_eq!(report.replaced, 1);

        let original = recovery.lifecycle.store().get(&id).unwrap();
        assert_eq!(original.status, OrderStatus::Canceled);
        let replacement_id = original
            .provenance
            .latest_str(keys::REPLACED_BY)
            .unwrap()
            .to_string();

        let replacement = recovery.lifecycle.store().get(&replacement_id).unwrap();
        assert_eq!(replacement.status, OrderStatus::New);
        assert_eq!(replacement.symbol, original.symbol);
        assert_eq!(replacement.side, original.side);
        assert_eq!(replacement.requested_quantity, original.requested_quantity);
        assert_eq!(replacement.order_type, original.order_type);
        assert_eq!(replacement.attempt, 1);
        assert_ne!(replacement.tag, original.tag);
        assert_eq!(
            replacement.provenance.latest_str(keys::REPLACES),
            Some(id.as_str())
        );
    }

    #[test]
    fn fresh_order_is_not_touched() {
        let recovery = make_recovery(
            Arc::new(StaticQuotes::fresh(dec!(149), dec!(151))),
            true,
            default_config(),
        );
        let id = insert_stale_order(&recovery, 0, 10);

        let report = recovery.sweep();
        assert_eq!(report.examined, 0);
        assert_eq!(
            recovery.lifecycle.store().get(&id).unwrap().status,
            OrderStatus::New
        );
    }

    #[test]
    fn halted_guard_skips_everything() {
        let recovery = make_recovery(
            Arc::new(StaticQuotes::fresh(dec!(149), dec!(151))),
            true,
            default_config(),
        );
        let id = insert_stale_order(&recovery, 0, 600);
        recovery.guard.halt("test halt");

        let report = recovery.sweep();
        assert_eq!(report.skipped, 1);
        assert_eq!(report.canceled, 0);
        assert_eq!(
            recovery.lifecycle.store().get(&id).unwrap().status,
            OrderStatus::New
        );
    }

    #[test]
    fn unreachable_broker_skips_everything() {
        let recovery = make_recovery(
            Arc::new(StaticQuotes::fresh(dec!(149), dec!(151))),
            false,
            default_config(),
        );
        insert_stale_order(&recovery, 0, 600);

        let report = recovery.sweep();
        assert_eq!(report.skipped, 1);
        assert_eq!(report.canceled, 0);
    }

    #[test]
    fn excessive_price_deviation_skips_limit_order() {
        // Limit 150 vs mid 100: 50% deviation, far past the 2% cap.
        let recovery = make_recovery(
            Arc::new(StaticQuotes::fresh(dec!(99), dec!(101))),
            true,
            default_config(),
        );
        let id = insert_stale_order(&recovery, 0, 600);

        let report = recovery.sweep();
        assert_eq!(report.skipped, 1);
        assert_eq!(
            recovery.lifecycle.store().get(&id).unwrap().status,
            OrderStatus::New
        );
    }

    #[test]
    fn stale_quotes_cancel_without_replacement() {
        let recovery = make_recovery(
            Arc::new(StaticQuotes::stale(dec!(149), dec!(151))),
            true,
            default_config(),
        );
        let id = insert_stale_order(&recovery, 0, 600);

        let report = recovery.sweep();
        assert_eq!(report.canceled, 1);
        assert_eq!(report.replaced, 0);
        assert_eq!(
            recovery.lifecycle.store().get(&id).unwrap().status,
            OrderStatus::Canceled
        );
        assert_eq!(recovery.lifecycle.store().count(), 1);
    }

    #[test]
    fn stale_quotes_replace_when_extended_hours_allowed() {
        let recovery = make_recovery(
            Arc::new(StaticQuotes::stale(dec!(149), dec!(151))),
            true,
            RecoveryConfig {
                allow_extended_hours: true,
                ..default_config()
            },
        );
        insert_stale_order(&recovery, 0, 600);

        let report = recovery.sweep();
        assert_eq!(report.replaced, 1);
    }

    #[test]
    fn replacement_count_never_exceeds_max_attempts() {
        let max_attempts = 3;
        let recovery = make_recovery(
            Arc::new(StaticQuotes::fresh(dec!(149), dec!(151))),
            true,
            RecoveryConfig {
                max_attempts,
                ..default_config()
            },
        );
        insert_stale_order(&recovery, 0, 600);

        // Sweep far more times than the cap, re-staling the replacement
        // each round.
        for _ in 0..10 {
            recovery.sweep();
            for order in recovery.lifecycle.store().orders_in_status(OrderStatus::New) {
                recovery
                    .lifecycle
                    .store()
                    .mutate(&order.id, |o| {
                        o.created_at = Utc::now() - chrono::Duration::seconds(600);
                        Ok(())
                    })
                    .unwrap();
            }
        }

        // Original + at most `max_attempts` replacements.
        assert_eq!(
            recovery.lifecycle.store().count() as u32,
            1 + max_attempts
        );
        let still_new = recovery.lifecycle.store().orders_in_status(OrderStatus::New);
        assert_eq!(still_new.len(), 1);
        assert_eq!(still_new[0].attempt, max_attempts);
    }
}
