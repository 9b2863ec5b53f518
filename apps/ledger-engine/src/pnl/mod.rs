//! Realized-P&L engine.
//!
//! FIFO lot matching over fills since a baseline, attributing realized
//! amounts simultaneously to the symbol, the originating order, and the
//! individual fill. Results are cached keyed by the baseline contents and
//! symbol scope; the cache invalidates precisely when the fill revision
//! token changes, with a short unconditional TTL beneath that to absorb
//! call bursts.

mod fifo;

pub use fifo::FifoBook;

use std::collections::{BTreeMap, HashMap};
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::debug;

use crate::ledger::{FillLine, FillRevision, LedgerStore};
use crate::models::BaselineSnapshot;

/// Source of recorded fills for P&L computation.
///
/// A trait rather than the store directly so tests can observe query
/// counts and substitute fixtures.
pub trait FillSource: Send + Sync {
    /// Fills executed at or after `since`, joined with symbol and side.
    fn fills_since(&self, since: DateTime<Utc>) -> Vec<FillLine>;

    /// Current fill revision token.
    fn revision(&self) -> FillRevision;
}

impl FillSource for LedgerStore {
    fn fills_since(&self, since: DateTime<Utc>) -> Vec<FillLine> {
        self.fill_lines_since(since)
    }

    fn revision(&self) -> FillRevision {
        self.fill_revision()
    }
}

/// Read-only snapshot of realized totals.
#[derive(Debug, Clone, Default)]
pub struct PnlSnapshot {
    /// Realized total per symbol.
    pub by_symbol: BTreeMap<String, Decimal>,
    /// Realized total per originating order.
    pub by_order: BTreeMap<String, Decimal>,
    /// Realized amount per fill.
    pub by_fill: BTreeMap<u64, Decimal>,
    /// Baseline timestamp the computation started from.
    pub baseline_at: DateTime<Utc>,
    /// When the snapshot was computed.
    pub computed_at: DateTime<Utc>,
}

impl PnlSnapshot {
    /// Realized total for a symbol, zero when untouched.
    #[must_use]
    pub fn symbol(&self, symbol: &str) -> Decimal {
        self.by_symbol.get(symbol).copied().unwrap_or_default()
    }

    /// Realized total for an order, zero when untouched.
    #[must_use]
    pub fn order(&self, order_id: &str) -> Decimal {
        self.by_order.get(order_id).copied().unwrap_or_default()
    }

    /// Realized amount for a fill, zero when untouched.
    #[must_use]
    pub fn fill(&self, fill_id: u64) -> Decimal {
        self.by_fill.get(&fill_id).copied().unwrap_or_default()
    }
}

struct CacheEntry {
    key: u64,
    revision: FillRevision,
    cached_at: Instant,
    snapshot: Arc<PnlSnapshot>,
}

/// Computes and caches realized P&L.
pub struct RealizedPnlEngine {
    fills: Arc<dyn FillSource>,
    ttl: Duration,
    cache: Mutex<Option<CacheEntry>>,
}

impl RealizedPnlEngine {
    /// Create an engine with the given burst-absorption TTL.
    #[must_use]
    pub fn new(fills: Arc<dyn FillSource>, ttl: Duration) -> Self {
        Self {
            fills,
            ttl,
            cache: Mutex::new(None),
        }
    }

    /// Realized P&L since `baseline`, optionally restricted to a symbol
    /// scope.
    ///
    /// Serves the cached snapshot while the fill revision token is
    /// unchanged; within the TTL the token is not even consulted.
    pub fn realized(
        &self,
        baseline: &BaselineSnapshot,
        scope: Option<&[&str]>,
    ) -> Arc<PnlSnapshot> {
        let key = Self::cache_key(baseline, scope);

        {
            let cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(entry) = cache.as_ref()
                && entry.key == key
            {
                if entry.cached_at.elapsed() < self.ttl {
                    return Arc::clone(&entry.snapshot);
                }
                if self.fills.revision() == entry.revision {
                    return Arc::clone(&entry.snapshot);
                }
            }
        }

        let revision = self.fills.revision();
        let snapshot = Arc::new(self.compute(baseline, scope));
        debug!(
            symbols = snapshot.by_symbol.len(),
            fills = snapshot.by_fill.len(),
            "Realized P&L recomputed"
        );

        *self.cache.lock().unwrap_or_else(PoisonError::into_inner) = Some(CacheEntry {
            key,
            revision,
            cached_at: Instant::now(),
            snapshot: Arc::clone(&snapshot),
        });
        snapshot
    }

    /// Drop any cached snapshot.
    pub fn invalidate(&self) {
        *self.cache.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    fn cache_key(baseline: &BaselineSnapshot, scope: Option<&[&str]>) -> u64 {
        let mut hasher = std::hash::DefaultHasher::new();
        baseline.content_hash().hash(&mut hasher);
        if let Some(symbols) = scope {
            let mut symbols: Vec<&str> = symbols.to_vec();
            symbols.sort_unstable();
            symbols.hash(&mut hasher);
        }
        hasher.finish()
    }

    fn compute(&self, baseline: &BaselineSnapshot, scope: Option<&[&str]>) -> PnlSnapshot {
        let mut lines = self.fills.fills_since(baseline.created_at);
        lines.sort_by(|a, b| (a.fill.executed_at, a.fill.id).cmp(&(b.fill.executed_at, b.fill.id)));

        let mut books: HashMap<String, FifoBook> = HashMap::new();
        let mut snapshot = PnlSnapshot {
            baseline_at: baseline.created_at,
            computed_at: Utc::now(),
            ..PnlSnapshot::default()
        };

        for line in lines {
            if let Some(symbols) = scope
                && !symbols.contains(&line.symbol.as_str())
            {
                continue;
            }

            let book = books.entry(line.symbol.clone()).or_insert_with(|| {
                baseline
                    .position(&line.symbol)
                    .map_or_else(FifoBook::new, |p| FifoBook::seed(p.quantity, p.avg_cost))
            });

            let signed = line.fill.quantity * Decimal::from(line.side.sign());
            let realized = book.apply(signed, line.fill.price, line.fill.commission);

            *snapshot.by_symbol.entry(line.symbol.clone()).or_default() += realized;
            *snapshot
                .by_order
                .entry(line.fill.order_id.clone())
                .or_default() += realized;
            snapshot.by_fill.insert(line.fill.id, realized);
        }

        snapshot
    }
}
