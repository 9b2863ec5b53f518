//! Baseline positions snapshot for realized-P&L accounting.

use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::wire::PositionsSnapshot;

/// One position in the baseline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaselinePosition {
    /// Symbol.
    pub symbol: String,
    /// Signed quantity (positive = long, negative = short).
    pub quantity: Decimal,
    /// Average cost per share.
    pub avg_cost: Decimal,
}

/// A point-in-time positions vector; the starting point from which
/// realized P&L is computed.
///
/// Immutable once created; superseded, not mutated, when refreshed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaselineSnapshot {
    positions: BTreeMap<String, BaselinePosition>,
    /// When the baseline was captured.
    pub created_at: DateTime<Utc>,
}

impl BaselineSnapshot {
    /// Build a baseline from a list of positions.
    #[must_use]
    pub fn new(positions: Vec<BaselinePosition>, created_at: DateTime<Utc>) -> Self {
        Self {
            positions: positions
                .into_iter()
                .map(|p| (p.symbol.clone(), p))
                .collect(),
            created_at,
        }
    }

    /// Build a baseline from a broker positions snapshot.
    #[must_use]
    pub fn from_positions(snapshot: &PositionsSnapshot) -> Self {
        Self::new(
            snapshot
                .items
                .iter()
                .map(|p| BaselinePosition {
                    symbol: p.symbol.clone(),
                    quantity: p.quantity,
                    avg_cost: p.avg_cost,
                })
                .collect(),
            snapshot.refreshed_at,
        )
    }

    /// An empty baseline (no open positions).
    #[must_use]
    pub fn empty(created_at: DateTime<Utc>) -> Self {
        Self::new(Vec::new(), created_at)
    }

    /// Position for `symbol`, if the baseline holds one.
    #[must_use]
    pub fn position(&self, symbol: &str) -> Option<&BaselinePosition> {
        self.positions.get(symbol)
    }

    /// Signed quantity for `symbol`, zero when absent.
    #[must_use]
    pub fn quantity(&self, symbol: &str) -> Decimal {
        self.positions
            .get(symbol)
            .map_or(Decimal::ZERO, |p| p.quantity)
    }

    /// Iterate positions in symbol order.
    pub fn positions(&self) -> impl Iterator<Item = &BaselinePosition> {
        self.positions.values()
    }

    /// Stable hash over the baseline contents, used as a cache key
    /// component by the P&L engine.
    #[must_use]
    pub fn content_hash(&self) -> u64 {
        let mut hasher = std::hash::DefaultHasher::new();
        for (symbol, position) in &self.positions {
            symbol.hash(&mut hasher);
            position.quantity.hash(&mut hasher);
            position.avg_cost.hash(&mut hasher);
        }
        self.created_at.timestamp_micros().hash(&mut hasher);
        hasher.finish()
    }
}
