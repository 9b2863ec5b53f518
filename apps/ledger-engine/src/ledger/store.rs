//! Thread-safe order/fill ledger.
//!
//! Leaf data layer. Orders are indexed by id, correlation tag, and broker
//! order id; fills are append-only with store-assigned monotonically
//! increasing ids. All lifecycle mutation goes through
//! [`crate::lifecycle::LifecycleManager`]; the store itself only enforces
//! identity invariants (unique tags, duplicate-fill detection).

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};

use chrono::{DateTime, Utc};

use crate::error::LedgerError;
use crate::models::{Fill, FillReport, Order, OrderSide, OrderStatus};

/// Monotonically-increasing token describing the recorded fill set.
///
/// Changes exactly when a fill is added, which makes it a precise
/// invalidation key for the P&L cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FillRevision {
    /// Number of recorded fills.
    pub count: u64,
    /// Highest assigned fill id.
    pub max_id: u64,
    /// Most recent recording timestamp.
    pub max_recorded_at: Option<DateTime<Utc>>,
}

/// A fill joined with the symbol and side of its owning order.
#[derive(Debug, Clone)]
pub struct FillLine {
    /// The recorded fill.
    pub fill: Fill,
    /// Symbol of the owning order.
    pub symbol: String,
    /// Side of the owning order.
    pub side: OrderSide,
}

/// In-memory order/fill ledger shared across all passes.
#[derive(Debug, Default)]
pub struct LedgerStore {
    /// Orders indexed by internal id.
    orders: RwLock<HashMap<String, Order>>,
    /// Correlation tag -> internal order id.
    tag_index: RwLock<HashMap<String, String>>,
    /// Broker order id -> internal order id.
    broker_index: RwLock<HashMap<i64, String>>,
    /// Recorded fills, append-only.
    fills: RwLock<Vec<Fill>>,
    /// Next fill id to assign.
    next_fill_id: AtomicU64,
}

impl LedgerStore {
    /// Create an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Orders
    // ========================================================================

    /// Insert a new order.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::DuplicateTag`] if an order with the same
    /// correlation tag already exists.
    pub fn insert(&self, order: Order) -> Result<(), LedgerError> {
        let mut tags = self
            .tag_index
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if tags.contains_key(&order.tag) {
            return Err(LedgerError::DuplicateTag(order.tag));
        }
        tags.insert(order.tag.clone(), order.id.clone());
        drop(tags);

        if let Some(broker_id) = order.broker_order_id {
            self.broker_index
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(broker_id, order.id.clone());
        }

        self.orders
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(order.id.clone(), order);
        Ok(())
    }

    /// Get an order by internal id.
    #[must_use]
    pub fn get(&self, order_id: &str) -> Option<Order> {
        self.orders
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(order_id)
            .cloned()
    }

    /// Get an order by correlation tag.
    #[must_use]
    pub fn get_by_tag(&self, tag: &str) -> Option<Order> {
        let order_id = self
            .tag_index
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(tag)
            .cloned()?;
        self.get(&order_id)
    }

    /// Get an order by broker order id.
    #[must_use]
    pub fn get_by_broker_id(&self, broker_order_id: i64) -> Option<Order> {
        let order_id = self
            .broker_index
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&broker_order_id)
            .cloned()?;
        self.get(&order_id)
    }

    /// All orders in a non-terminal status.
    #[must_use]
    pub fn open_orders(&self) -> Vec<Order> {
        self.orders
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|o| o.status.is_open())
            .cloned()
            .collect()
    }

    /// All orders currently in `status`.
    #[must_use]
    pub fn orders_in_status(&self, status: OrderStatus) -> Vec<Order> {
        self.orders
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|o| o.status == status)
            .cloned()
            .collect()
    }

    /// Total number of orders.
    #[must_use]
    pub fn count(&self) -> usize {
        self.orders
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Mutate one order under the write lock.
    ///
    /// The closure sees the live order; whatever it returns is passed
    /// through. Secondary indexes are refreshed afterwards.
    pub(crate) fn mutate<T>(
        &self,
        order_id: &str,
        f: impl FnOnce(&mut Order) -> Result<T, LedgerError>,
    ) -> Result<T, LedgerError> {
        let (result, broker_id) = {
            let mut orders = self.orders.write().unwrap_or_else(PoisonError::into_inner);
            let order = orders
                .get_mut(order_id)
                .ok_or_else(|| LedgerError::UnknownOrder(order_id.to_string()))?;
            let result = f(order)?;
            (result, order.broker_order_id)
        };

        if let Some(id) = broker_id {
            self.broker_index
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(id, order_id.to_string());
        }
        Ok(result)
    }

    // ========================================================================
    // Fills
    // ========================================================================

    /// Record a fill against an order unless it duplicates one already
    /// recorded. Returns the stored fill, or `None` for a duplicate.
    pub(crate) fn record_fill(&self, order_id: &str, report: &FillReport) -> Option<Fill> {
        let mut fills = self.fills.write().unwrap_or_else(PoisonError::into_inner);
        if fills
            .iter()
            .any(|f| f.order_id == order_id && f.is_duplicate_of(report))
        {
            return None;
        }

        let fill = Fill {
            id: self.next_fill_id.fetch_add(1, Ordering::SeqCst) + 1,
            order_id: order_id.to_string(),
            quantity: report.quantity,
            price: report.price,
            commission: report.commission,
            exec_id: report.exec_id.clone(),
            executed_at: report.executed_at,
            recorded_at: Utc::now(),
            source: report.source.clone(),
        };
        fills.push(fill.clone());
        Some(fill)
    }

    /// All fills recorded for an order, in recording order.
    #[must_use]
    pub fn fills_for_order(&self, order_id: &str) -> Vec<Fill> {
        self.fills
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|f| f.order_id == order_id)
            .cloned()
            .collect()
    }

    /// Fills executed at or after `since`, joined with their orders'
    /// symbol and side, sorted by (executed_at, id).
    #[must_use]
    pub fn fill_lines_since(&self, since: DateTime<Utc>) -> Vec<FillLine> {
        let fills: Vec<Fill> = self
            .fills
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|f| f.executed_at >= since)
            .cloned()
            .collect();

        let orders = self.orders.read().unwrap_or_else(PoisonError::into_inner);
        let mut lines: Vec<FillLine> = fills
            .into_iter()
            .filter_map(|fill| {
                orders.get(&fill.order_id).map(|order| FillLine {
                    symbol: order.symbol.clone(),
                    side: order.side,
                    fill,
                })
            })
            .collect();
        drop(orders);

        lines.sort_by(|a, b| {
            (a.fill.executed_at, a.fill.id).cmp(&(b.fill.executed_at, b.fill.id))
        });
        lines
    }

    /// Current fill revision token.
    #[must_use]
    pub fn fill_revision(&self) -> FillRevision {
        let fills = self.fills.read().unwrap_or_else(PoisonError::into_inner);
        FillRevision {
            count: fills.len() as u64,
            max_id: fills.iter().map(|f| f.id).max().unwrap_or(0),
            max_recorded_at: fills.iter().map(|f| f.recorded_at).max(),
        }
    }
}
