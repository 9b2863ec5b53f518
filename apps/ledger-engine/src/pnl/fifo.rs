//! FIFO lot matching.
//!
//! One book per symbol. Lots carry signed quantity (positive = long,
//! negative = short) and a per-share cost basis with commission loaded
//! in. An incoming fill first closes opposite-signed lots oldest first,
//! realizing P&L net of its amortized commission, then opens a new lot
//! with any remainder.

use std::collections::VecDeque;

use rust_decimal::Decimal;

/// One open lot.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Lot {
    /// Signed quantity; never zero.
    quantity: Decimal,
    /// Per-share cost basis, commission included.
    cost: Decimal,
}

/// FIFO queue of open lots for one symbol.
#[derive(Debug, Clone, Default)]
pub struct FifoBook {
    lots: VecDeque<Lot>,
}

impl FifoBook {
    /// An empty book.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A book seeded with one baseline lot. A zero quantity seeds an
    /// empty book.
    #[must_use]
    pub fn seed(quantity: Decimal, cost: Decimal) -> Self {
        let mut book = Self::new();
        if quantity != Decimal::ZERO {
            book.lots.push_back(Lot { quantity, cost });
        }
        book
    }

    /// Apply a signed fill (positive = buy, negative = sell) and return
    /// the realized P&L, net of the fill's amortized commission.
    pub fn apply(&mut self, quantity: Decimal, price: Decimal, commission: Decimal) -> Decimal {
        if quantity == Decimal::ZERO {
            return Decimal::ZERO;
        }

        let buying = quantity > Decimal::ZERO;
        let per_share = commission / quantity.abs();
        let mut remaining = quantity.abs();
        let mut realized = Decimal::ZERO;

        while remaining > Decimal::ZERO {
            let Some(front) = self.lots.front_mut() else {
                break;
            };
            // Same-direction lots are never matched; the remainder opens
            // behind them.
            if (front.quantity > Decimal::ZERO) == buying {
                break;
            }

            let matched = remaining.min(front.quantity.abs());
            realized += if buying {
                // Closing shorts: profit when bought back below basis.
                (front.cost - price) * matched
            } else {
                // Closing longs: profit when sold above basis.
                (price - front.cost) * matched
            } - per_share * matched;

            if buying {
                front.quantity += matched;
            } else {
                front.quantity -= matched;
            }
            if front.quantity == Decimal::ZERO {
                self.lots.pop_front();
            }
            remaining -= matched;
        }

        if remaining > Decimal::ZERO {
            // Commission loads into the basis of the opened lot: long
            // basis rises, short basis (proceeds) falls.
            let cost = if buying {
                price + per_share
            } else {
                price - per_share
            };
            let signed = if buying { remaining } else { -remaining };
            self.lots.push_back(Lot {
                quantity: signed,
                cost,
            });
        }

        realized
    }

    /// Net signed quantity across all open lots.
    #[must_use]
    pub fn net_quantity(&self) -> Decimal {
        self.lots.iter().map(|lot| lot.quantity).sum()
    }

    /// Number of open lots.
    #[must_use]
    pub fn open_lots(&self) -> usize {
        self.lots.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    #[test]
    fn sell_against_baseline_long() {
        // Baseline +10 @ 100; SELL 6 @ 110 with commission 1.2:
        // (110 - 100) * 6 - 1.2 = 58.8
        let mut book = FifoBook::seed(dec!(10), dec!(100));
        let realized = book.apply(dec!(-6), dec!(110), dec!(1.2));
        assert_eq!(realized, dec!(58.8));
        assert_eq!(book.net_quantity(), dec!(4));
    }

    #[test]
    fn buy_against_baseline_short_is_the_mirror() {
        // Baseline -10 @ 100; BUY 6 @ 90 with commission 1.2:
        // (100 - 90) * 6 - 1.2 = 58.8
        let mut book = FifoBook::seed(dec!(-10), dec!(100));
        let realized = book.apply(dec!(6), dec!(90), dec!(1.2));
        assert_eq!(realized, dec!(58.8));
        assert_eq!(book.net_quantity(), dec!(-4));
    }

    #[test]
    fn oldest_lot_closes_first() {
        let mut book = FifoBook::new();
        book.apply(dec!(10), dec!(100), Decimal::ZERO);
        book.apply(dec!(10), dec!(120), Decimal::ZERO);

        // Selling 10 closes the 100-cost lot, not the 120-cost one.
        let realized = book.apply(dec!(-10), dec!(110), Decimal::ZERO);
        assert_eq!(realized, dec!(100));
        assert_eq!(book.net_quantity(), dec!(10));
        assert_eq!(book.open_lots(), 1);
    }

    #[test]
    fn crossing_through_flat_opens_opposite_lot() {
        let mut book = FifoBook::seed(dec!(4), dec!(100));
        // Sell 10: close 4 long, open 6 short.
        let realized = book.apply(dec!(-10), dec!(105), Decimal::ZERO);
        assert_eq!(realized, dec!(20));
        assert_eq!(book.net_quantity(), dec!(-6));
    }

    #[test]
    fn commission_loads_into_opened_basis() {
        let mut book = FifoBook::new();
        // Buy 10 @ 100 with commission 1 -> basis 100.1.
        assert_eq!(book.apply(dec!(10), dec!(100), dec!(1)), Decimal::ZERO);
        // Sell 10 @ 101, no commission: (101 - 100.1) * 10 = 9.
        assert_eq!(book.apply(dec!(-10), dec!(101), Decimal::ZERO), dec!(9.0));
        assert_eq!(book.net_quantity(), Decimal::ZERO);
        assert_eq!(book.open_lots(), 0);
    }

    #[test]
    fn zero_quantity_is_a_no_op() {
        let mut book = FifoBook::seed(dec!(10), dec!(100));
        assert_eq!(
            book.apply(Decimal::ZERO, dec!(110), Decimal::ZERO),
            Decimal::ZERO
        );
        assert_eq!(book.net_quantity(), dec!(10));
    }

    proptest! {
        /// Net quantity is conserved: baseline plus the signed sum of all
        /// applied fills, regardless of matching.
        #[test]
        fn net_quantity_is_conserved(
            baseline in -50i64..50,
            fills in proptest::collection::vec((-20i64..20, 1u32..500), 0..12)
        ) {
            let mut book = FifoBook::seed(Decimal::from(baseline), dec!(100));
            let mut expected = Decimal::from(baseline);
            for (qty, price_cents) in fills {
                let qty = Decimal::from(qty);
                let price = Decimal::new(i64::from(price_cents), 2);
                book.apply(qty, price, Decimal::ZERO);
                expected += qty;
            }
            prop_assert_eq!(book.net_quantity(), expected);
        }
    }
}
