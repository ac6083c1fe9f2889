// ===============================
// src/market.rs (per-tick book snapshot)
// ===============================
use ahash::AHashMap as HashMap;

use crate::domain::{Instrument, OrderBook, PriceLevel};
use crate::estimator::RollingPriceEstimator;

/// Normalized view of one instrument's book for the current tick.
///
/// Sort contract:
/// - `sell_levels`: price ascending, then volume ascending (cheapest ask first)
/// - `buy_levels`: price descending, then volume ascending (highest bid first)
#[derive(Debug, Clone)]
pub struct MarketSnapshot {
    pub sell_levels: Vec<PriceLevel>,
    pub buy_levels: Vec<PriceLevel>,
    pub buy_available: i64,
    pub sell_available: i64,
    buy_estimate: RollingPriceEstimator,
    sell_estimate: RollingPriceEstimator,
}

impl MarketSnapshot {
    pub fn from_book(book: &OrderBook) -> Self {
        let mut sell_levels = levels(&book.sell_orders);
        sell_levels.sort_by(|a, b| a.price.cmp(&b.price).then(a.volume.cmp(&b.volume)));

        let mut buy_levels = levels(&book.buy_orders);
        buy_levels.sort_by(|a, b| b.price.cmp(&a.price).then(a.volume.cmp(&b.volume)));

        Self {
            buy_available: depth(&buy_levels),
            sell_available: depth(&sell_levels),
            buy_estimate: RollingPriceEstimator::from_levels(&buy_levels),
            sell_estimate: RollingPriceEstimator::from_levels(&sell_levels),
            sell_levels,
            buy_levels,
        }
    }

    /// Depth-weighted bid price; an empty buy side reads 0.
    pub fn buy_side_price_estimate(&self) -> f64 { self.buy_estimate.average().unwrap_or(0.0) }

    /// Depth-weighted ask price; an empty sell side reads 0.
    pub fn sell_side_price_estimate(&self) -> f64 { self.sell_estimate.average().unwrap_or(0.0) }
}

fn levels(side: &std::collections::BTreeMap<i64, i64>) -> Vec<PriceLevel> {
    side.iter()
        // i64::MIN dari replay tidak boleh panic
        .map(|(&price, &volume)| PriceLevel { price, volume: i64::try_from(volume.unsigned_abs()).unwrap_or(i64::MAX) })
        .filter(|l| l.volume > 0)
        .collect()
}

fn depth(levels: &[PriceLevel]) -> i64 {
    levels.iter().fold(0i64, |acc, l| acc.saturating_add(l.volume))
}

/// All snapshots of the tick, keyed by instrument.
pub type MarketView = HashMap<Instrument, MarketSnapshot>;

pub fn build_view<'a>(books: impl IntoIterator<Item = (&'a Instrument, &'a OrderBook)>) -> MarketView {
    books
        .into_iter()
        .map(|(instr, book)| (instr.clone(), MarketSnapshot::from_book(book)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn book(buys: &[(i64, i64)], sells: &[(i64, i64)]) -> OrderBook {
        OrderBook {
            buy_orders: buys.iter().copied().collect(),
            sell_orders: sells.iter().copied().collect(),
        }
    }

    #[test]
    fn sides_are_sorted_best_first() {
        let snap = MarketSnapshot::from_book(&book(&[(99, 3), (101, 2), (100, 7)], &[(105, 1), (103, 4), (104, 2)]));
        let bids: Vec<i64> = snap.buy_levels.iter().map(|l| l.price).collect();
        let asks: Vec<i64> = snap.sell_levels.iter().map(|l| l.price).collect();
        assert_eq!(bids, vec![101, 100, 99]);
        assert_eq!(asks, vec![103, 104, 105]);
        assert_eq!(snap.buy_available, 12);
        assert_eq!(snap.sell_available, 7);
    }

    #[test]
    fn negative_sell_volumes_are_normalized() {
        let snap = MarketSnapshot::from_book(&book(&[], &[(101, -5), (102, -10)]));
        assert_eq!(snap.sell_available, 15);
        let est = snap.sell_side_price_estimate();
        assert!((est - 1525.0 / 15.0).abs() < 1e-9);
    }

    #[test]
    fn empty_side_reads_zero() {
        let snap = MarketSnapshot::from_book(&book(&[(99, 8)], &[]));
        assert_eq!(snap.sell_side_price_estimate(), 0.0);
        assert_eq!(snap.buy_side_price_estimate(), 99.0);
        assert_eq!(snap.sell_available, 0);
    }

    #[test]
    fn zero_volume_levels_are_dropped() {
        let snap = MarketSnapshot::from_book(&book(&[(99, 0), (98, 4)], &[]));
        assert_eq!(snap.buy_levels, vec![PriceLevel { price: 98, volume: 4 }]);
    }

    #[test]
    fn extreme_volumes_saturate_instead_of_overflowing() {
        let snap = MarketSnapshot::from_book(&book(&[(99, i64::MAX), (98, i64::MAX)], &[(101, i64::MIN), (102, -3)]));
        assert_eq!(snap.sell_levels[0], PriceLevel { price: 101, volume: i64::MAX });
        assert_eq!(snap.sell_available, i64::MAX);
        assert_eq!(snap.buy_available, i64::MAX);
        assert!(snap.buy_side_price_estimate().is_finite());
    }
}
