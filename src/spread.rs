// ===============================
// src/spread.rs (basket definitions & evaluation)
// ===============================
//
// Spread = keranjang multi-leg: beli `to_buy` dan jual `to_sell` dengan rasio
// integer per unit spread. Definisi bersifat immutable; hasil evaluasi per tick
// (arah + profit per unit) disimpan terpisah di `EvaluatedSpread`.
//
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;
use crate::domain::Instrument;
use crate::market::{MarketSnapshot, MarketView};

pub type Legs = BTreeMap<Instrument, i64>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpreadDefinition {
    pub name: String,
    pub to_buy: Legs,
    pub to_sell: Legs,
}

impl SpreadDefinition {
    pub fn new(name: impl Into<String>, to_buy: &[(&str, i64)], to_sell: &[(&str, i64)]) -> Self {
        let legs = |l: &[(&str, i64)]| l.iter().map(|(i, r)| (i.to_string(), *r)).collect();
        Self { name: name.into(), to_buy: legs(to_buy), to_sell: legs(to_sell) }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.to_buy.is_empty() || self.to_sell.is_empty() {
            return Err(ConfigError::EmptyLegs(self.name.clone()));
        }
        for (instr, &ratio) in self.to_buy.iter().chain(self.to_sell.iter()) {
            if ratio <= 0 {
                return Err(ConfigError::BadRatio { spread: self.name.clone(), instrument: instr.clone(), ratio });
            }
        }
        if let Some(instr) = self.to_buy.keys().find(|i| self.to_sell.contains_key(*i)) {
            return Err(ConfigError::OverlappingLegs { spread: self.name.clone(), instrument: instr.clone() });
        }
        Ok(())
    }

    pub fn instruments(&self) -> impl Iterator<Item = &Instrument> {
        self.to_buy.keys().chain(self.to_sell.keys())
    }
}

/// Validates every definition and rejects duplicate names.
pub fn validate_all(spreads: &[SpreadDefinition]) -> Result<(), ConfigError> {
    let mut seen = BTreeSet::new();
    for s in spreads {
        s.validate()?;
        if !seen.insert(s.name.as_str()) {
            return Err(ConfigError::DuplicateSpread(s.name.clone()));
        }
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Orientation {
    #[default]
    Normal,
    Reversed,
}

impl Orientation {
    pub fn flip(self) -> Self {
        match self { Orientation::Normal => Orientation::Reversed, Orientation::Reversed => Orientation::Normal }
    }

    /// (legs bought, legs sold) of `def` when run in this orientation.
    pub fn legs<'a>(&self, def: &'a SpreadDefinition) -> (&'a Legs, &'a Legs) {
        match self {
            Orientation::Normal => (&def.to_buy, &def.to_sell),
            Orientation::Reversed => (&def.to_sell, &def.to_buy),
        }
    }
}

/// Tick-scoped evaluation result. `profit == None` means unevaluable (every leg
/// on one side is missing from the snapshot), never a real figure.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluatedSpread {
    pub index: usize,
    pub orientation: Orientation,
    pub profit: Option<f64>,
}

/// Ratio-weighted average of the legs' side estimate. Legs whose instrument is
/// absent from the snapshot are skipped; an empty side contributes its 0 estimate.
pub fn notional(legs: &Legs, market: &MarketView, side: fn(&MarketSnapshot) -> f64) -> Option<f64> {
    let (sum, weight) = legs
        .iter()
        .filter_map(|(instr, &ratio)| market.get(instr).map(|snap| (side(snap), ratio)))
        .fold((0.0, 0i64), |(s, w), (px, r)| (s + px * r as f64, w + r));
    if weight == 0 { None } else { Some(sum / weight as f64) }
}

/// Revenue selling the sold legs into bids minus cost buying the bought legs from asks.
pub fn profit(def: &SpreadDefinition, orientation: Orientation, market: &MarketView) -> Option<f64> {
    let (buy, sell) = orientation.legs(def);
    let revenue = notional(sell, market, MarketSnapshot::buy_side_price_estimate)?;
    let cost = notional(buy, market, MarketSnapshot::sell_side_price_estimate)?;
    Some(revenue - cost)
}

/// Evaluate starting from the `previous` orientation; flips only when the
/// opposite orientation is strictly more profitable (or the only evaluable one).
pub fn evaluate(index: usize, def: &SpreadDefinition, previous: Orientation, market: &MarketView) -> EvaluatedSpread {
    let current = profit(def, previous, market);
    let opposite = profit(def, previous.flip(), market);
    let flip = match (current, opposite) {
        (Some(c), Some(o)) => o > c,
        (None, Some(_)) => true,
        _ => false,
    };
    if flip {
        EvaluatedSpread { index, orientation: previous.flip(), profit: opposite }
    } else {
        EvaluatedSpread { index, orientation: previous, profit: current }
    }
}

/// Most profitable first; unevaluable spreads sink to the end. Stable on ties.
pub fn rank(evaluated: &mut [EvaluatedSpread]) {
    evaluated.sort_by(|a, b| match (a.profit, b.profit) {
        (Some(x), Some(y)) => y.total_cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::OrderBook;
    use crate::market::build_view;

    fn view(books: &[(&str, &[(i64, i64)], &[(i64, i64)])]) -> MarketView {
        let owned: BTreeMap<String, OrderBook> = books
            .iter()
            .map(|(i, b, s)| {
                (i.to_string(), OrderBook { buy_orders: b.iter().copied().collect(), sell_orders: s.iter().copied().collect() })
            })
            .collect();
        build_view(owned.iter())
    }

    #[test]
    fn rejects_bad_definitions() {
        let overlap = SpreadDefinition::new("x", &[("A", 1)], &[("A", 2)]);
        assert!(matches!(overlap.validate(), Err(ConfigError::OverlappingLegs { .. })));
        let ratio = SpreadDefinition::new("x", &[("A", 0)], &[("B", 1)]);
        assert!(matches!(ratio.validate(), Err(ConfigError::BadRatio { .. })));
        let empty = SpreadDefinition::new("x", &[], &[("B", 1)]);
        assert!(matches!(empty.validate(), Err(ConfigError::EmptyLegs(_))));
        let ok = SpreadDefinition::new("x", &[("A", 1)], &[("B", 1)]);
        assert!(matches!(validate_all(&[ok.clone(), ok]), Err(ConfigError::DuplicateSpread(_))));
    }

    #[test]
    fn notional_weights_by_ratio_and_skips_missing() {
        let m = view(&[("A", &[(100, 1)], &[]), ("B", &[(110, 1)], &[])]);
        let legs: Legs = [("A".to_string(), 1), ("B".to_string(), 3), ("Z".to_string(), 5)].into_iter().collect();
        let n = notional(&legs, &m, MarketSnapshot::buy_side_price_estimate).unwrap();
        assert!((n - (100.0 + 330.0) / 4.0).abs() < 1e-9);

        let only_missing: Legs = [("Z".to_string(), 5)].into_iter().collect();
        assert_eq!(notional(&only_missing, &m, MarketSnapshot::buy_side_price_estimate), None);
    }

    #[test]
    fn one_sided_books_flip_to_the_zero_priced_direction() {
        // A only asks, B only bids: normal = 99 - 101.67 < 0, reversed = 0 - 0
        let m = view(&[("A", &[], &[(101, 5), (102, 10)]), ("B", &[(99, 8)], &[])]);
        let def = SpreadDefinition::new("ab", &[("A", 1)], &[("B", 1)]);
        let normal = profit(&def, Orientation::Normal, &m).unwrap();
        let expected = 99.0 - (5.0 * 101.0 + 10.0 * 102.0) / 15.0;
        assert!((normal - expected).abs() < 1e-9);

        let ev = evaluate(0, &def, Orientation::Normal, &m);
        assert_eq!(ev.orientation, Orientation::Reversed);
        assert_eq!(ev.profit, Some(0.0));
    }

    #[test]
    fn flips_when_reversed_is_more_profitable() {
        let m = view(&[("A", &[(104, 6)], &[(101, 5), (102, 10)]), ("B", &[(99, 8)], &[(100, 4)])]);
        let def = SpreadDefinition::new("ab", &[("A", 1)], &[("B", 1)]);
        let ev = evaluate(0, &def, Orientation::Normal, &m);
        assert_eq!(ev.orientation, Orientation::Reversed);
        assert!((ev.profit.unwrap() - 4.0).abs() < 1e-9);
        let (buy, sell) = ev.orientation.legs(&def);
        assert!(buy.contains_key("B") && sell.contains_key("A"));
    }

    #[test]
    fn evaluation_is_idempotent() {
        let m = view(&[("A", &[(104, 6)], &[(101, 5)]), ("B", &[(99, 8)], &[(100, 4)])]);
        let def = SpreadDefinition::new("ab", &[("A", 1)], &[("B", 1)]);
        let first = evaluate(0, &def, Orientation::Normal, &m);
        let second = evaluate(0, &def, first.orientation, &m);
        assert_eq!(first, second);
    }

    #[test]
    fn tie_keeps_previous_orientation() {
        let m = view(&[("A", &[(100, 1)], &[(100, 1)]), ("B", &[(100, 1)], &[(100, 1)])]);
        let def = SpreadDefinition::new("ab", &[("A", 1)], &[("B", 1)]);
        assert_eq!(evaluate(0, &def, Orientation::Reversed, &m).orientation, Orientation::Reversed);
        assert_eq!(evaluate(0, &def, Orientation::Normal, &m).orientation, Orientation::Normal);
    }

    #[test]
    fn ranking_puts_unevaluable_last() {
        let mut evs = vec![
            EvaluatedSpread { index: 0, orientation: Orientation::Normal, profit: None },
            EvaluatedSpread { index: 1, orientation: Orientation::Normal, profit: Some(-1.0) },
            EvaluatedSpread { index: 2, orientation: Orientation::Normal, profit: Some(3.5) },
        ];
        rank(&mut evs);
        let order: Vec<usize> = evs.iter().map(|e| e.index).collect();
        assert_eq!(order, vec![2, 1, 0]);
    }
}
