// ===============================
// src/risk.rs (volume sizing & limit guard)
// ===============================
use thiserror::Error;
use tracing::debug;

use crate::domain::Instrument;
use crate::market::MarketView;
use crate::spread::Legs;
use crate::state::Inventory;

/// Batas atas awal sebelum dibatasi headroom / depth
const UNBOUNDED_UNITS: i64 = i64::MAX;

#[derive(Debug, Error, PartialEq)]
pub enum RiskError {
    #[error("limit violation on {instrument}: position {position} + {delta} exceeds limit {limit}")]
    LimitViolation { instrument: Instrument, position: i64, delta: i64, limit: i64 },
    #[error("no position tracker for {0}")]
    UnknownInstrument(Instrument),
}

/// Maximum number of spread units executable this tick.
///
/// Every leg must fit both its position headroom and the book depth it trades
/// against (bought legs lift asks, sold legs hit bids). Any leg whose instrument
/// is missing from the snapshot makes the whole spread size to 0.
///
/// Note the pairing: a bought leg is bounded by `sell_available` and a sold leg
/// by `buy_available`, i.e. by the side `realize` walks, not the side named
/// after the leg. An empty side therefore sizes its spread to 0.
pub fn max_units(buy_legs: &Legs, sell_legs: &Legs, market: &MarketView, inventory: &Inventory) -> i64 {
    let mut limit = UNBOUNDED_UNITS;

    for (instr, &ratio) in buy_legs {
        let (Some(snap), Some(st)) = (market.get(instr), inventory.get(instr)) else {
            debug!(instrument = %instr, "buy leg not in snapshot, spread unevaluable");
            return 0;
        };
        limit = limit
            .min(st.position.max_buy_headroom().div_euclid(ratio))
            .min(snap.sell_available.div_euclid(ratio));
    }
    for (instr, &ratio) in sell_legs {
        let (Some(snap), Some(st)) = (market.get(instr), inventory.get(instr)) else {
            debug!(instrument = %instr, "sell leg not in snapshot, spread unevaluable");
            return 0;
        };
        limit = limit
            .min(st.position.max_sell_headroom().div_euclid(ratio))
            .min(snap.buy_available.div_euclid(ratio));
    }

    limit.max(0)
}
