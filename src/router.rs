// ===============================
// src/router.rs (order realizer: walk the book per leg)
// ===============================
use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::domain::{Instrument, Order, PriceLevel};
use crate::market::MarketView;
use crate::risk::RiskError;
use crate::spread::Legs;
use crate::state::Inventory;

/// Orders of one tick, grouped per instrument in emission order.
pub type OrderBatch = BTreeMap<Instrument, Vec<Order>>;

/// Fill outcome of one leg.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LegFill { pub target: i64, pub filled: i64 }

impl LegFill {
    pub fn shortfall(&self) -> i64 { self.target - self.filled }
}

/// Realize `units` of a spread: bought legs lift `sell_levels` (cheapest first),
/// sold legs hit `buy_levels` (highest first). Each fill is committed to the
/// instrument's tracker right after the limit check.
///
/// A book running out before the target is reached is not an error, the leg
/// is just partially filled. A fill that would break a position limit aborts
/// with `RiskError::LimitViolation`.
pub fn realize(
    buy_legs: &Legs,
    sell_legs: &Legs,
    units: i64,
    market: &MarketView,
    inventory: &mut Inventory,
    out: &mut OrderBatch,
) -> Result<Vec<LegFill>, RiskError> {
    let mut fills = Vec::with_capacity(buy_legs.len() + sell_legs.len());
    if units <= 0 {
        return Ok(fills);
    }
    for (instr, &ratio) in buy_legs {
        let levels = market.get(instr).map(|s| s.sell_levels.as_slice()).unwrap_or_default();
        fills.push(walk(instr, levels, ratio * units, 1, inventory, out)?);
    }
    for (instr, &ratio) in sell_legs {
        let levels = market.get(instr).map(|s| s.buy_levels.as_slice()).unwrap_or_default();
        fills.push(walk(instr, levels, ratio * units, -1, inventory, out)?);
    }
    Ok(fills)
}

fn walk(
    instr: &Instrument,
    levels: &[PriceLevel],
    target: i64,
    sign: i64,
    inventory: &mut Inventory,
    out: &mut OrderBatch,
) -> Result<LegFill, RiskError> {
    let st = inventory.get_mut(instr).ok_or_else(|| RiskError::UnknownInstrument(instr.clone()))?;
    let mut remaining = target;

    for level in levels {
        if remaining <= 0 {
            break;
        }
        let take = remaining.min(level.volume);
        if take <= 0 {
            continue;
        }
        let delta = sign * take;
        if !st.position.check_trade_allowed(delta) {
            return Err(RiskError::LimitViolation {
                instrument: instr.clone(),
                position: st.position.volume(),
                delta,
                limit: st.position.limit(),
            });
        }
        st.position.commit(level.price, delta);
        out.entry(instr.clone()).or_default().push(Order {
            instrument: instr.clone(),
            price: level.price,
            quantity: delta,
        });
        debug!(instrument = %instr, px = level.price, qty = delta, "leg fill");
        remaining -= take;
    }

    let fill = LegFill { target, filled: target - remaining };
    if fill.shortfall() > 0 {
        warn!(instrument = %instr, target, filled = fill.filled, "liquidity shortfall, partial leg fill");
    }
    Ok(fill)
}
