// ===============================
// src/domain.rs
// ===============================
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Instrument identifier (mis. "KELP", "SQUID_INK").
pub type Instrument = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side { Buy, Sell }
impl Side { pub fn sign(&self) -> i64 { match self { Side::Buy => 1, Side::Sell => -1 } } }

/// One aggregated book level. `volume` is always non-negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceLevel { pub price: i64, pub volume: i64 }

/// Raw per-instrument book as handed over by the host: price -> volume per side.
/// Hosts may report sell volumes negative; the snapshot normalizes with `abs()`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderBook {
    #[serde(default)]
    pub buy_orders: BTreeMap<i64, i64>,
    #[serde(default)]
    pub sell_orders: BTreeMap<i64, i64>,
}

/// Market trade observed since the previous tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Trade { pub price: i64, pub quantity: i64 }

/// Priced order emitted by the engine. `quantity` > 0 buys, < 0 sells.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order { pub instrument: Instrument, pub price: i64, pub quantity: i64 }

impl Order {
    pub fn side(&self) -> Side { if self.quantity >= 0 { Side::Buy } else { Side::Sell } }
}

/// Everything the host passes in for one tick.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TickRequest {
    #[serde(default)]
    pub timestamp: i64,
    pub books: BTreeMap<Instrument, OrderBook>,
    #[serde(default)]
    pub market_trades: BTreeMap<Instrument, Vec<Trade>>,
    /// Blob returned by the previous tick, empty on the first call.
    #[serde(default)]
    pub state: String,
}

/// What goes back to the host.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TickResponse {
    pub orders: BTreeMap<Instrument, Vec<Order>>,
    pub conversions: i64,
    pub state: String,
    /// true when the incoming blob was rejected and the engine started fresh
    pub state_reset: bool,
}

impl TickResponse {
    pub fn order_count(&self) -> usize { self.orders.values().map(Vec::len).sum() }
}

// Recorder events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TickSummary { pub timestamp: i64, pub instruments: usize, pub orders: usize, pub state_reset: bool }
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event { Tick(TickSummary), Ord(Order), Note(String) }
