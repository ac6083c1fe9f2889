// ===============================
// src/posttrade.rs
// ===============================
use tracing::{info, warn};
use crate::domain::{Side, TickResponse};


pub fn log_tick(ts: i64, resp: &TickResponse) {
if resp.state_reset {
warn!(ts, "state blob was reset this tick");
}
for (instr, orders) in &resp.orders {
for o in orders {
match o.side() {
Side::Buy => info!(ts, instrument=%instr, px=o.price, qty=o.quantity, "BUY"),
Side::Sell => info!(ts, instrument=%instr, px=o.price, qty=o.quantity, "SELL"),
}
}
}
}
