// ===============================
// src/positions.rs (inventory & limit tracker)
// ===============================
use serde::{Deserialize, Serialize};

/// Signed inventory of one instrument plus its volume-weighted entry price.
/// Invariant: |volume| <= limit after every commit that passed `check_trade_allowed`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionTracker {
    volume: i64,
    avg_price: f64,
    limit: i64,
}

impl PositionTracker {
    pub fn new(limit: i64) -> Self { Self { volume: 0, avg_price: 0.0, limit } }

    pub fn volume(&self) -> i64 { self.volume }
    pub fn avg_price(&self) -> f64 { self.avg_price }
    pub fn limit(&self) -> i64 { self.limit }

    pub fn check_trade_allowed(&self, delta: i64) -> bool {
        (self.volume + delta).abs() <= self.limit
    }

    pub fn max_buy_headroom(&self) -> i64 { self.limit - self.volume }
    pub fn max_sell_headroom(&self) -> i64 { self.limit + self.volume }

    /// Apply a fill. Does not enforce the limit, callers gate with
    /// `check_trade_allowed` first.
    pub fn commit(&mut self, price: i64, delta: i64) {
        let new_volume = self.volume + delta;
        if new_volume != 0 {
            // flat -> avg dibiarkan (nilai residual tidak dipakai)
            self.avg_price = (price as f64 * delta as f64 + self.avg_price * self.volume as f64)
                / new_volume as f64;
        }
        self.volume = new_volume;
    }

    pub fn check_consistent(&self) -> Result<(), String> {
        if self.limit <= 0 {
            return Err(format!("non-positive limit {}", self.limit));
        }
        if self.volume.abs() > self.limit {
            return Err(format!("volume {} beyond limit {}", self.volume, self.limit));
        }
        if !self.avg_price.is_finite() {
            return Err("non-finite average price".into());
        }
        Ok(())
    }
}
