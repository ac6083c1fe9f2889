// ===============================
// src/estimator.rs
// ===============================
//
// Rata-rata tertimbang kuantitas dengan jendela geser (sliding window) yang
// dibatasi `capacity` unit. Dipakai untuk dua peran:
// - estimator jangka panjang per instrumen (capacity = AVERAGE_WINDOW, persisten)
// - estimator sisi buku per tick (capacity = total volume sisi itu, dibuang tiap tick)
//
use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::domain::PriceLevel;

const AVERAGE_TOLERANCE: f64 = 1e-6;

/// A batch of `quantity` units admitted at `price`. Eviction may shrink the
/// oldest batch partially.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub price: f64,
    pub quantity: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollingPriceEstimator {
    capacity: u64,
    total: u64,
    average: f64,
    samples: VecDeque<Sample>,
}

impl RollingPriceEstimator {
    pub fn new(capacity: u64) -> Self {
        Self { capacity, total: 0, average: 0.0, samples: VecDeque::new() }
    }

    /// One-shot side estimator: capacity equals the side's total volume, so every
    /// level stays in the window and the result is the plain volume-weighted price.
    pub fn from_levels(levels: &[PriceLevel]) -> Self {
        let capacity = levels.iter().fold(0u64, |acc, l| acc.saturating_add(l.volume.max(0) as u64));
        let mut est = Self::new(capacity);
        for l in levels {
            est.update(l.price as f64, l.volume.max(0) as u64);
        }
        est
    }

    pub fn update(&mut self, price: f64, quantity: u64) {
        if quantity == 0 || self.capacity == 0 {
            return;
        }
        if self.samples.is_empty() {
            self.average = price;
            self.total = 0;
        }

        // evict oldest units until the new batch fits
        while self.total.saturating_add(quantity) > self.capacity {
            let Some(front) = self.samples.front_mut() else { break };
            let k = (self.total.saturating_add(quantity) - self.capacity).min(front.quantity);
            let remaining = self.total - k;
            self.average = if remaining == 0 {
                price
            } else {
                (self.average * self.total as f64 - front.price * k as f64) / remaining as f64
            };
            self.total = remaining;
            front.quantity -= k;
            if front.quantity == 0 {
                self.samples.pop_front();
            }
        }

        let admitted = (self.capacity - self.total).min(quantity);
        self.average = (self.average * self.total as f64 + admitted as f64 * price)
            / (self.total + admitted) as f64;
        self.total += admitted;
        self.samples.push_back(Sample { price, quantity: admitted });
    }

    /// Window is saturated; decisions gated on this never act on a cold average.
    pub fn is_full(&self) -> bool {
        self.capacity > 0 && self.total == self.capacity
    }

    pub fn average(&self) -> Option<f64> {
        if self.total == 0 { None } else { Some(self.average) }
    }

    pub fn total_quantity(&self) -> u64 { self.total }
    pub fn capacity(&self) -> u64 { self.capacity }
    pub fn samples(&self) -> impl Iterator<Item = &Sample> { self.samples.iter() }

    /// Consistency check used when a persisted estimator is decoded.
    pub fn check_consistent(&self) -> Result<(), String> {
        let retained: u64 = self.samples.iter().map(|s| s.quantity).sum();
        if retained != self.total {
            return Err(format!("retained quantity {} != total {}", retained, self.total));
        }
        if self.total > self.capacity {
            return Err(format!("total {} exceeds capacity {}", self.total, self.capacity));
        }
        if self.samples.iter().any(|s| s.quantity == 0 || !s.price.is_finite()) {
            return Err("empty or non-finite sample".into());
        }
        if !self.average.is_finite() {
            return Err("non-finite average".into());
        }
        if self.total > 0 {
            let mean = self.samples.iter().map(|s| s.price * s.quantity as f64).sum::<f64>() / self.total as f64;
            // toleransi relatif untuk drift floating point dari update inkremental
            if (mean - self.average).abs() > AVERAGE_TOLERANCE * mean.abs().max(1.0) {
                return Err(format!("average {} does not match retained samples ({})", self.average, mean));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    const EPS: f64 = 1e-6;

    /// Brute force: keep every unit, average the newest `capacity` of them.
    fn brute_force(history: &[(f64, u64)], capacity: u64) -> Option<f64> {
        let mut units: Vec<f64> = Vec::new();
        for &(p, q) in history {
            for _ in 0..q {
                units.push(p);
            }
        }
        let take = (capacity as usize).min(units.len());
        if take == 0 {
            return None;
        }
        let window = &units[units.len() - take..];
        Some(window.iter().sum::<f64>() / take as f64)
    }

    #[test]
    fn empty_estimator_has_no_average() {
        let est = RollingPriceEstimator::new(10);
        assert_eq!(est.average(), None);
        assert!(!est.is_full());
    }

    #[test]
    fn seeds_on_first_sample() {
        let mut est = RollingPriceEstimator::new(10);
        est.update(101.0, 3);
        assert_eq!(est.average(), Some(101.0));
        assert_eq!(est.total_quantity(), 3);
    }

    #[test]
    fn partial_eviction_keeps_remainder_of_oldest_batch() {
        let mut est = RollingPriceEstimator::new(4);
        est.update(100.0, 3);
        est.update(110.0, 2); // evicts one unit at 100
        assert_eq!(est.total_quantity(), 4);
        assert!((est.average().unwrap() - 105.0).abs() < EPS);
        let s: Vec<_> = est.samples().copied().collect();
        assert_eq!(s[0], Sample { price: 100.0, quantity: 2 });
        assert!(est.is_full());
    }

    #[test]
    fn batch_larger_than_window_replaces_everything() {
        let mut est = RollingPriceEstimator::new(5);
        est.update(90.0, 2);
        est.update(120.0, 9);
        assert_eq!(est.total_quantity(), 5);
        assert!((est.average().unwrap() - 120.0).abs() < EPS);
    }

    #[test]
    fn zero_quantity_is_ignored() {
        let mut est = RollingPriceEstimator::new(5);
        est.update(90.0, 0);
        assert_eq!(est.average(), None);
    }

    #[test]
    fn matches_brute_force_over_random_sequences() {
        let mut rng = StdRng::seed_from_u64(7);
        for capacity in [1u64, 3, 10, 100] {
            let mut est = RollingPriceEstimator::new(capacity);
            let mut history = Vec::new();
            for _ in 0..500 {
                let p = rng.gen_range(90..=110) as f64;
                let q = rng.gen_range(1..=7u64);
                est.update(p, q);
                history.push((p, q));

                assert!(est.total_quantity() <= capacity);
                let expected = brute_force(&history, capacity).unwrap();
                let got = est.average().unwrap();
                assert!((got - expected).abs() < EPS, "cap {capacity}: {got} vs {expected}");
                assert!(est.check_consistent().is_ok());
            }
        }
    }

    #[test]
    fn average_out_of_line_with_samples_is_inconsistent() {
        let mut est = RollingPriceEstimator::new(10);
        est.update(100.0, 2);
        assert!(est.check_consistent().is_ok());
        est.average = 5_000.0;
        assert!(est.check_consistent().is_err());
    }

    #[test]
    fn side_estimator_is_volume_weighted() {
        let levels = [PriceLevel { price: 101, volume: 5 }, PriceLevel { price: 102, volume: 10 }];
        let est = RollingPriceEstimator::from_levels(&levels);
        assert_eq!(est.capacity(), 15);
        assert!((est.average().unwrap() - (5.0 * 101.0 + 10.0 * 102.0) / 15.0).abs() < EPS);
        assert!(est.is_full());
    }
}
