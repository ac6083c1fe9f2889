// ===============================
// src/engine.rs (per-tick orchestration)
// ===============================
//
// Alur per tick (run-to-completion, tanpa I/O):
//   Idle -> SnapshotBuilt -> Evaluated -> Realized -> Idle
//
// 1) decode blob (gagal -> reset ke state kosong)
// 2) snapshot per instrumen + buat tracker/estimator untuk instrumen baru
// 3) evaluasi semua spread (dua arah), ranking profit menurun
// 4) sizing + realisasi berurutan; headroom berkurang antar spread,
//    depth buku TIDAK dikurangi (setiap spread melihat depth asli tick ini)
// 5) update estimator jangka panjang dari trade & harga buku, encode blob
//
use std::time::Instant;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::{ConfigError, EngineConfig};
use crate::domain::{TickRequest, TickResponse};
use crate::market::{build_view, MarketView};
use crate::metrics::{
    INV_QTY, LIQUIDITY_SHORTFALLS, ORDERS_BY_INSTRUMENT, SPREADS_REALIZED, SPREAD_PROFIT, STATE_RESETS,
    TICKS, TICK_LATENCY_MS,
};
use crate::risk::{max_units, RiskError};
use crate::router::{realize, OrderBatch};
use crate::spread::{evaluate, rank, EvaluatedSpread, SpreadDefinition};
use crate::state::{EngineState, InstrumentState, Inventory, StateError};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Risk(#[from] RiskError),
    #[error("state encode failed: {0}")]
    State(#[from] StateError),
}

pub struct Engine {
    cfg: EngineConfig,
}

impl Engine {
    pub fn new(cfg: EngineConfig) -> Result<Self, ConfigError> {
        cfg.validate()?;
        Ok(Self { cfg })
    }

    pub fn config(&self) -> &EngineConfig { &self.cfg }

    /// One tick. On error nothing is persisted: the caller keeps replaying the
    /// previous blob.
    pub fn run_tick(&self, req: &TickRequest) -> Result<TickResponse, EngineError> {
        let started = Instant::now();
        TICKS.inc();

        let (mut state, state_reset) = match EngineState::decode_for(&req.state, &self.cfg) {
            Ok(s) => (s, false),
            Err(e) => {
                warn!(error = %e, "state blob rejected, starting from empty state");
                STATE_RESETS.inc();
                (EngineState::default(), true)
            }
        };

        // ---- SnapshotBuilt ----
        let market = build_view(req.books.iter());
        for instr in req.books.keys() {
            state
                .instruments
                .entry(instr.clone())
                .or_insert_with(|| InstrumentState::new(self.cfg.average_window, self.cfg.limit_for(instr)));
        }

        // ---- Evaluated ----
        let mut evaluated = self.evaluate_all(&mut state, &market);
        rank(&mut evaluated);

        // ---- Realized ----
        let mut orders = OrderBatch::new();
        for ev in &evaluated {
            self.realize_one(ev, &market, &mut state.instruments, &mut orders)?;
        }

        self.refresh_estimators(req, &mut state.instruments);

        for (instr, st) in &state.instruments {
            INV_QTY.with_label_values(&[instr]).set(st.position.volume());
        }
        for (instr, batch) in &orders {
            ORDERS_BY_INSTRUMENT.with_label_values(&[instr]).inc_by(batch.len() as u64);
        }
        TICK_LATENCY_MS.observe(started.elapsed().as_secs_f64() * 1_000.0);

        Ok(TickResponse { orders, conversions: self.cfg.conversions, state: state.encode()?, state_reset })
    }

    fn evaluate_all(&self, state: &mut EngineState, market: &MarketView) -> Vec<EvaluatedSpread> {
        let spreads = &self.cfg.spreads;
        state.orientations.retain(|name, _| spreads.iter().any(|s| &s.name == name));

        spreads
            .iter()
            .enumerate()
            .map(|(i, def)| {
                let previous = state.orientations.get(&def.name).copied().unwrap_or_default();
                let ev = evaluate(i, def, previous, market);
                if ev.orientation != previous {
                    info!(spread = %def.name, from = ?previous, to = ?ev.orientation, "spread orientation flipped");
                }
                state.orientations.insert(def.name.clone(), ev.orientation);
                if let Some(p) = ev.profit {
                    SPREAD_PROFIT.with_label_values(&[&def.name]).set(p);
                }
                ev
            })
            .collect()
    }

    fn realize_one(
        &self,
        ev: &EvaluatedSpread,
        market: &MarketView,
        inventory: &mut Inventory,
        orders: &mut OrderBatch,
    ) -> Result<(), RiskError> {
        let def = &self.cfg.spreads[ev.index];
        let Some(profit) = ev.profit else {
            debug!(spread = %def.name, "unevaluable this tick, skip");
            return Ok(());
        };
        if profit <= self.cfg.min_profit {
            debug!(spread = %def.name, profit, min_profit = self.cfg.min_profit, "below min profit, skip");
            return Ok(());
        }
        if self.cfg.require_warm_estimators && !legs_warm(def, inventory) {
            debug!(spread = %def.name, "estimators still warming up, skip");
            return Ok(());
        }

        let (buy, sell) = ev.orientation.legs(def);
        let units = max_units(buy, sell, market, inventory);
        if units == 0 {
            debug!(spread = %def.name, profit, "no executable units");
            return Ok(());
        }

        let fills = realize(buy, sell, units, market, inventory, orders)?;
        let short = fills.iter().filter(|f| f.shortfall() > 0).count();
        if short > 0 {
            LIQUIDITY_SHORTFALLS.inc_by(short as u64);
        }
        SPREADS_REALIZED.with_label_values(&[&def.name]).inc();
        info!(spread = %def.name, orientation = ?ev.orientation, profit, units, "spread realized");
        Ok(())
    }

    /// Market trades first (older), then one unit per visible book price.
    fn refresh_estimators(&self, req: &TickRequest, inventory: &mut Inventory) {
        for (instr, trades) in &req.market_trades {
            let Some(st) = inventory.get_mut(instr) else { continue };
            for t in trades {
                st.estimator.update(t.price as f64, t.quantity.unsigned_abs());
            }
        }
        for (instr, book) in &req.books {
            let Some(st) = inventory.get_mut(instr) else { continue };
            st.iteration += 1;
            for &price in book.sell_orders.keys().chain(book.buy_orders.keys()) {
                st.estimator.update(price as f64, 1);
            }
        }
    }
}

fn legs_warm(def: &SpreadDefinition, inventory: &Inventory) -> bool {
    def.instruments().all(|i| inventory.get(i).is_some_and(|st| st.estimator.is_full()))
}
