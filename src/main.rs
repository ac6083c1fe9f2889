// ===============================
// src/main.rs
// ===============================
/*
 # mock feed, metrics di :9898
 cargo run --release

 # replay tick JSONL + rekam event
 cargo run --release -- --replay ticks.jsonl --record-file out/events.jsonl

 curl -s localhost:9898/metrics | egrep '^(orders_total|spreads_realized_total|inventory_qty)'
*/
/*
=============================================================================
Project : spread_arb_rust — multi-leg spread arbitrage decision engine
Module  : main.rs
Version : 0.1.0
Author  : Kukuh Tripamungkas Wicaksono (Kukuh TW)
Email   : kukuhtw@gmail.com
WhatsApp: https://wa.me/628129893706
LinkedIn: https://id.linkedin.com/in/kukuhtw
License : MIT (see LICENSE)

Summary : Per tick, normalizes the host's order books, evaluates configured
          basket spreads in both directions, sizes them against position
          limits and depth, walks the book to emit priced orders, and hands
          back an opaque versioned state blob for the next tick.

(c) 2025 Kukuh TW. All rights reserved where applicable.
=============================================================================
*/
use std::collections::BTreeSet;

use tokio::{
    select,
    sync::mpsc,
    time::{interval, Duration},
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use spread_arb_rust::{
    config,
    domain::{Event, TickRequest, TickSummary},
    feed, metrics, posttrade, recorder, Engine,
};

#[tokio::main]
async fn main() {
    // ---- Logging ----
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // ---- Load config ----
    let (args, cfg) = match config::load() {
        Ok(x) => x,
        Err(e) => {
            error!(error = %e, "invalid configuration");
            std::process::exit(2);
        }
    };

    let instruments: BTreeSet<String> = cfg
        .position_limits
        .keys()
        .cloned()
        .chain(cfg.spreads.iter().flat_map(|s| s.instruments().cloned()))
        .collect();

    info!(
        replay = ?args.replay,
        instruments = ?instruments,
        spreads = ?cfg.spreads.iter().map(|s| s.name.as_str()).collect::<Vec<_>>(),
        average_window = cfg.average_window,
        min_profit = cfg.min_profit,
        warmup = cfg.require_warm_estimators,
        "startup config"
    );

    let engine = match Engine::new(cfg) {
        Ok(e) => e,
        Err(e) => {
            error!(error = %e, "invalid configuration");
            std::process::exit(2);
        }
    };

    // ---- Metrics ----
    metrics::init();
    metrics::serve_metrics(args.metrics_port);

    // ---- Recorder (optional) ----
    let (rec_tx, rec_rx) = mpsc::channel::<Event>(8192);
    let rec_handle = args
        .record_file
        .clone()
        .map(|path| tokio::spawn(recorder::run(rec_rx, path)));

    // ---- Feed ----
    let (tick_tx, mut tick_rx) = mpsc::channel::<TickRequest>(1024);
    match args.replay.clone() {
        Some(path) => {
            tokio::spawn(feed::run_replay(tick_tx, path));
        }
        None => {
            tokio::spawn(feed::run_mock(tick_tx, instruments.into_iter().collect(), args.tick_interval_ms));
        }
    }

    // ---- Host loop: satu tick -> satu panggilan engine, blob diputar ulang ----
    let mut blob = String::new();
    let mut total_ticks: u64 = 0;
    let mut tick_count: u64 = 0;
    let mut heartbeat = interval(Duration::from_secs(1));

    loop {
        select! {
            maybe_req = tick_rx.recv() => {
                let Some(mut req) = maybe_req else {
                    info!(ticks = total_ticks, "feed finished");
                    break;
                };
                req.state = std::mem::take(&mut blob);
                match engine.run_tick(&req) {
                    Ok(resp) => {
                        posttrade::log_tick(req.timestamp, &resp);
                        let _ = rec_tx.try_send(Event::Tick(TickSummary {
                            timestamp: req.timestamp,
                            instruments: req.books.len(),
                            orders: resp.order_count(),
                            state_reset: resp.state_reset,
                        }));
                        for o in resp.orders.values().flatten() {
                            let _ = rec_tx.try_send(Event::Ord(o.clone()));
                        }
                        blob = resp.state;
                    }
                    Err(e) => {
                        // tick gagal: blob lama dipakai lagi
                        error!(ts = req.timestamp, error = %e, "tick aborted");
                        metrics::TICK_ERRORS.inc();
                        let _ = rec_tx.try_send(Event::Note(format!("tick {} aborted: {}", req.timestamp, e)));
                        blob = req.state;
                    }
                }
                total_ticks += 1;
                tick_count += 1;
                if args.ticks.is_some_and(|max| total_ticks >= max) {
                    info!(ticks = total_ticks, "tick limit reached");
                    break;
                }
            },
            _ = heartbeat.tick() => {
                info!(ticks = tick_count, "heartbeat");
                tick_count = 0;
            }
        }
    }

    // tutup channel agar recorder flush lalu berhenti
    drop(rec_tx);
    if let Some(h) = rec_handle {
        let _ = h.await;
    }
}
