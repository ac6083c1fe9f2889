// ===============================
// src/feed.rs
// ===============================
//
// Sumber tick untuk host:
// - run_mock   : random-walk order book multi-instrumen (beberapa level per sisi)
// - run_replay : baca file JSONL berisi TickRequest, satu baris per tick
//
// Blob state TIDAK diisi di sini; host (main.rs) yang menyisipkan blob dari
// tick sebelumnya.
//
use std::collections::BTreeMap;
use std::path::PathBuf;

use rand::Rng;
use tokio::{
    fs::File,
    io::{AsyncBufReadExt, BufReader},
    sync::mpsc,
    time::{sleep, Duration},
};
use tracing::{error, info, warn};

use crate::domain::{Instrument, OrderBook, TickRequest, Trade};

const LEVELS_PER_SIDE: i64 = 3;

/// Random-walk books around a per-instrument mid (start 2000, floor 100).
pub fn mock_tick<R: Rng>(rng: &mut R, mids: &mut BTreeMap<Instrument, i64>, timestamp: i64) -> TickRequest {
    let mut req = TickRequest { timestamp, ..TickRequest::default() };
    for (instr, mid) in mids.iter_mut() {
        *mid = (*mid + rng.gen_range(-3..=3)).max(100);
        let half_spread = rng.gen_range(1..=3);
        let mut book = OrderBook::default();
        for i in 0..LEVELS_PER_SIDE {
            book.buy_orders.insert(*mid - half_spread - i, rng.gen_range(1..=20));
            // seperti host aslinya: volume sisi jual negatif
            book.sell_orders.insert(*mid + half_spread + i, -rng.gen_range(1..=20));
        }
        if rng.gen_bool(0.3) {
            let trade = Trade { price: *mid, quantity: rng.gen_range(1..=5) };
            req.market_trades.insert(instr.clone(), vec![trade]);
        }
        req.books.insert(instr.clone(), book);
    }
    req
}

pub async fn run_mock(tx: mpsc::Sender<TickRequest>, instruments: Vec<Instrument>, interval_ms: u64) {
    let mut mids: BTreeMap<Instrument, i64> = instruments.into_iter().map(|i| (i, 2_000)).collect();
    loop {
        let ts = chrono::Utc::now().timestamp_millis();
        // jangan simpan ThreadRng melewati .await
        let req = mock_tick(&mut rand::thread_rng(), &mut mids, ts);
        if tx.send(req).await.is_err() {
            info!("mock feed: receiver closed, stopped");
            return;
        }
        sleep(Duration::from_millis(interval_ms)).await;
    }
}

pub async fn run_replay(tx: mpsc::Sender<TickRequest>, path: PathBuf) {
    let file = match File::open(&path).await {
        Ok(f) => f,
        Err(e) => {
            error!(?e, path = %path.display(), "replay: open failed");
            return;
        }
    };
    info!(path = %path.display(), "replay: started");

    let mut lines = BufReader::new(file).lines();
    let mut line_no: u64 = 0;
    loop {
        let line = match lines.next_line().await {
            Ok(Some(l)) => l,
            Ok(None) => break,
            Err(e) => {
                error!(?e, line_no, "replay: read error, stopped");
                break;
            }
        };
        line_no += 1;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<TickRequest>(&line) {
            Ok(req) => {
                if tx.send(req).await.is_err() {
                    return;
                }
            }
            Err(e) => warn!(?e, line_no, "replay: bad tick line, skipped"),
        }
    }
    info!(ticks = line_no, "replay: finished");
}
