// ===============================
// src/metrics.rs
// ===============================
use once_cell::sync::Lazy;
use prometheus::{
    Encoder, GaugeVec, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGaugeVec, Opts, Registry,
    TextEncoder,
};
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread;

// Single custom registry (we register everything here)
pub static REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);

// -------- Engine --------
pub static TICKS: Lazy<IntCounter> =
    Lazy::new(|| IntCounter::new("ticks_total", "engine ticks processed").unwrap());

pub static ORDERS_BY_INSTRUMENT: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(Opts::new("orders_total", "orders emitted per instrument"), &["instrument"]).unwrap()
});

pub static SPREADS_REALIZED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(Opts::new("spreads_realized_total", "spreads sized > 0 and realized"), &["spread"]).unwrap()
});

pub static SPREAD_PROFIT: Lazy<GaugeVec> = Lazy::new(|| {
    GaugeVec::new(Opts::new("spread_profit", "last evaluated profit per unit (oriented)"), &["spread"]).unwrap()
});

pub static STATE_RESETS: Lazy<IntCounter> =
    Lazy::new(|| IntCounter::new("state_resets_total", "state blobs rejected and reset").unwrap());

pub static LIQUIDITY_SHORTFALLS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("liquidity_shortfalls_total", "legs filled below their sized target").unwrap()
});

pub static TICK_LATENCY_MS: Lazy<Histogram> = Lazy::new(|| {
    Histogram::with_opts(HistogramOpts::new("tick_latency_ms", "engine run_tick duration (ms)")).unwrap()
});

// Inventory
pub static INV_QTY: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(Opts::new("inventory_qty", "signed position per instrument"), &["instrument"]).unwrap()
});

// -------- Host --------
pub static TICK_ERRORS: Lazy<IntCounter> =
    Lazy::new(|| IntCounter::new("tick_errors_total", "ticks aborted by the engine").unwrap());

pub fn init() {
    // Register all metrics to the custom registry
    for m in [
        REGISTRY.register(Box::new(TICKS.clone())),
        REGISTRY.register(Box::new(ORDERS_BY_INSTRUMENT.clone())),
        REGISTRY.register(Box::new(SPREADS_REALIZED.clone())),
        REGISTRY.register(Box::new(SPREAD_PROFIT.clone())),
        REGISTRY.register(Box::new(STATE_RESETS.clone())),
        REGISTRY.register(Box::new(LIQUIDITY_SHORTFALLS.clone())),
        REGISTRY.register(Box::new(TICK_LATENCY_MS.clone())),
        REGISTRY.register(Box::new(INV_QTY.clone())),
        REGISTRY.register(Box::new(TICK_ERRORS.clone())),
    ] {
        let _ = m;
    }
}

// Encode all metrics in Prometheus text format
pub fn encode_metrics() -> Vec<u8> {
    let encoder = TextEncoder::new();
    let families = REGISTRY.gather();
    let mut buf = Vec::new();
    if encoder.encode(&families, &mut buf).is_err() || buf.is_empty() {
        buf.extend_from_slice(b"# no metrics\n");
    }
    buf
}

// Serve one HTTP request (GET / or /metrics), tiny HTTP 1.1 responder
fn handle_client(mut stream: TcpStream) {
    // Read a bit to consume headers (no full parse)
    let mut _req_buf = [0u8; 1024];
    let _ = stream.read(&mut _req_buf);

    let body = encode_metrics();
    let header = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: text/plain; version=0.0.4; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        body.len()
    );

    let _ = stream.write_all(header.as_bytes());
    let _ = stream.write_all(&body);
    let _ = stream.flush();
}

// Metrics server on a dedicated OS thread (engine loop stays on Tokio)
pub fn serve_metrics(port: u16) {
    thread::spawn(move || {
        let addr = format!("0.0.0.0:{port}");
        let listener = match TcpListener::bind(&addr) {
            Ok(l) => l,
            Err(e) => {
                tracing::error!(%addr, error = %e, "metrics bind failed, metrics disabled");
                return;
            }
        };
        tracing::info!("metrics listening on http://{addr}/ (and /metrics)");

        for conn in listener.incoming() {
            match conn {
                Ok(stream) => handle_client(stream),
                Err(e) => tracing::warn!(error = %e, "metrics accept error"),
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registered_metrics_show_up_in_text_output() {
        init();
        TICKS.inc();
        STATE_RESETS.inc();
        let text = String::from_utf8(encode_metrics()).unwrap();
        assert!(text.contains("ticks_total"));
        assert!(text.contains("state_resets_total"));
    }
}
