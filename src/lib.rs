// ===============================
// src/lib.rs
// ===============================
pub mod domain;
pub mod config;
pub mod metrics;
pub mod recorder;
pub mod feed;
pub mod estimator;   // rolling quantity-weighted average
pub mod positions;
pub mod market;      // per-tick book snapshot
pub mod spread;
pub mod risk;        // volume sizer
pub mod router;      // order realizer
pub mod state;       // versioned blob for the host
pub mod engine;
pub mod posttrade;

pub use engine::{Engine, EngineError};
