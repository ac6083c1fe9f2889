// ===============================
// src/config.rs
// ===============================
/*
=============================================================================
Project : spread_arb_rust — multi-leg spread arbitrage decision engine
Module  : config.rs
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
use std::collections::BTreeMap;
use std::env;
use std::path::PathBuf;

use clap::Parser;
use dotenvy::dotenv;
use thiserror::Error;

use crate::domain::Instrument;
use crate::spread::{self, SpreadDefinition};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("spread {spread}: instrument {instrument} is both bought and sold")]
    OverlappingLegs { spread: String, instrument: Instrument },
    #[error("spread {spread}: ratio {ratio} for {instrument} must be > 0")]
    BadRatio { spread: String, instrument: Instrument, ratio: i64 },
    #[error("spread {0}: needs at least one buy leg and one sell leg")]
    EmptyLegs(String),
    #[error("duplicate spread name {0}")]
    DuplicateSpread(String),
    #[error("position limit for {instrument} must be > 0 (got {limit})")]
    BadLimit { instrument: Instrument, limit: i64 },
    #[error("cannot parse {key}: {reason}")]
    Parse { key: String, reason: String },
    #[error("spreads file {path}: {source}")]
    SpreadsFile { path: String, source: std::io::Error },
    #[error("spreads file {path}: {source}")]
    SpreadsJson { path: String, source: serde_json::Error },
}

/// Host options (CLI, with ENV fallback).
#[derive(Parser, Clone, Debug)]
#[command(name = "spread_arb_rust", about = "Spread arbitrage engine driven by a tick host")]
pub struct Args {
    /// Replay ticks from a JSONL file of `TickRequest`s instead of the mock feed
    #[arg(long, env = "REPLAY_FILE")]
    pub replay: Option<PathBuf>,

    /// Stop after N ticks (default: run forever / until replay ends)
    #[arg(long, env = "MAX_TICKS")]
    pub ticks: Option<u64>,

    /// Append JSONL events here
    #[arg(long, env = "RECORD_FILE")]
    pub record_file: Option<String>,

    #[arg(long, env = "METRICS_PORT", default_value_t = 9898)]
    pub metrics_port: u16,

    /// Mock feed pacing
    #[arg(long, env = "TICK_INTERVAL_MS", default_value_t = 100)]
    pub tick_interval_ms: u64,
}

#[derive(Clone, Debug)]
pub struct EngineConfig {
    pub position_limits: BTreeMap<Instrument, i64>,
    pub default_position_limit: i64,
    pub spreads: Vec<SpreadDefinition>,
    pub average_window: u64,
    pub min_profit: f64,
    pub require_warm_estimators: bool,
    pub conversions: i64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let position_limits = ["RAINFOREST_RESIN", "KELP", "SQUID_INK"]
            .iter()
            .map(|s| (s.to_string(), 50))
            .collect();
        Self {
            position_limits,
            default_position_limit: 50,
            spreads: vec![SpreadDefinition::new("squid_kelp", &[("SQUID_INK", 1)], &[("KELP", 1)])],
            average_window: 100,
            min_profit: 0.0,
            require_warm_estimators: false,
            conversions: 1,
        }
    }
}

impl EngineConfig {
    pub fn limit_for(&self, instrument: &str) -> i64 {
        self.position_limits.get(instrument).copied().unwrap_or(self.default_position_limit)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let limits = self
            .position_limits
            .iter()
            .map(|(i, l)| (i.as_str(), *l))
            .chain(std::iter::once(("<default>", self.default_position_limit)));
        for (instrument, limit) in limits {
            if limit <= 0 {
                return Err(ConfigError::BadLimit { instrument: instrument.to_string(), limit });
            }
        }
        spread::validate_all(&self.spreads)
    }

    /// Build from a key lookup (ENV in production, a map in tests). Missing keys keep defaults.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut cfg = Self::default();

        if let Some(v) = get("POSITION_LIMITS") {
            cfg.position_limits = parse_limits(&v)?;
        }
        if let Some(v) = get("DEFAULT_POSITION_LIMIT") {
            cfg.default_position_limit = parse_num("DEFAULT_POSITION_LIMIT", &v)?;
        }
        if let Some(path) = get("SPREADS_FILE") {
            cfg.spreads = load_spreads_file(&path)?;
        } else if let Some(v) = get("SPREADS") {
            cfg.spreads = parse_spreads(&v)?;
        }
        if let Some(v) = get("AVERAGE_WINDOW") {
            cfg.average_window = parse_num("AVERAGE_WINDOW", &v)?;
        }
        if let Some(v) = get("MIN_PROFIT") {
            cfg.min_profit = parse_num("MIN_PROFIT", &v)?;
        }
        if let Some(v) = get("REQUIRE_WARM_ESTIMATORS") {
            cfg.require_warm_estimators = matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes");
        }
        if let Some(v) = get("CONVERSIONS") {
            cfg.conversions = parse_num("CONVERSIONS", &v)?;
        }

        cfg.validate()?;
        Ok(cfg)
    }
}

fn parse_num<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::Parse { key: key.to_string(), reason: e.to_string() })
}

/// `KELP=50,SQUID_INK=50`
pub fn parse_limits(raw: &str) -> Result<BTreeMap<Instrument, i64>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|x| !x.is_empty())
        .map(|entry| {
            let (instr, limit) = entry.split_once('=').ok_or_else(|| ConfigError::Parse {
                key: "POSITION_LIMITS".into(),
                reason: format!("expected INSTRUMENT=LIMIT, got {entry:?}"),
            })?;
            Ok((instr.trim().to_ascii_uppercase(), parse_num("POSITION_LIMITS", limit)?))
        })
        .collect()
}

/// `name:BUY*1+BUY2*2/SELL*3;other:...` (ratio `*r` boleh dihilangkan -> 1)
pub fn parse_spreads(raw: &str) -> Result<Vec<SpreadDefinition>, ConfigError> {
    let bad = |reason: String| ConfigError::Parse { key: "SPREADS".into(), reason };
    raw.split(';')
        .map(str::trim)
        .filter(|x| !x.is_empty())
        .map(|entry| {
            let (name, body) = entry.split_once(':').ok_or_else(|| bad(format!("missing name in {entry:?}")))?;
            let (buy, sell) = body.split_once('/').ok_or_else(|| bad(format!("missing '/' in {entry:?}")))?;
            Ok(SpreadDefinition {
                name: name.trim().to_string(),
                to_buy: parse_legs(buy).map_err(bad)?,
                to_sell: parse_legs(sell).map_err(bad)?,
            })
        })
        .collect()
}

fn parse_legs(raw: &str) -> Result<spread::Legs, String> {
    raw.split('+')
        .map(str::trim)
        .filter(|x| !x.is_empty())
        .map(|leg| match leg.split_once('*') {
            Some((instr, ratio)) => ratio
                .trim()
                .parse::<i64>()
                .map(|r| (instr.trim().to_ascii_uppercase(), r))
                .map_err(|e| format!("leg {leg:?}: {e}")),
            None => Ok((leg.to_ascii_uppercase(), 1)),
        })
        .collect()
}

/// JSON array of `{ "name", "to_buy": {INSTR: ratio}, "to_sell": {...} }`
pub fn load_spreads_file(path: &str) -> Result<Vec<SpreadDefinition>, ConfigError> {
    let raw = std::fs::read_to_string(path)
        .map_err(|source| ConfigError::SpreadsFile { path: path.to_string(), source })?;
    serde_json::from_str(&raw).map_err(|source| ConfigError::SpreadsJson { path: path.to_string(), source })
}

pub fn load() -> Result<(Args, EngineConfig), ConfigError> {
    // Pastikan .env dibaca sebelum clap (env fallback) & engine config
    let _ = dotenv();
    let args = Args::parse();
    let cfg = EngineConfig::from_lookup(|k| env::var(k).ok().filter(|v| !v.trim().is_empty()))?;
    Ok((args, cfg))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn defaults_are_valid() {
        let cfg = EngineConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(cfg.limit_for("KELP"), 50);
        assert_eq!(cfg.limit_for("UNKNOWN"), 50);
        assert_eq!(cfg.spreads.len(), 1);
        assert_eq!(cfg.average_window, 100);
        assert_eq!(cfg.conversions, 1);
    }

    #[test]
    fn parses_limits_and_spreads() {
        let cfg = EngineConfig::from_lookup(lookup(&[
            ("POSITION_LIMITS", "basket=60, croissants=250"),
            ("SPREADS", "b1:BASKET/CROISSANTS*6+JAMS*3; b2:JAMS*2/BASKET"),
            ("MIN_PROFIT", "1.5"),
            ("REQUIRE_WARM_ESTIMATORS", "true"),
        ]))
        .unwrap();
        assert_eq!(cfg.limit_for("BASKET"), 60);
        assert_eq!(cfg.limit_for("CROISSANTS"), 250);
        assert_eq!(cfg.spreads[0].to_buy.get("BASKET"), Some(&1));
        assert_eq!(cfg.spreads[0].to_sell.get("CROISSANTS"), Some(&6));
        assert_eq!(cfg.spreads[1].name, "b2");
        assert!(cfg.require_warm_estimators);
        assert!((cfg.min_profit - 1.5).abs() < f64::EPSILON);
    }

    #[test]
    fn rejects_overlapping_spread() {
        let err = EngineConfig::from_lookup(lookup(&[("SPREADS", "bad:A*1/A*2")])).unwrap_err();
        assert!(matches!(err, ConfigError::OverlappingLegs { .. }));
    }

    #[test]
    fn rejects_non_positive_limits_and_garbage() {
        assert!(matches!(
            EngineConfig::from_lookup(lookup(&[("POSITION_LIMITS", "A=0")])),
            Err(ConfigError::BadLimit { .. })
        ));
        assert!(matches!(
            EngineConfig::from_lookup(lookup(&[("AVERAGE_WINDOW", "lots")])),
            Err(ConfigError::Parse { .. })
        ));
        assert!(matches!(
            EngineConfig::from_lookup(lookup(&[("SPREADS", "nope")])),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn loads_spreads_from_json_file() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        write!(f, r#"[{{"name":"pair","to_buy":{{"A":2}},"to_sell":{{"B":1}}}}]"#).unwrap();
        let path = f.path().to_string_lossy().to_string();
        let cfg = EngineConfig::from_lookup(lookup(&[("SPREADS_FILE", path.as_str())])).unwrap();
        assert_eq!(cfg.spreads, vec![SpreadDefinition::new("pair", &[("A", 2)], &[("B", 1)])]);
    }

    #[test]
    fn missing_spreads_file_is_an_error() {
        let err = EngineConfig::from_lookup(lookup(&[("SPREADS_FILE", "/nonexistent/spreads.json")])).unwrap_err();
        assert!(matches!(err, ConfigError::SpreadsFile { .. }));
    }
}
