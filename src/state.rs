// ===============================
// src/state.rs (opaque state blob round-tripped via host)
// ===============================
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::EngineConfig;
use crate::domain::Instrument;
use crate::estimator::RollingPriceEstimator;
use crate::positions::PositionTracker;
use crate::spread::Orientation;

pub const STATE_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum StateError {
    #[error("state blob is not valid json: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("unsupported state version {found} (expected {expected})")]
    Version { found: u32, expected: u32 },
    #[error("inconsistent state for {instrument}: {reason}")]
    Inconsistent { instrument: Instrument, reason: String },
    #[error("state for {instrument} was built with another config: {reason}")]
    ConfigMismatch { instrument: Instrument, reason: String },
}

/// Everything the engine remembers about one instrument between ticks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentState {
    pub estimator: RollingPriceEstimator,
    pub position: PositionTracker,
    pub iteration: u64,
}

impl InstrumentState {
    pub fn new(window: u64, limit: i64) -> Self {
        Self { estimator: RollingPriceEstimator::new(window), position: PositionTracker::new(limit), iteration: 0 }
    }
}

pub type Inventory = BTreeMap<Instrument, InstrumentState>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineState {
    pub version: u32,
    pub instruments: Inventory,
    /// Last orientation per spread name
    #[serde(default)]
    pub orientations: BTreeMap<String, Orientation>,
}

impl Default for EngineState {
    fn default() -> Self {
        Self { version: STATE_VERSION, instruments: BTreeMap::new(), orientations: BTreeMap::new() }
    }
}

impl EngineState {
    pub fn encode(&self) -> Result<String, StateError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Empty blob -> fresh state. Anything that does not decode to the exact
    /// schema, or decodes to values breaking an invariant, is rejected whole.
    pub fn decode(blob: &str) -> Result<Self, StateError> {
        if blob.trim().is_empty() {
            return Ok(Self::default());
        }
        let state: EngineState = serde_json::from_str(blob)?;
        if state.version != STATE_VERSION {
            return Err(StateError::Version { found: state.version, expected: STATE_VERSION });
        }
        for (instrument, st) in &state.instruments {
            st.estimator
                .check_consistent()
                .and_then(|_| st.position.check_consistent())
                .map_err(|reason| StateError::Inconsistent { instrument: instrument.clone(), reason })?;
        }
        Ok(state)
    }

    /// `decode` plus a check that every persisted tracker and estimator was
    /// created with the limit and window currently configured.
    pub fn decode_for(blob: &str, cfg: &EngineConfig) -> Result<Self, StateError> {
        let state = Self::decode(blob)?;
        for (instrument, st) in &state.instruments {
            let limit = cfg.limit_for(instrument);
            if st.position.limit() != limit {
                return Err(StateError::ConfigMismatch {
                    instrument: instrument.clone(),
                    reason: format!("position limit {} != configured {}", st.position.limit(), limit),
                });
            }
            if st.estimator.capacity() != cfg.average_window {
                return Err(StateError::ConfigMismatch {
                    instrument: instrument.clone(),
                    reason: format!("average window {} != configured {}", st.estimator.capacity(), cfg.average_window),
                });
            }
        }
        Ok(state)
    }
}
