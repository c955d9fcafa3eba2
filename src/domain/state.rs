//! Per-instrument running state owned by the engine.
//!
//! Create/update/delete transitions happen only inside the cycle that
//! processes the instrument.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::confirmation::ConfirmationState;
use crate::domain::risk::RiskLevels;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InstrumentState {
    #[serde(default)]
    pub confirmation: ConfirmationState,
    /// Present iff the instrument holds an open engine-managed position.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk: Option<RiskLevels>,
}

impl InstrumentState {
    pub fn is_idle(&self) -> bool {
        !self.confirmation.is_pending() && self.risk.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineState {
    #[serde(default)]
    pub instruments: BTreeMap<String, InstrumentState>,
}

impl EngineState {
    pub fn get(&self, instrument: &str) -> Option<&InstrumentState> {
        self.instruments.get(instrument)
    }

    /// Entry for `instrument`, created idle on first use.
    pub fn entry(&mut self, instrument: &str) -> &mut InstrumentState {
        self.instruments.entry(instrument.to_string()).or_default()
    }

    /// Drop idle entries and anything not in `keep`.
    pub fn prune(&mut self, keep: &[String]) {
        self.instruments
            .retain(|name, state| keep.contains(name) && !state.is_idle());
    }
}
