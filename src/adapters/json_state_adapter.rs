//! Restart snapshot stored as a pretty-printed JSON file.

use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use tracing::debug;

use crate::domain::error::EngineError;
use crate::domain::state::EngineState;
use crate::ports::state_port::StatePort;

pub struct JsonStateAdapter {
    path: PathBuf,
}

impl JsonStateAdapter {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn state_error(&self, reason: impl std::fmt::Display) -> EngineError {
        EngineError::State {
            reason: format!("{}: {}", self.path.display(), reason),
        }
    }
}

impl StatePort for JsonStateAdapter {
    fn load(&self) -> Result<Option<EngineState>, EngineError> {
        let json = match fs::read_to_string(&self.path) {
            Ok(json) => json,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no state snapshot yet");
                return Ok(None);
            }
            Err(e) => return Err(self.state_error(e)),
        };
        let state: EngineState = serde_json::from_str(&json).map_err(|e| self.state_error(e))?;
        debug!(
            path = %self.path.display(),
            instruments = state.instruments.len(),
            "state snapshot loaded"
        );
        Ok(Some(state))
    }

    fn save(&self, state: &EngineState) -> Result<(), EngineError> {
        let json = serde_json::to_string_pretty(state).map_err(|e| self.state_error(e))?;
        // Write beside the target and rename so a crash never leaves half a file.
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(|e| self.state_error(e))?;
        fs::rename(&tmp, &self.path).map_err(|e| self.state_error(e))?;
        debug!(path = %self.path.display(), "state snapshot saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::confirmation::ConfirmationState;
    use crate::domain::signal::Signal;
    use tempfile::TempDir;

    #[test]
    fn missing_file_loads_none() {
        let dir = TempDir::new().unwrap();
        let adapter = JsonStateAdapter::new(dir.path().join("state.json"));
        assert!(adapter.load().unwrap().is_none());
    }

    #[test]
    fn save_then_load() {
        let dir = TempDir::new().unwrap();
        let adapter = JsonStateAdapter::new(dir.path().join("state.json"));

        let mut state = EngineState::default();
        state.entry("AAPL").confirmation = ConfirmationState::Armed(Signal::Buy);
        adapter.save(&state).unwrap();

        assert_eq!(adapter.load().unwrap(), Some(state));
        assert!(!dir.path().join("state.json.tmp").exists());
    }

    #[test]
    fn corrupt_file_is_state_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, "{not json").unwrap();

        let err = JsonStateAdapter::new(path).load().unwrap_err();
        assert!(matches!(err, EngineError::State { .. }));
    }
}
