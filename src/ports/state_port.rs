//! Restart snapshot port trait.

use crate::domain::error::EngineError;
use crate::domain::state::EngineState;

pub trait StatePort {
    /// `None` when no snapshot has been written yet.
    fn load(&self) -> Result<Option<EngineState>, EngineError>;

    fn save(&self, state: &EngineState) -> Result<(), EngineError>;
}
