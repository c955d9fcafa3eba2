//! Domain error types.
//!
//! Each pipeline stage has its own error enum; [`EngineError`] wraps them for
//! the per-instrument cycle handler, which decides skip-vs-abort.

/// A parse error with position information for rule parsing.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("parse error at position {position}: {message}")]
pub struct ParseError {
    pub message: String,
    pub position: usize,
}

impl ParseError {
    /// Format the error with a caret pointing at the error position in the input.
    pub fn display_with_context(&self, input: &str) -> String {
        let caret = " ".repeat(self.position) + "^";
        format!(
            "{input}\n{caret}\n{err}",
            input = input,
            caret = caret,
            err = self
        )
    }
}

/// Failure to produce an indicator snapshot series.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum IndicatorError {
    #[error("empty bar series")]
    EmptySeries,

    #[error("insufficient bars: have {bars}, need {minimum}")]
    InsufficientData { bars: usize, minimum: usize },

    #[error("invalid {name} period: {period}")]
    InvalidPeriod { name: &'static str, period: usize },
}

/// Risk sizing failures. Sizing always fails closed.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RiskError {
    #[error("ATR is undefined or non-positive")]
    UndefinedAtr,

    #[error("invalid entry price {price}")]
    InvalidEntry { price: f64 },

    #[error("stop percentage must be within (0, 1), got {pct}")]
    InvalidPercent { pct: f64 },

    #[error("risk/reward ratio must be positive, got {ratio}")]
    InvalidRatio { ratio: f64 },
}

/// Errors reported by the broker collaborator.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum OrderError {
    #[error("order for {instrument} rejected: {reason}")]
    Rejected { instrument: String, reason: String },

    #[error("broker unavailable: {reason}")]
    Transport { reason: String },
}

/// Top-level error type for trendgate.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("no bars available for {instrument}")]
    DataUnavailable { instrument: String },

    #[error("data source error: {reason}")]
    Data { reason: String },

    #[error(transparent)]
    Indicator(#[from] IndicatorError),

    #[error(transparent)]
    Risk(#[from] RiskError),

    #[error(transparent)]
    Order(#[from] OrderError),

    #[error("open order or position already exists for {instrument}")]
    ConflictingOrder { instrument: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error(transparent)]
    RuleParse(#[from] ParseError),

    #[error("state snapshot error: {reason}")]
    State { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl EngineError {
    pub(crate) fn invalid(section: &str, key: &str, reason: impl Into<String>) -> Self {
        EngineError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn missing(section: &str, key: &str) -> Self {
        EngineError::ConfigMissing {
            section: section.to_string(),
            key: key.to_string(),
        }
    }
}

impl From<&EngineError> for std::process::ExitCode {
    fn from(err: &EngineError) -> Self {
        let code: u8 = match err {
            EngineError::Io(_) => 1,
            EngineError::ConfigParse { .. }
            | EngineError::ConfigMissing { .. }
            | EngineError::ConfigInvalid { .. } => 2,
            EngineError::DataUnavailable { .. }
            | EngineError::Data { .. }
            | EngineError::Indicator(_) => 3,
            EngineError::RuleParse(_) => 4,
            EngineError::State { .. } => 5,
            EngineError::Risk(_) | EngineError::Order(_) | EngineError::ConflictingOrder { .. } => {
                6
            }
        };
        std::process::ExitCode::from(code)
    }
}
