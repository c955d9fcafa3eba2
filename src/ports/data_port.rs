//! Bar source port trait.

use std::fmt;
use std::str::FromStr;

use crate::domain::error::EngineError;
use crate::domain::ohlcv::Bar;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PeriodUnit {
    Minute,
    Hour,
    #[default]
    Day,
}

impl fmt::Display for PeriodUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PeriodUnit::Minute => "minute",
            PeriodUnit::Hour => "hour",
            PeriodUnit::Day => "day",
        };
        f.write_str(s)
    }
}

impl FromStr for PeriodUnit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "minute" | "1m" => Ok(PeriodUnit::Minute),
            "hour" | "1h" => Ok(PeriodUnit::Hour),
            "day" | "1d" => Ok(PeriodUnit::Day),
            other => Err(format!(
                "unknown period unit '{}' (expected minute, hour or day)",
                other
            )),
        }
    }
}

pub trait BarSource {
    /// The most recent `lookback` bars, oldest first. An empty vector means
    /// no data for this instrument right now.
    fn get_bars(
        &self,
        instrument: &str,
        lookback: usize,
        unit: PeriodUnit,
    ) -> Result<Vec<Bar>, EngineError>;
}
