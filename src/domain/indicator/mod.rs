//! Technical indicator implementations.
//!
//! This module provides types for representing indicator values and series:
//! - `IndicatorPoint`: A single point in an indicator time series
//! - `IndicatorValue`: Enum for different indicator output shapes
//! - `IndicatorType`: Enum for indicator identity + parameters
//! - `IndicatorSeries`: A time series of indicator values, one point per bar
//!
//! Every series has the same length as its input bars. Points whose window has
//! not filled yet carry `valid == false` and must never reach a trade decision.

pub mod atr;
pub mod ema;
pub mod macd;
pub mod rsi;
pub mod snapshot;

pub use atr::calculate_atr;
pub use ema::{calculate_ema, ema_values};
pub use macd::calculate_macd;
pub use rsi::calculate_rsi;
pub use snapshot::{IndicatorSettings, IndicatorSnapshot, compute_snapshots};

use chrono::NaiveDateTime;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorPoint {
    pub timestamp: NaiveDateTime,
    pub valid: bool,
    pub value: IndicatorValue,
}

#[derive(Debug, Clone, PartialEq)]
pub enum IndicatorValue {
    Simple(f64),
    Macd {
        line: f64,
        signal: f64,
        histogram: f64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndicatorType {
    Ema(usize),
    Rsi(usize),
    Atr(usize),
    Macd {
        fast: usize,
        slow: usize,
        signal: usize,
    },
}

#[derive(Debug, Clone)]
pub struct IndicatorSeries {
    pub indicator_type: IndicatorType,
    pub values: Vec<IndicatorPoint>,
}

impl IndicatorSeries {
    /// Value of a single-valued indicator at `index`, `None` during warm-up.
    pub fn simple_at(&self, index: usize) -> Option<f64> {
        let point = self.values.get(index)?;
        match point.value {
            IndicatorValue::Simple(v) if point.valid && v.is_finite() => Some(v),
            _ => None,
        }
    }

    /// MACD line and signal line at `index`, `None` during warm-up.
    pub fn macd_at(&self, index: usize) -> Option<(f64, f64)> {
        let point = self.values.get(index)?;
        match point.value {
            IndicatorValue::Macd { line, signal, .. } if point.valid => Some((line, signal)),
            _ => None,
        }
    }
}

impl fmt::Display for IndicatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndicatorType::Ema(period) => write!(f, "EMA({})", period),
            IndicatorType::Rsi(period) => write!(f, "RSI({})", period),
            IndicatorType::Atr(period) => write!(f, "ATR({})", period),
            IndicatorType::Macd { fast, slow, signal } => {
                write!(f, "MACD({},{},{})", fast, slow, signal)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    #[test]
    fn indicator_type_display() {
        assert_eq!(IndicatorType::Ema(20).to_string(), "EMA(20)");
        assert_eq!(IndicatorType::Atr(14).to_string(), "ATR(14)");
        let macd = IndicatorType::Macd {
            fast: 12,
            slow: 26,
            signal: 9,
        };
        assert_eq!(macd.to_string(), "MACD(12,26,9)");
    }

    #[test]
    fn simple_at_hides_invalid_points() {
        let series = IndicatorSeries {
            indicator_type: IndicatorType::Rsi(14),
            values: vec![
                IndicatorPoint {
                    timestamp: ts(),
                    valid: false,
                    value: IndicatorValue::Simple(0.0),
                },
                IndicatorPoint {
                    timestamp: ts(),
                    valid: true,
                    value: IndicatorValue::Simple(55.0),
                },
            ],
        };
        assert_eq!(series.simple_at(0), None);
        assert_eq!(series.simple_at(1), Some(55.0));
        assert_eq!(series.simple_at(2), None);
        assert_eq!(series.macd_at(1), None);
    }

    #[test]
    fn simple_at_rejects_nan() {
        let series = IndicatorSeries {
            indicator_type: IndicatorType::Ema(3),
            values: vec![IndicatorPoint {
                timestamp: ts(),
                valid: true,
                value: IndicatorValue::Simple(f64::NAN),
            }],
        };
        assert_eq!(series.simple_at(0), None);
    }
}
