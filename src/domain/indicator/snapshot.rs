//! Indicator pipeline: bar series → one [`IndicatorSnapshot`] per bar.

use chrono::NaiveDateTime;

use crate::domain::error::IndicatorError;
use crate::domain::indicator::{calculate_atr, calculate_ema, calculate_macd, calculate_rsi};
use crate::domain::ohlcv::Bar;

#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorSettings {
    pub ema_short: usize,
    pub ema_long: usize,
    /// Long trend EMA (typically 200). `None` disables it.
    pub ema_trend: Option<usize>,
    pub rsi_period: usize,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    pub atr_period: usize,
}

impl Default for IndicatorSettings {
    fn default() -> Self {
        IndicatorSettings {
            ema_short: 9,
            ema_long: 21,
            ema_trend: None,
            rsi_period: 14,
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
            atr_period: 14,
        }
    }
}

impl IndicatorSettings {
    pub fn validate(&self) -> Result<(), IndicatorError> {
        let periods = [
            ("ema_short", self.ema_short),
            ("ema_long", self.ema_long),
            ("ema_trend", self.ema_trend.unwrap_or(1)),
            ("rsi_period", self.rsi_period),
            ("macd_fast", self.macd_fast),
            ("macd_slow", self.macd_slow),
            ("macd_signal", self.macd_signal),
            ("atr_period", self.atr_period),
        ];
        for (name, period) in periods {
            if period == 0 {
                return Err(IndicatorError::InvalidPeriod { name, period });
            }
        }
        Ok(())
    }

    /// Bars needed for every indicator on the latest *and* the previous row to
    /// be defined.
    pub fn min_bars(&self) -> usize {
        let longest = [
            self.ema_short,
            self.ema_long,
            self.ema_trend.unwrap_or(0),
            self.rsi_period + 1,
            self.macd_fast.max(self.macd_slow) + self.macd_signal - 1,
            self.atr_period,
        ]
        .into_iter()
        .max()
        .unwrap_or(0);
        longest + 1
    }
}

/// Derived values for a single bar. `None` marks a value whose window has not
/// filled yet.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorSnapshot {
    pub timestamp: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: i64,
    pub ema_short: Option<f64>,
    pub ema_long: Option<f64>,
    pub ema_trend: Option<f64>,
    pub rsi: Option<f64>,
    pub macd: Option<f64>,
    pub macd_signal: Option<f64>,
    pub atr: Option<f64>,
}

/// Compute the snapshot series for `bars`.
///
/// Fails when the series is empty or shorter than [`IndicatorSettings::min_bars`];
/// the caller skips the instrument for this cycle.
pub fn compute_snapshots(
    bars: &[Bar],
    settings: &IndicatorSettings,
) -> Result<Vec<IndicatorSnapshot>, IndicatorError> {
    settings.validate()?;
    if bars.is_empty() {
        return Err(IndicatorError::EmptySeries);
    }
    let minimum = settings.min_bars();
    if bars.len() < minimum {
        return Err(IndicatorError::InsufficientData {
            bars: bars.len(),
            minimum,
        });
    }

    let ema_short = calculate_ema(bars, settings.ema_short);
    let ema_long = calculate_ema(bars, settings.ema_long);
    let ema_trend = settings.ema_trend.map(|p| calculate_ema(bars, p));
    let rsi = calculate_rsi(bars, settings.rsi_period);
    let macd = calculate_macd(
        bars,
        settings.macd_fast,
        settings.macd_slow,
        settings.macd_signal,
    );
    let atr = calculate_atr(bars, settings.atr_period);

    let snapshots = bars
        .iter()
        .enumerate()
        .map(|(i, bar)| {
            let macd_pair = macd.macd_at(i);
            IndicatorSnapshot {
                timestamp: bar.timestamp,
                open: bar.open,
                high: bar.high,
                low: bar.low,
                close: bar.close,
                volume: bar.volume,
                ema_short: ema_short.simple_at(i),
                ema_long: ema_long.simple_at(i),
                ema_trend: ema_trend.as_ref().and_then(|s| s.simple_at(i)),
                rsi: rsi.simple_at(i),
                macd: macd_pair.map(|(line, _)| line),
                macd_signal: macd_pair.map(|(_, signal)| signal),
                atr: atr.simple_at(i),
            }
        })
        .collect();

    Ok(snapshots)
}
