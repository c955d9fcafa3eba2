//! Exponential Moving Average indicator.
//!
//! k = 2/(n+1), seeded with the first source value and no adjustment
//! correction: EMA[0] = C[0], EMA[i] = C[i]*k + EMA[i-1]*(1-k).
//! Values exist from the first bar; points are flagged valid from index n-1.

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};
use crate::domain::ohlcv::Bar;

/// Raw EMA of an arbitrary source series. Empty when `period == 0`.
pub fn ema_values(source: &[f64], period: usize) -> Vec<f64> {
    if period == 0 {
        return Vec::new();
    }

    let k = 2.0 / (period as f64 + 1.0);
    let mut values = Vec::with_capacity(source.len());
    let mut ema = 0.0;

    for (i, &x) in source.iter().enumerate() {
        ema = if i == 0 { x } else { x * k + ema * (1.0 - k) };
        values.push(ema);
    }

    values
}

pub fn calculate_ema(bars: &[Bar], period: usize) -> IndicatorSeries {
    if period == 0 || bars.is_empty() {
        return IndicatorSeries {
            indicator_type: IndicatorType::Ema(period),
            values: Vec::new(),
        };
    }

    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let values = ema_values(&closes, period)
        .into_iter()
        .zip(bars)
        .enumerate()
        .map(|(i, (ema, bar))| IndicatorPoint {
            timestamp: bar.timestamp,
            valid: i + 1 >= period,
            value: IndicatorValue::Simple(ema),
        })
        .collect();

    IndicatorSeries {
        indicator_type: IndicatorType::Ema(period),
        values,
    }
}
