//! Rule evaluation over a `(current, previous)` snapshot pair.
//!
//! # Evaluation Semantics
//!
//! - Comparison rules: evaluated on the current row only
//! - `CROSS_ABOVE`/`CROSS_BELOW`: strict comparison now, opposite-or-equal on the
//!   previous row; `false` when there is no previous row
//! - Any undefined operand (indicator still warming up) makes the comparison `false`
//! - `AND`: Short-circuits on first `false`
//! - `OR`: Short-circuits on first `true`

use crate::domain::indicator::IndicatorSnapshot;
use crate::domain::rule::{IndicatorField, Operand, Rule};

pub fn evaluate(
    rule: &Rule,
    current: &IndicatorSnapshot,
    previous: Option<&IndicatorSnapshot>,
) -> bool {
    match rule {
        Rule::CrossAbove { left, right } => {
            let Some(prev) = previous else {
                return false;
            };
            match (
                resolve_operand(left, current),
                resolve_operand(right, current),
                resolve_operand(left, prev),
                resolve_operand(right, prev),
            ) {
                (Some(lc), Some(rc), Some(lp), Some(rp)) => lc > rc && lp <= rp,
                _ => false,
            }
        }
        Rule::CrossBelow { left, right } => {
            let Some(prev) = previous else {
                return false;
            };
            match (
                resolve_operand(left, current),
                resolve_operand(right, current),
                resolve_operand(left, prev),
                resolve_operand(right, prev),
            ) {
                (Some(lc), Some(rc), Some(lp), Some(rp)) => lc < rc && lp >= rp,
                _ => false,
            }
        }
        Rule::Above { left, right } => compare(left, right, current, |l, r| l > r),
        Rule::Below { left, right } => compare(left, right, current, |l, r| l < r),
        Rule::AtLeast { left, right } => compare(left, right, current, |l, r| l >= r),
        Rule::Between {
            operand,
            lower,
            upper,
        } => resolve_operand(operand, current).is_some_and(|v| v >= *lower && v <= *upper),
        Rule::And(rules) => rules.iter().all(|r| evaluate(r, current, previous)),
        Rule::Or(rules) => rules.iter().any(|r| evaluate(r, current, previous)),
        Rule::Not(rule) => !evaluate(rule, current, previous),
    }
}

fn compare(
    left: &Operand,
    right: &Operand,
    snapshot: &IndicatorSnapshot,
    op: impl Fn(f64, f64) -> bool,
) -> bool {
    match (
        resolve_operand(left, snapshot),
        resolve_operand(right, snapshot),
    ) {
        (Some(l), Some(r)) => op(l, r),
        _ => false,
    }
}

fn resolve_operand(operand: &Operand, snapshot: &IndicatorSnapshot) -> Option<f64> {
    let value = match operand {
        Operand::Open => Some(snapshot.open),
        Operand::High => Some(snapshot.high),
        Operand::Low => Some(snapshot.low),
        Operand::Close => Some(snapshot.close),
        Operand::Volume => Some(snapshot.volume as f64),
        Operand::Constant(v) => Some(*v),
        Operand::Indicator(field) => resolve_indicator(*field, snapshot),
    };
    value.filter(|v| v.is_finite())
}

fn resolve_indicator(field: IndicatorField, snapshot: &IndicatorSnapshot) -> Option<f64> {
    match field {
        IndicatorField::EmaShort => snapshot.ema_short,
        IndicatorField::EmaLong => snapshot.ema_long,
        IndicatorField::EmaTrend => snapshot.ema_trend,
        IndicatorField::Rsi => snapshot.rsi,
        IndicatorField::MacdLine => snapshot.macd,
        IndicatorField::MacdSignal => snapshot.macd_signal,
        IndicatorField::Atr => snapshot.atr,
    }
}
