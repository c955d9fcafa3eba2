//! Per-instrument confirmation state machine.
//!
//! Buy-type signals must survive one extra cycle before they are acted on.
//! SELL is never gated.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::domain::ohlcv::Bar;
use crate::domain::risk::Direction;
use crate::domain::signal::Signal;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", content = "signal", rename_all = "lowercase")]
pub enum ConfirmationState {
    #[default]
    Idle,
    Armed(Signal),
}

/// What counts as confirmation on the cycle after arming.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConfirmationMode {
    /// The same buy-type signal is classified again.
    #[default]
    SignalPersists,
    /// The latest candle closed in the armed signal's direction.
    CandleDirection,
}

impl FromStr for ConfirmationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "signal_persists" => Ok(ConfirmationMode::SignalPersists),
            "candle_direction" => Ok(ConfirmationMode::CandleDirection),
            other => Err(format!(
                "unknown confirmation mode '{}' (expected signal_persists or candle_direction)",
                other
            )),
        }
    }
}

impl ConfirmationState {
    pub fn is_pending(&self) -> bool {
        matches!(self, ConfirmationState::Armed(_))
    }

    /// State to keep when a confirmed signal could not be dispatched. The armed
    /// signal survives only while the raw signal still matches it.
    pub fn after_failed_dispatch(self, raw: Signal) -> ConfirmationState {
        match self {
            ConfirmationState::Armed(armed) if armed == raw => self,
            _ => ConfirmationState::Idle,
        }
    }

    /// Advance one cycle. Returns the next state and the signal to act on, if any.
    pub fn step(
        self,
        raw: Signal,
        latest: &Bar,
        mode: ConfirmationMode,
        required: bool,
    ) -> (ConfirmationState, Option<Signal>) {
        if !required {
            let action = (raw != Signal::None).then_some(raw);
            return (ConfirmationState::Idle, action);
        }
        if raw == Signal::Sell {
            return (ConfirmationState::Idle, Some(Signal::Sell));
        }

        match self {
            ConfirmationState::Idle => {
                if raw.is_buy_type() {
                    (ConfirmationState::Armed(raw), None)
                } else {
                    (ConfirmationState::Idle, None)
                }
            }
            ConfirmationState::Armed(armed) => {
                let confirmed = match mode {
                    ConfirmationMode::SignalPersists => raw == armed,
                    ConfirmationMode::CandleDirection => match armed.direction() {
                        Some(Direction::Long) => latest.is_bullish(),
                        Some(Direction::Short) => latest.is_bearish(),
                        None => false,
                    },
                };
                let action = confirmed.then_some(armed);
                (ConfirmationState::Idle, action)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn bar(open: f64, close: f64) -> Bar {
        Bar {
            timestamp: NaiveDate::from_ymd_opt(2024, 1, 2)
                .unwrap()
                .and_hms_opt(9, 30, 0)
                .unwrap(),
            open,
            high: open.max(close) + 1.0,
            low: open.min(close) - 1.0,
            close,
            volume: 1000,
        }
    }

    fn run(signals: &[Signal], mode: ConfirmationMode) -> Vec<Option<Signal>> {
        let mut state = ConfirmationState::Idle;
        let flat = bar(100.0, 100.0);
        signals
            .iter()
            .map(|&raw| {
                let (next, action) = state.step(raw, &flat, mode, true);
                state = next;
                action
            })
            .collect()
    }

    #[test]
    fn buy_buy_none_acts_once() {
        let actions = run(
            &[Signal::Buy, Signal::Buy, Signal::None, Signal::Buy],
            ConfirmationMode::SignalPersists,
        );
        assert_eq!(actions, vec![None, Some(Signal::Buy), None, None]);
    }

    #[test]
    fn armed_then_different_signal_resets() {
        let mut state = ConfirmationState::Idle;
        let b = bar(100.0, 100.0);
        (state, _) = state.step(Signal::BuyCall, &b, ConfirmationMode::SignalPersists, true);
        assert_eq!(state, ConfirmationState::Armed(Signal::BuyCall));

        let (state, action) = state.step(Signal::BuyPut, &b, ConfirmationMode::SignalPersists, true);
        assert_eq!(state, ConfirmationState::Idle);
        assert_eq!(action, None);
    }

    #[test]
    fn sell_passes_through_and_disarms() {
        let b = bar(100.0, 100.0);
        let armed = ConfirmationState::Armed(Signal::Buy);
        let (state, action) = armed.step(Signal::Sell, &b, ConfirmationMode::SignalPersists, true);
        assert_eq!(state, ConfirmationState::Idle);
        assert_eq!(action, Some(Signal::Sell));
    }

    #[test]
    fn not_required_acts_immediately() {
        let b = bar(100.0, 100.0);
        let (state, action) =
            ConfirmationState::Idle.step(Signal::Buy, &b, ConfirmationMode::SignalPersists, false);
        assert_eq!(state, ConfirmationState::Idle);
        assert_eq!(action, Some(Signal::Buy));

        let (_, action) =
            ConfirmationState::Idle.step(Signal::None, &b, ConfirmationMode::SignalPersists, false);
        assert_eq!(action, None);
    }

    #[test]
    fn candle_direction_confirms_on_bullish_bar() {
        let armed = ConfirmationState::Armed(Signal::Buy);
        let (state, action) = armed.step(
            Signal::None,
            &bar(100.0, 101.0),
            ConfirmationMode::CandleDirection,
            true,
        );
        assert_eq!(state, ConfirmationState::Idle);
        assert_eq!(action, Some(Signal::Buy));

        let (_, action) = armed.step(
            Signal::Buy,
            &bar(101.0, 100.0),
            ConfirmationMode::CandleDirection,
            true,
        );
        assert_eq!(action, None);
    }

    #[test]
    fn candle_direction_put_needs_bearish_bar() {
        let armed = ConfirmationState::Armed(Signal::BuyPut);
        let (_, action) = armed.step(
            Signal::None,
            &bar(101.0, 100.0),
            ConfirmationMode::CandleDirection,
            true,
        );
        assert_eq!(action, Some(Signal::BuyPut));
    }

    #[test]
    fn failed_dispatch_keeps_only_matching_armed_signal() {
        let armed = ConfirmationState::Armed(Signal::Buy);
        assert_eq!(armed.after_failed_dispatch(Signal::Buy), armed);
        assert_eq!(
            armed.after_failed_dispatch(Signal::None),
            ConfirmationState::Idle
        );
        assert_eq!(
            armed.after_failed_dispatch(Signal::BuyCall),
            ConfirmationState::Idle
        );
        assert_eq!(
            ConfirmationState::Idle.after_failed_dispatch(Signal::Buy),
            ConfirmationState::Idle
        );
    }

    #[test]
    fn serde_shape() {
        let json = serde_json::to_string(&ConfirmationState::Armed(Signal::Buy)).unwrap();
        assert_eq!(json, r#"{"state":"armed","signal":"BUY"}"#);
        let idle: ConfirmationState = serde_json::from_str(r#"{"state":"idle"}"#).unwrap();
        assert_eq!(idle, ConfirmationState::Idle);
    }

    #[test]
    fn mode_parse() {
        assert_eq!(
            "candle_direction".parse::<ConfirmationMode>().unwrap(),
            ConfirmationMode::CandleDirection
        );
        assert!("twice".parse::<ConfirmationMode>().is_err());
    }
}
