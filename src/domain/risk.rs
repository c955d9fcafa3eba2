//! Stop-loss / take-profit sizing and the per-position exit check.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::error::RiskError;
use crate::domain::ohlcv::Bar;
use crate::domain::order::{OptionType, OrderIntent, OrderSide};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Long,
    Short,
}

/// How the stop distance is derived.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RiskBasis {
    /// `multiplier × ATR`. `atr` is `None` while the ATR window is filling.
    Atr { atr: Option<f64>, multiplier: f64 },
    /// Fixed fraction of the entry price.
    Percent { pct: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    StopLoss,
    TakeProfit,
    TrailingStop,
    /// Close broke the range of the bars before it.
    SwingBreak,
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExitReason::StopLoss => "stop_loss",
            ExitReason::TakeProfit => "take_profit",
            ExitReason::TrailingStop => "trailing_stop",
            ExitReason::SwingBreak => "swing_break",
        };
        f.write_str(s)
    }
}

/// Who closes a stock position once it is open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExitMode {
    /// Broker-side bracket legs; the engine re-check is a fallback.
    #[default]
    Bracket,
    /// Plain market entry; the engine flattens on stop or target.
    Fixed,
    /// Plain market entry; the engine ratchets the stop from the best close.
    Trailing,
}

impl std::str::FromStr for ExitMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "bracket" => Ok(ExitMode::Bracket),
            "fixed" => Ok(ExitMode::Fixed),
            "trailing" => Ok(ExitMode::Trailing),
            other => Err(format!(
                "unknown exit mode '{}' (expected bracket, fixed or trailing)",
                other
            )),
        }
    }
}

/// Lowest low and highest high of the bars preceding the latest one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SwingRange {
    pub low: f64,
    pub high: f64,
}

impl SwingRange {
    /// `None` with fewer than two bars.
    pub fn prior_to_latest(bars: &[Bar]) -> Option<SwingRange> {
        let (_, prior) = bars.split_last()?;
        let first = prior.first()?;
        let init = SwingRange {
            low: first.low,
            high: first.high,
        };
        Some(prior.iter().fold(init, |range, bar| SwingRange {
            low: range.low.min(bar.low),
            high: range.high.max(bar.high),
        }))
    }

    /// A long breaks below the swing low, a short above the swing high.
    pub fn is_broken(&self, direction: Direction, price: f64) -> bool {
        match direction {
            Direction::Long => price < self.low,
            Direction::Short => price > self.high,
        }
    }
}

/// Protective levels for one open engine-managed position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskLevels {
    pub direction: Direction,
    pub entry_price: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    /// Best close seen since entry (highest for long, lowest for short).
    pub extreme: f64,
    /// Trailing distance as a fraction of `extreme`. `None` keeps the stop fixed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trail_pct: Option<f64>,
}

/// Compute stop and target for an entry. Values are not rounded here; rounding
/// happens once when the order is built.
pub fn compute_levels(
    entry: f64,
    direction: Direction,
    basis: RiskBasis,
    risk_reward_ratio: f64,
) -> Result<RiskLevels, RiskError> {
    if !entry.is_finite() || entry <= 0.0 {
        return Err(RiskError::InvalidEntry { price: entry });
    }
    if !risk_reward_ratio.is_finite() || risk_reward_ratio <= 0.0 {
        return Err(RiskError::InvalidRatio {
            ratio: risk_reward_ratio,
        });
    }

    let distance = match basis {
        RiskBasis::Atr { atr, multiplier } => {
            let atr = atr
                .filter(|a| a.is_finite() && *a > 0.0)
                .ok_or(RiskError::UndefinedAtr)?;
            atr * multiplier
        }
        RiskBasis::Percent { pct } => {
            if !(pct > 0.0 && pct < 1.0) {
                return Err(RiskError::InvalidPercent { pct });
            }
            entry * pct
        }
    };
    if !distance.is_finite() || distance <= 0.0 {
        return Err(RiskError::UndefinedAtr);
    }

    let (stop_loss, take_profit) = match direction {
        Direction::Long => (entry - distance, entry + distance * risk_reward_ratio),
        Direction::Short => (entry + distance, entry - distance * risk_reward_ratio),
    };

    Ok(RiskLevels {
        direction,
        entry_price: entry,
        stop_loss,
        take_profit,
        extreme: entry,
        trail_pct: None,
    })
}

impl RiskLevels {
    pub fn with_trailing(mut self, trail_pct: f64) -> Self {
        self.trail_pct = Some(trail_pct);
        self
    }

    /// Rebuild levels from a submitted intent. `None` when the intent carries
    /// no protective legs.
    pub fn from_intent(intent: &OrderIntent) -> Option<RiskLevels> {
        let direction = match (intent.option_type, intent.side) {
            (Some(OptionType::Call), _) => Direction::Long,
            (Some(OptionType::Put), _) => Direction::Short,
            (None, OrderSide::Buy) => Direction::Long,
            (None, OrderSide::Sell) => Direction::Short,
        };
        Some(RiskLevels {
            direction,
            entry_price: intent.entry_price,
            stop_loss: intent.stop_loss?,
            take_profit: intent.take_profit?,
            extreme: intent.entry_price,
            trail_pct: None,
        })
    }

    pub fn is_long(&self) -> bool {
        self.direction == Direction::Long
    }

    /// Feed the latest close. With trailing enabled the stop follows the best
    /// close since entry and never loosens.
    pub fn observe(&mut self, price: f64) {
        let Some(pct) = self.trail_pct else {
            return;
        };
        if !price.is_finite() {
            return;
        }
        match self.direction {
            Direction::Long => {
                if price > self.extreme {
                    self.extreme = price;
                }
                let candidate = self.extreme * (1.0 - pct);
                if candidate > self.stop_loss {
                    self.stop_loss = candidate;
                }
            }
            Direction::Short => {
                if price < self.extreme {
                    self.extreme = price;
                }
                let candidate = self.extreme * (1.0 + pct);
                if candidate < self.stop_loss {
                    self.stop_loss = candidate;
                }
            }
        }
    }

    pub fn should_stop_loss(&self, price: f64) -> bool {
        if self.is_long() {
            price <= self.stop_loss
        } else {
            price >= self.stop_loss
        }
    }

    pub fn should_take_profit(&self, price: f64) -> bool {
        if self.is_long() {
            price >= self.take_profit
        } else {
            price <= self.take_profit
        }
    }

    /// Which level, if any, `price` has crossed. Stop wins when both apply.
    pub fn exit_trigger(&self, price: f64) -> Option<ExitReason> {
        if self.should_stop_loss(price) {
            if self.trail_pct.is_some() {
                Some(ExitReason::TrailingStop)
            } else {
                Some(ExitReason::StopLoss)
            }
        } else if self.should_take_profit(price) {
            Some(ExitReason::TakeProfit)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn atr(value: f64) -> RiskBasis {
        RiskBasis::Atr {
            atr: Some(value),
            multiplier: 1.5,
        }
    }

    #[test]
    fn atr_long_known_values() {
        let levels = compute_levels(100.0, Direction::Long, atr(2.0), 2.0).unwrap();
        assert_relative_eq!(levels.stop_loss, 97.0);
        assert_relative_eq!(levels.take_profit, 106.0);
        assert_eq!(levels.extreme, 100.0);
    }

    #[test]
    fn atr_short_inverts() {
        let levels = compute_levels(100.0, Direction::Short, atr(2.0), 2.0).unwrap();
        assert_relative_eq!(levels.stop_loss, 103.0);
        assert_relative_eq!(levels.take_profit, 94.0);
    }

    #[test]
    fn percent_basis() {
        let basis = RiskBasis::Percent { pct: 0.1 };
        let long = compute_levels(50.0, Direction::Long, basis, 2.0).unwrap();
        assert_relative_eq!(long.stop_loss, 45.0);
        assert_relative_eq!(long.take_profit, 60.0);

        let short = compute_levels(50.0, Direction::Short, basis, 2.0).unwrap();
        assert_relative_eq!(short.stop_loss, 55.0);
        assert_relative_eq!(short.take_profit, 40.0);
    }

    #[test]
    fn undefined_atr_fails_closed() {
        let basis = RiskBasis::Atr {
            atr: None,
            multiplier: 1.5,
        };
        assert_eq!(
            compute_levels(100.0, Direction::Long, basis, 2.0).unwrap_err(),
            RiskError::UndefinedAtr
        );
        assert_eq!(
            compute_levels(100.0, Direction::Long, atr(0.0), 2.0).unwrap_err(),
            RiskError::UndefinedAtr
        );
        assert_eq!(
            compute_levels(100.0, Direction::Long, atr(f64::NAN), 2.0).unwrap_err(),
            RiskError::UndefinedAtr
        );
    }

    #[test]
    fn invalid_inputs() {
        assert!(matches!(
            compute_levels(0.0, Direction::Long, atr(1.0), 2.0),
            Err(RiskError::InvalidEntry { .. })
        ));
        assert!(matches!(
            compute_levels(100.0, Direction::Long, atr(1.0), 0.0),
            Err(RiskError::InvalidRatio { .. })
        ));
        assert!(matches!(
            compute_levels(100.0, Direction::Long, RiskBasis::Percent { pct: 1.0 }, 2.0),
            Err(RiskError::InvalidPercent { .. })
        ));
    }

    #[test]
    fn exit_trigger_long() {
        let levels = compute_levels(100.0, Direction::Long, atr(2.0), 2.0).unwrap();
        assert_eq!(levels.exit_trigger(100.0), None);
        assert_eq!(levels.exit_trigger(97.0), Some(ExitReason::StopLoss));
        assert_eq!(levels.exit_trigger(106.5), Some(ExitReason::TakeProfit));
    }

    #[test]
    fn exit_trigger_short() {
        let levels = compute_levels(100.0, Direction::Short, atr(2.0), 2.0).unwrap();
        assert_eq!(levels.exit_trigger(103.0), Some(ExitReason::StopLoss));
        assert_eq!(levels.exit_trigger(94.0), Some(ExitReason::TakeProfit));
        assert_eq!(levels.exit_trigger(99.0), None);
    }

    #[test]
    fn trailing_long_ratchets_and_never_loosens() {
        let mut levels = compute_levels(100.0, Direction::Long, atr(2.0), 10.0)
            .unwrap()
            .with_trailing(0.05);
        levels.observe(110.0);
        assert_relative_eq!(levels.extreme, 110.0);
        assert_relative_eq!(levels.stop_loss, 104.5);

        levels.observe(105.0);
        assert_relative_eq!(levels.stop_loss, 104.5);
        assert_eq!(levels.exit_trigger(104.0), Some(ExitReason::TrailingStop));
    }

    #[test]
    fn trailing_short_ratchets_down() {
        let mut levels = compute_levels(100.0, Direction::Short, atr(2.0), 10.0)
            .unwrap()
            .with_trailing(0.05);
        levels.observe(90.0);
        assert_relative_eq!(levels.stop_loss, 94.5);
        levels.observe(95.0);
        assert_relative_eq!(levels.stop_loss, 94.5);
        assert_eq!(levels.exit_trigger(95.0), Some(ExitReason::TrailingStop));
    }

    #[test]
    fn observe_without_trailing_is_noop() {
        let mut levels = compute_levels(100.0, Direction::Long, atr(2.0), 2.0).unwrap();
        let before = levels.clone();
        levels.observe(120.0);
        assert_eq!(levels, before);
    }

    fn range_bar(low: f64, high: f64) -> Bar {
        Bar {
            timestamp: chrono::NaiveDate::from_ymd_opt(2024, 3, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
            open: low,
            high,
            low,
            close: high,
            volume: 100,
        }
    }

    #[test]
    fn swing_range_ignores_latest_bar() {
        let bars = vec![
            range_bar(95.0, 101.0),
            range_bar(92.0, 104.0),
            range_bar(80.0, 120.0),
        ];
        let range = SwingRange::prior_to_latest(&bars).unwrap();
        assert_relative_eq!(range.low, 92.0);
        assert_relative_eq!(range.high, 104.0);

        assert!(range.is_broken(Direction::Long, 91.9));
        assert!(!range.is_broken(Direction::Long, 92.0));
        assert!(range.is_broken(Direction::Short, 104.5));
        assert!(!range.is_broken(Direction::Short, 103.0));
    }

    #[test]
    fn swing_range_needs_two_bars() {
        assert_eq!(SwingRange::prior_to_latest(&[]), None);
        assert_eq!(SwingRange::prior_to_latest(&[range_bar(1.0, 2.0)]), None);
    }

    #[test]
    fn serde_round_trip() {
        let levels = compute_levels(100.0, Direction::Long, atr(2.0), 2.0)
            .unwrap()
            .with_trailing(0.03);
        let json = serde_json::to_string(&levels).unwrap();
        let back: RiskLevels = serde_json::from_str(&json).unwrap();
        assert_eq!(back, levels);
    }
}
