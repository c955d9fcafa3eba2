//! Signal classifier: one rule-set table, evaluated over the latest two snapshots.

use crate::domain::indicator::IndicatorSnapshot;
use crate::domain::rule::RuleSet;
use crate::domain::rule_eval::evaluate;
use crate::domain::signal::Signal;

#[derive(Debug, Clone, PartialEq)]
pub struct Classifier {
    pub rules: RuleSet,
    /// Signals on bars with less volume are suppressed. `0` disables the gate.
    pub minimum_volume: i64,
}

impl Classifier {
    pub fn new(rules: RuleSet, minimum_volume: i64) -> Self {
        Classifier {
            rules,
            minimum_volume,
        }
    }

    /// First matching entry wins. Pure: the same pair always yields the same signal.
    pub fn classify(
        &self,
        current: &IndicatorSnapshot,
        previous: Option<&IndicatorSnapshot>,
    ) -> Signal {
        let signal = self
            .rules
            .entries
            .iter()
            .find(|entry| evaluate(&entry.rule, current, previous))
            .map(|entry| entry.signal)
            .unwrap_or(Signal::None);

        if signal != Signal::None && self.minimum_volume > 0 && current.volume < self.minimum_volume
        {
            return Signal::None;
        }
        signal
    }

    /// Classify the last row of a snapshot series.
    pub fn classify_latest(&self, snapshots: &[IndicatorSnapshot]) -> Signal {
        match snapshots {
            [] => Signal::None,
            [only] => self.classify(only, None),
            [.., previous, current] => self.classify(current, Some(previous)),
        }
    }
}
