//! Typed engine configuration built from a [`ConfigPort`].

use chrono::NaiveDate;
use std::collections::HashSet;
use std::str::FromStr;

use crate::domain::classifier::Classifier;
use crate::domain::config_validation::{
    bool_value, choice_value, double_value, int_value, validate_engine_config,
};
use crate::domain::confirmation::ConfirmationMode;
use crate::domain::error::EngineError;
use crate::domain::indicator::IndicatorSettings;
use crate::domain::order::OptionsTerms;
use crate::domain::risk::{ExitMode, RiskBasis};
use crate::domain::rule::{RuleSet, RuleSetKind, SignalRule, Thresholds};
use crate::domain::rule_parser;
use crate::domain::signal::Signal;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::PeriodUnit;

pub const DEFAULT_LOOKBACK: usize = 250;
pub const DEFAULT_QUANTITY: u32 = 100;
pub const DEFAULT_INTERVAL_SECS: u64 = 60;

/// Rule keys in the `[signals]` section for a custom rule set, in priority order.
pub const CUSTOM_RULE_KEYS: [(&str, Signal); 4] = [
    ("buy", Signal::Buy),
    ("sell", Signal::Sell),
    ("buy_call", Signal::BuyCall),
    ("buy_put", Signal::BuyPut),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RiskMethod {
    #[default]
    Atr,
    Percent,
}

impl FromStr for RiskMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "atr" => Ok(RiskMethod::Atr),
            "percent" | "pct" => Ok(RiskMethod::Percent),
            other => Err(format!(
                "unknown risk method '{}' (expected atr or percent)",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RiskSettings {
    pub method: RiskMethod,
    pub atr_multiplier: f64,
    pub stop_pct: f64,
    pub risk_reward_ratio: f64,
    pub exit_mode: ExitMode,
    pub trail_pct: f64,
    /// Also flatten when the close breaks the prior bars' swing low (high for shorts).
    pub swing_exit: bool,
}

impl Default for RiskSettings {
    fn default() -> Self {
        RiskSettings {
            method: RiskMethod::Atr,
            atr_multiplier: 1.5,
            stop_pct: 0.10,
            risk_reward_ratio: 2.0,
            exit_mode: ExitMode::Bracket,
            trail_pct: 0.05,
            swing_exit: false,
        }
    }
}

impl RiskSettings {
    pub fn basis(&self, atr: Option<f64>) -> RiskBasis {
        match self.method {
            RiskMethod::Atr => RiskBasis::Atr {
                atr,
                multiplier: self.atr_multiplier,
            },
            RiskMethod::Percent => RiskBasis::Percent { pct: self.stop_pct },
        }
    }

    /// Trailing distance applied to new levels, if any.
    pub fn trailing(&self) -> Option<f64> {
        (self.exit_mode == ExitMode::Trailing).then_some(self.trail_pct)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub instruments: Vec<String>,
    /// Bars requested per instrument per cycle.
    pub lookback: usize,
    pub period_unit: PeriodUnit,
    /// Evaluation interval for the external scheduler.
    pub interval_secs: u64,
    pub quantity: u32,
    pub require_confirmation: bool,
    pub confirmation_mode: ConfirmationMode,
    pub indicators: IndicatorSettings,
    pub classifier: Classifier,
    pub risk: RiskSettings,
    pub options: OptionsTerms,
}

impl EngineConfig {
    /// Defaults everywhere: EMA crossover, ATR sizing, bracket exits.
    pub fn new(instruments: Vec<String>) -> Self {
        EngineConfig {
            instruments,
            lookback: DEFAULT_LOOKBACK,
            period_unit: PeriodUnit::Day,
            interval_secs: DEFAULT_INTERVAL_SECS,
            quantity: DEFAULT_QUANTITY,
            require_confirmation: false,
            confirmation_mode: ConfirmationMode::SignalPersists,
            indicators: IndicatorSettings::default(),
            classifier: Classifier::new(RuleSet::ema_crossover(), 0),
            risk: RiskSettings::default(),
            options: OptionsTerms::default(),
        }
    }
}

/// Parse a comma-separated instrument list: trimmed, upper-cased, no empties,
/// no duplicates.
pub fn parse_instruments(input: &str) -> Result<Vec<String>, EngineError> {
    let mut instruments = Vec::new();
    let mut seen = HashSet::new();

    for token in input.split(',') {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return Err(EngineError::invalid(
                "engine",
                "instruments",
                "empty instrument in list",
            ));
        }
        let symbol = trimmed.to_uppercase();
        if !seen.insert(symbol.clone()) {
            return Err(EngineError::invalid(
                "engine",
                "instruments",
                format!("duplicate instrument {}", symbol),
            ));
        }
        instruments.push(symbol);
    }

    Ok(instruments)
}

pub(crate) fn read_thresholds(config: &dyn ConfigPort) -> Result<Thresholds, EngineError> {
    let defaults = Thresholds::default();
    Ok(Thresholds {
        rsi_oversold: double_value(config, "signals", "rsi_oversold", defaults.rsi_oversold)?,
        rsi_overbought: double_value(
            config,
            "signals",
            "rsi_overbought",
            defaults.rsi_overbought,
        )?,
    })
}

/// Build the rule-set table selected by `[signals] rule_set`.
pub fn build_rule_set(config: &dyn ConfigPort) -> Result<RuleSet, EngineError> {
    let kind = choice_value(config, "signals", "rule_set", RuleSetKind::EmaCrossover)?;
    let thresholds = read_thresholds(config)?;

    match kind {
        RuleSetKind::EmaCrossover => Ok(RuleSet::ema_crossover()),
        RuleSetKind::MomentumConfluence => Ok(RuleSet::momentum_confluence(&thresholds)),
        RuleSetKind::OptionsTrend => Ok(RuleSet::options_trend(&thresholds)),
        RuleSetKind::Custom => {
            let mut entries = Vec::new();
            for (key, signal) in CUSTOM_RULE_KEYS {
                let Some(text) = config.get_string("signals", key) else {
                    continue;
                };
                if text.trim().is_empty() {
                    continue;
                }
                let rule = rule_parser::parse(text.trim())?;
                entries.push(SignalRule { signal, rule });
            }
            if entries.is_empty() {
                return Err(EngineError::missing("signals", "buy"));
            }
            Ok(RuleSet::custom(entries))
        }
    }
}

pub(crate) fn read_indicators(config: &dyn ConfigPort) -> Result<IndicatorSettings, EngineError> {
    let d = IndicatorSettings::default();
    let period = |key: &str, default: usize| -> Result<usize, EngineError> {
        Ok(int_value(config, "indicators", key, default as i64)?.max(0) as usize)
    };
    let trend = period("ema_trend", 0)?;
    Ok(IndicatorSettings {
        ema_short: period("ema_short", d.ema_short)?,
        ema_long: period("ema_long", d.ema_long)?,
        ema_trend: (trend > 0).then_some(trend),
        rsi_period: period("rsi_period", d.rsi_period)?,
        macd_fast: period("macd_fast", d.macd_fast)?,
        macd_slow: period("macd_slow", d.macd_slow)?,
        macd_signal: period("macd_signal", d.macd_signal)?,
        atr_period: period("atr_period", d.atr_period)?,
    })
}

fn read_risk(config: &dyn ConfigPort) -> Result<RiskSettings, EngineError> {
    let d = RiskSettings::default();
    Ok(RiskSettings {
        method: choice_value(config, "risk", "method", d.method)?,
        atr_multiplier: double_value(config, "risk", "atr_multiplier", d.atr_multiplier)?,
        stop_pct: double_value(config, "risk", "stop_pct", d.stop_pct)?,
        risk_reward_ratio: double_value(config, "risk", "risk_reward_ratio", d.risk_reward_ratio)?,
        exit_mode: choice_value(config, "risk", "exit_mode", d.exit_mode)?,
        trail_pct: double_value(config, "risk", "trail_pct", d.trail_pct)?,
        swing_exit: bool_value(config, "risk", "swing_exit", d.swing_exit)?,
    })
}

pub(crate) fn read_expiry(config: &dyn ConfigPort) -> Result<Option<NaiveDate>, EngineError> {
    match config.get_string("options", "expiry") {
        None => Ok(None),
        Some(s) if s.trim().is_empty() => Ok(None),
        Some(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
            .map(Some)
            .map_err(|_| {
                EngineError::invalid("options", "expiry", "invalid expiry format, expected YYYY-MM-DD")
            }),
    }
}

/// Validate every section, then assemble the typed configuration.
pub fn build_engine_config(config: &dyn ConfigPort) -> Result<EngineConfig, EngineError> {
    validate_engine_config(config)?;

    let instruments = match config.get_string("engine", "instruments") {
        Some(list) => parse_instruments(&list)?,
        None => return Err(EngineError::missing("engine", "instruments")),
    };

    let rules = build_rule_set(config)?;
    let minimum_volume = int_value(config, "signals", "minimum_volume", 0)?;

    Ok(EngineConfig {
        instruments,
        lookback: int_value(config, "engine", "lookback", DEFAULT_LOOKBACK as i64)? as usize,
        period_unit: choice_value(config, "engine", "period_unit", PeriodUnit::Day)?,
        interval_secs: int_value(
            config,
            "engine",
            "interval_secs",
            DEFAULT_INTERVAL_SECS as i64,
        )? as u64,
        quantity: int_value(config, "engine", "quantity", DEFAULT_QUANTITY as i64)? as u32,
        require_confirmation: bool_value(config, "engine", "require_confirmation", false)?,
        confirmation_mode: choice_value(
            config,
            "engine",
            "confirmation_mode",
            ConfirmationMode::SignalPersists,
        )?,
        indicators: read_indicators(config)?,
        classifier: Classifier::new(rules, minimum_volume),
        risk: read_risk(config)?,
        options: OptionsTerms {
            strike_offset: double_value(config, "options", "strike_offset", 1.0)?,
            expiry: read_expiry(config)?,
        },
    })
}
