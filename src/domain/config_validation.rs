//! Configuration validation.
//!
//! Validates every section before an engine is built. Errors carry the
//! section and key that failed.

use std::str::FromStr;

use crate::domain::config::{
    build_rule_set, parse_instruments, read_expiry, read_indicators, read_thresholds,
};
use crate::domain::error::EngineError;
use crate::domain::rule::IndicatorField;
use crate::ports::config_port::ConfigPort;

pub fn validate_engine_config(config: &dyn ConfigPort) -> Result<(), EngineError> {
    validate_engine_section(config)?;
    validate_indicator_section(config)?;
    validate_lookback(config)?;
    validate_signal_section(config)?;
    validate_risk_section(config)?;
    validate_options_section(config)?;
    Ok(())
}

fn raw_value(config: &dyn ConfigPort, section: &str, key: &str) -> Option<String> {
    config
        .get_string(section, key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub(crate) fn int_value(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: i64,
) -> Result<i64, EngineError> {
    match raw_value(config, section, key) {
        None => Ok(default),
        Some(v) => v.parse::<i64>().map_err(|_| {
            EngineError::invalid(section, key, format!("expected an integer, got '{}'", v))
        }),
    }
}

pub(crate) fn double_value(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: f64,
) -> Result<f64, EngineError> {
    match raw_value(config, section, key) {
        None => Ok(default),
        Some(v) => v
            .parse::<f64>()
            .ok()
            .filter(|x| x.is_finite())
            .ok_or_else(|| {
                EngineError::invalid(section, key, format!("expected a number, got '{}'", v))
            }),
    }
}

pub(crate) fn bool_value(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: bool,
) -> Result<bool, EngineError> {
    match raw_value(config, section, key) {
        None => Ok(default),
        Some(v) => match v.to_lowercase().as_str() {
            "true" | "yes" | "1" => Ok(true),
            "false" | "no" | "0" => Ok(false),
            _ => Err(EngineError::invalid(
                section,
                key,
                format!("expected true or false, got '{}'", v),
            )),
        },
    }
}

pub(crate) fn choice_value<T>(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: T,
) -> Result<T, EngineError>
where
    T: FromStr<Err = String>,
{
    match raw_value(config, section, key) {
        None => Ok(default),
        Some(v) => v
            .parse::<T>()
            .map_err(|reason| EngineError::invalid(section, key, reason)),
    }
}

fn require_min(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: i64,
    min: i64,
) -> Result<i64, EngineError> {
    let value = int_value(config, section, key, default)?;
    if value < min {
        return Err(EngineError::invalid(
            section,
            key,
            format!("{} must be at least {}", key, min),
        ));
    }
    Ok(value)
}

fn validate_engine_section(config: &dyn ConfigPort) -> Result<(), EngineError> {
    match raw_value(config, "engine", "instruments") {
        Some(list) => {
            parse_instruments(&list)?;
        }
        None => return Err(EngineError::missing("engine", "instruments")),
    }

    require_min(config, "engine", "lookback", 1, 1)?;
    require_min(config, "engine", "interval_secs", 1, 1)?;
    let quantity = require_min(config, "engine", "quantity", 1, 1)?;
    if quantity > i64::from(u32::MAX) {
        return Err(EngineError::invalid(
            "engine",
            "quantity",
            "quantity is too large",
        ));
    }

    choice_value(
        config,
        "engine",
        "period_unit",
        crate::ports::data_port::PeriodUnit::Day,
    )?;
    bool_value(config, "engine", "require_confirmation", false)?;
    choice_value(
        config,
        "engine",
        "confirmation_mode",
        crate::domain::confirmation::ConfirmationMode::SignalPersists,
    )?;
    Ok(())
}

fn validate_indicator_section(config: &dyn ConfigPort) -> Result<(), EngineError> {
    for key in [
        "ema_short",
        "ema_long",
        "rsi_period",
        "macd_fast",
        "macd_slow",
        "macd_signal",
        "atr_period",
    ] {
        require_min(config, "indicators", key, 1, 1)?;
    }
    require_min(config, "indicators", "ema_trend", 0, 0)?;

    let settings = read_indicators(config)?;
    if settings.ema_short >= settings.ema_long {
        return Err(EngineError::invalid(
            "indicators",
            "ema_short",
            "ema_short must be shorter than ema_long",
        ));
    }
    if settings.macd_fast >= settings.macd_slow {
        return Err(EngineError::invalid(
            "indicators",
            "macd_fast",
            "macd_fast must be shorter than macd_slow",
        ));
    }
    Ok(())
}

fn validate_lookback(config: &dyn ConfigPort) -> Result<(), EngineError> {
    let settings = read_indicators(config)?;
    let lookback = int_value(
        config,
        "engine",
        "lookback",
        crate::domain::config::DEFAULT_LOOKBACK as i64,
    )?;
    let needed = settings.min_bars();
    if (lookback as usize) < needed {
        return Err(EngineError::invalid(
            "engine",
            "lookback",
            format!(
                "lookback {} is shorter than the {} bars the indicators need; raise lookback to at least {}",
                lookback, needed, needed
            ),
        ));
    }
    Ok(())
}

fn validate_signal_section(config: &dyn ConfigPort) -> Result<(), EngineError> {
    let thresholds = read_thresholds(config)?;
    for (key, value) in [
        ("rsi_oversold", thresholds.rsi_oversold),
        ("rsi_overbought", thresholds.rsi_overbought),
    ] {
        if !(0.0..=100.0).contains(&value) {
            return Err(EngineError::invalid(
                "signals",
                key,
                format!("{} must be between 0 and 100", key),
            ));
        }
    }
    if thresholds.rsi_oversold >= thresholds.rsi_overbought {
        return Err(EngineError::invalid(
            "signals",
            "rsi_oversold",
            "rsi_oversold must be below rsi_overbought",
        ));
    }

    require_min(config, "signals", "minimum_volume", 0, 0)?;

    let rules = build_rule_set(config)?;
    let settings = read_indicators(config)?;
    if settings.ema_trend.is_none() && rules.fields().contains(&IndicatorField::EmaTrend) {
        return Err(EngineError::invalid(
            "indicators",
            "ema_trend",
            format!("rule set {} uses EMA_TREND but ema_trend is disabled", rules.kind),
        ));
    }
    Ok(())
}

fn validate_risk_section(config: &dyn ConfigPort) -> Result<(), EngineError> {
    choice_value(
        config,
        "risk",
        "method",
        crate::domain::config::RiskMethod::Atr,
    )?;
    choice_value(
        config,
        "risk",
        "exit_mode",
        crate::domain::risk::ExitMode::Bracket,
    )?;
    bool_value(config, "risk", "swing_exit", false)?;

    if double_value(config, "risk", "atr_multiplier", 1.5)? <= 0.0 {
        return Err(EngineError::invalid(
            "risk",
            "atr_multiplier",
            "atr_multiplier must be positive",
        ));
    }
    if double_value(config, "risk", "risk_reward_ratio", 2.0)? <= 0.0 {
        return Err(EngineError::invalid(
            "risk",
            "risk_reward_ratio",
            "risk_reward_ratio must be positive",
        ));
    }
    for (key, default) in [("stop_pct", 0.10), ("trail_pct", 0.05)] {
        let value = double_value(config, "risk", key, default)?;
        if value <= 0.0 || value >= 1.0 {
            return Err(EngineError::invalid(
                "risk",
                key,
                format!("{} must be between 0 and 1", key),
            ));
        }
    }
    Ok(())
}

fn validate_options_section(config: &dyn ConfigPort) -> Result<(), EngineError> {
    if double_value(config, "options", "strike_offset", 1.0)? < 0.0 {
        return Err(EngineError::invalid(
            "options",
            "strike_offset",
            "strike_offset must be non-negative",
        ));
    }
    let expiry = read_expiry(config)?;
    if expiry.is_none() && build_rule_set(config)?.emits_options() {
        return Err(EngineError::missing("options", "expiry"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_config_adapter::FileConfigAdapter;

    fn make_config(content: &str) -> FileConfigAdapter {
        FileConfigAdapter::from_string(content).unwrap()
    }

    fn with_engine(extra: &str) -> FileConfigAdapter {
        make_config(&format!("[engine]\ninstruments = AAPL,MSFT\n{}", extra))
    }

    fn invalid_key(err: &EngineError) -> &str {
        match err {
            EngineError::ConfigInvalid { key, .. } => key,
            other => panic!("expected ConfigInvalid, got {:?}", other),
        }
    }

    #[test]
    fn minimal_config_passes() {
        assert!(validate_engine_config(&with_engine("")).is_ok());
    }

    #[test]
    fn missing_instruments_fails() {
        let err = validate_engine_config(&make_config("[engine]\nlookback = 100\n")).unwrap_err();
        assert!(matches!(err, EngineError::ConfigMissing { key, .. } if key == "instruments"));
    }

    #[test]
    fn duplicate_instruments_fail() {
        let err =
            validate_engine_config(&make_config("[engine]\ninstruments = AAPL, aapl\n")).unwrap_err();
        assert_eq!(invalid_key(&err), "instruments");
    }

    #[test]
    fn non_numeric_lookback_fails() {
        let err = validate_engine_config(&with_engine("lookback = lots\n")).unwrap_err();
        assert_eq!(invalid_key(&err), "lookback");
    }

    #[test]
    fn quantity_zero_fails() {
        let err = validate_engine_config(&with_engine("quantity = 0\n")).unwrap_err();
        assert_eq!(invalid_key(&err), "quantity");
    }

    #[test]
    fn bad_period_unit_fails() {
        let err = validate_engine_config(&with_engine("period_unit = fortnight\n")).unwrap_err();
        assert_eq!(invalid_key(&err), "period_unit");
    }

    #[test]
    fn bad_confirmation_flag_fails() {
        let err = validate_engine_config(&with_engine("require_confirmation = maybe\n")).unwrap_err();
        assert_eq!(invalid_key(&err), "require_confirmation");
    }

    #[test]
    fn ema_short_must_be_shorter() {
        let err = validate_engine_config(&with_engine(
            "[indicators]\nema_short = 21\nema_long = 9\n",
        ))
        .unwrap_err();
        assert_eq!(invalid_key(&err), "ema_short");
    }

    #[test]
    fn zero_period_fails() {
        let err = validate_engine_config(&with_engine("[indicators]\nrsi_period = 0\n")).unwrap_err();
        assert_eq!(invalid_key(&err), "rsi_period");
    }

    #[test]
    fn lookback_must_cover_indicators() {
        // MACD 26 + 9 - 1 = 34, plus one prior row
        let err = validate_engine_config(&with_engine("lookback = 34\n")).unwrap_err();
        assert_eq!(invalid_key(&err), "lookback");
        assert!(validate_engine_config(&with_engine("lookback = 35\n")).is_ok());
    }

    #[test]
    fn trend_ema_counts_toward_lookback() {
        let err = validate_engine_config(&with_engine(
            "lookback = 150\n[indicators]\nema_trend = 200\n",
        ))
        .unwrap_err();
        assert_eq!(invalid_key(&err), "lookback");
    }

    #[test]
    fn default_lookback_covers_trend_ema() {
        assert!(validate_engine_config(&with_engine("[indicators]\nema_trend = 200\n")).is_ok());
    }

    #[test]
    fn short_lookback_error_names_required_bars() {
        let err = validate_engine_config(&with_engine(
            "lookback = 200\n[indicators]\nema_trend = 200\n",
        ))
        .unwrap_err();
        assert!(err.to_string().contains("raise lookback to at least 201"));
    }

    #[test]
    fn rsi_band_must_be_ordered() {
        let err = validate_engine_config(&with_engine(
            "[signals]\nrsi_oversold = 80\nrsi_overbought = 20\n",
        ))
        .unwrap_err();
        assert_eq!(invalid_key(&err), "rsi_oversold");
    }

    #[test]
    fn rsi_threshold_out_of_range() {
        let err =
            validate_engine_config(&with_engine("[signals]\nrsi_overbought = 120\n")).unwrap_err();
        assert_eq!(invalid_key(&err), "rsi_overbought");
    }

    #[test]
    fn unknown_rule_set_fails() {
        let err = validate_engine_config(&with_engine("[signals]\nrule_set = golden\n")).unwrap_err();
        assert_eq!(invalid_key(&err), "rule_set");
    }

    #[test]
    fn custom_without_rules_fails() {
        let err = validate_engine_config(&with_engine("[signals]\nrule_set = custom\n")).unwrap_err();
        assert!(matches!(err, EngineError::ConfigMissing { key, .. } if key == "buy"));
    }

    #[test]
    fn trend_rules_need_trend_ema() {
        let err = validate_engine_config(&with_engine(
            "[signals]\nrule_set = options_trend\n[options]\nexpiry = 2024-12-20\n",
        ))
        .unwrap_err();
        assert_eq!(invalid_key(&err), "ema_trend");
    }

    #[test]
    fn options_rules_need_expiry() {
        let err = validate_engine_config(&with_engine(
            "lookback = 250\n[indicators]\nema_trend = 200\n[signals]\nrule_set = options_trend\n",
        ))
        .unwrap_err();
        assert!(matches!(err, EngineError::ConfigMissing { key, .. } if key == "expiry"));
    }

    #[test]
    fn bad_expiry_format_fails() {
        let err =
            validate_engine_config(&with_engine("[options]\nexpiry = 20/12/2024\n")).unwrap_err();
        assert_eq!(invalid_key(&err), "expiry");
    }

    #[test]
    fn options_config_passes() {
        let config = with_engine(
            "lookback = 250\n[indicators]\nema_trend = 200\n[signals]\nrule_set = options_trend\n[options]\nexpiry = 2024-12-20\nstrike_offset = 2\n",
        );
        assert!(validate_engine_config(&config).is_ok());
    }

    #[test]
    fn risk_ranges() {
        let err = validate_engine_config(&with_engine("[risk]\natr_multiplier = 0\n")).unwrap_err();
        assert_eq!(invalid_key(&err), "atr_multiplier");

        let err = validate_engine_config(&with_engine("[risk]\nstop_pct = 1.5\n")).unwrap_err();
        assert_eq!(invalid_key(&err), "stop_pct");

        let err =
            validate_engine_config(&with_engine("[risk]\nrisk_reward_ratio = -1\n")).unwrap_err();
        assert_eq!(invalid_key(&err), "risk_reward_ratio");

        let err = validate_engine_config(&with_engine("[risk]\nexit_mode = hope\n")).unwrap_err();
        assert_eq!(invalid_key(&err), "exit_mode");

        let err = validate_engine_config(&with_engine("[risk]\nmethod = vibes\n")).unwrap_err();
        assert_eq!(invalid_key(&err), "method");
    }

    #[test]
    fn negative_volume_gate_fails() {
        let err =
            validate_engine_config(&with_engine("[signals]\nminimum_volume = -1\n")).unwrap_err();
        assert_eq!(invalid_key(&err), "minimum_volume");
    }
}
