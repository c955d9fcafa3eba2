#![allow(dead_code)]

use chrono::{NaiveDate, NaiveDateTime};
use std::collections::{HashMap, HashSet};
use trendgate::domain::config::{EngineConfig, RiskMethod};
use trendgate::domain::error::{EngineError, OrderError};
use trendgate::domain::indicator::IndicatorSettings;
pub use trendgate::domain::ohlcv::Bar;
use trendgate::domain::order::{OrderIntent, OrderSide};
use trendgate::domain::rule::{Operand, Rule, RuleSet, SignalRule};
use trendgate::domain::signal::Signal;
use trendgate::domain::classifier::Classifier;
use trendgate::ports::broker_port::{BrokerPort, OpenOrder, OpenPosition, OrderId};
use trendgate::ports::data_port::{BarSource, PeriodUnit};

pub struct MockBarSource {
    pub data: HashMap<String, Vec<Bar>>,
    pub errors: HashMap<String, String>,
}

impl MockBarSource {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_bars(mut self, instrument: &str, bars: Vec<Bar>) -> Self {
        self.data.insert(instrument.to_string(), bars);
        self
    }

    pub fn with_error(mut self, instrument: &str, reason: &str) -> Self {
        self.errors.insert(instrument.to_string(), reason.to_string());
        self
    }
}

impl BarSource for MockBarSource {
    fn get_bars(
        &self,
        instrument: &str,
        lookback: usize,
        _unit: PeriodUnit,
    ) -> Result<Vec<Bar>, EngineError> {
        if let Some(reason) = self.errors.get(instrument) {
            return Err(EngineError::Data {
                reason: reason.clone(),
            });
        }
        let bars = self.data.get(instrument).cloned().unwrap_or_default();
        let start = bars.len().saturating_sub(lookback);
        Ok(bars[start..].to_vec())
    }
}

/// Broker double: fills submissions into positions and records every call.
#[derive(Default)]
pub struct MockBroker {
    pub positions: HashMap<String, OpenPosition>,
    pub orders: HashMap<String, Vec<OpenOrder>>,
    pub submitted: Vec<OrderIntent>,
    pub flattened: Vec<String>,
    pub fail_submit: bool,
    pub fail_flatten: bool,
    pub failing_queries: HashSet<String>,
}

impl MockBroker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_position(mut self, instrument: &str, quantity: i64, entry_price: f64) -> Self {
        self.positions.insert(
            instrument.to_string(),
            OpenPosition {
                instrument: instrument.to_string(),
                quantity,
                entry_price,
            },
        );
        self
    }

    pub fn with_open_order(mut self, instrument: &str) -> Self {
        self.orders
            .entry(instrument.to_string())
            .or_default()
            .push(OpenOrder {
                id: OrderId(format!("open-{}", instrument)),
                instrument: instrument.to_string(),
                side: OrderSide::Buy,
                quantity: 1,
            });
        self
    }

    fn check_query(&self, instrument: &str) -> Result<(), OrderError> {
        if self.failing_queries.contains(instrument) {
            return Err(OrderError::Transport {
                reason: "connection reset".to_string(),
            });
        }
        Ok(())
    }
}

impl BrokerPort for MockBroker {
    fn open_orders(&self, instrument: &str) -> Result<Vec<OpenOrder>, OrderError> {
        self.check_query(instrument)?;
        Ok(self.orders.get(instrument).cloned().unwrap_or_default())
    }

    fn open_position(&self, instrument: &str) -> Result<Option<OpenPosition>, OrderError> {
        self.check_query(instrument)?;
        Ok(self.positions.get(instrument).cloned())
    }

    fn submit_order(&mut self, intent: &OrderIntent) -> Result<OrderId, OrderError> {
        if self.fail_submit {
            return Err(OrderError::Rejected {
                instrument: intent.instrument.clone(),
                reason: "insufficient buying power".to_string(),
            });
        }
        let quantity = match intent.side {
            OrderSide::Buy => i64::from(intent.quantity),
            OrderSide::Sell => -i64::from(intent.quantity),
        };
        self.positions.insert(
            intent.instrument.clone(),
            OpenPosition {
                instrument: intent.instrument.clone(),
                quantity,
                entry_price: intent.entry_price,
            },
        );
        self.submitted.push(intent.clone());
        Ok(OrderId(format!("mock-{}", self.submitted.len())))
    }

    fn flatten_position(&mut self, instrument: &str) -> Result<(), OrderError> {
        if self.fail_flatten {
            return Err(OrderError::Transport {
                reason: "flatten timed out".to_string(),
            });
        }
        self.positions.remove(instrument);
        self.orders.remove(instrument);
        self.flattened.push(instrument.to_string());
        Ok(())
    }
}

pub fn day(index: usize) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
        + chrono::Duration::days(index as i64)
}

pub fn make_bar(index: usize, open: f64, close: f64, volume: i64) -> Bar {
    Bar {
        timestamp: day(index),
        open,
        high: open.max(close) + 1.0,
        low: open.min(close) - 1.0,
        close,
        volume,
    }
}

/// Each bar opens at the previous close.
pub fn bars_from_closes(closes: &[f64]) -> Vec<Bar> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            make_bar(i, open, close, 10_000)
        })
        .collect()
}

/// Steady decline then a jump: the short EMA crosses above the long EMA on
/// the last bar only.
pub fn cross_up_closes() -> Vec<f64> {
    let mut closes: Vec<f64> = (0..9).map(|i| 110.0 - i as f64).collect();
    closes.push(125.0);
    closes
}

/// Mirror of [`cross_up_closes`].
pub fn cross_down_closes() -> Vec<f64> {
    let mut closes: Vec<f64> = (0..9).map(|i| 90.0 + i as f64).collect();
    closes.push(75.0);
    closes
}

/// Flat series ending at `last`, long enough for [`small_indicators`].
pub fn closes_ending_at(last: f64) -> Vec<f64> {
    let mut closes = vec![100.0; 9];
    closes.push(last);
    closes
}

pub fn small_indicators() -> IndicatorSettings {
    IndicatorSettings {
        ema_short: 2,
        ema_long: 4,
        ema_trend: None,
        rsi_period: 2,
        macd_fast: 2,
        macd_slow: 4,
        macd_signal: 2,
        atr_period: 2,
    }
}

/// BUY above `buy_above`, SELL below `sell_below`, on the latest close.
pub fn threshold_rules(buy_above: f64, sell_below: f64) -> RuleSet {
    RuleSet::custom(vec![
        SignalRule {
            signal: Signal::Buy,
            rule: Rule::Above {
                left: Operand::Close,
                right: Operand::Constant(buy_above),
            },
        },
        SignalRule {
            signal: Signal::Sell,
            rule: Rule::Below {
                left: Operand::Close,
                right: Operand::Constant(sell_below),
            },
        },
    ])
}

/// EMA crossover with small periods and 2% percent-of-entry stops at 2:1.
pub fn test_config(instruments: &[&str]) -> EngineConfig {
    let mut config = EngineConfig::new(instruments.iter().map(|s| s.to_string()).collect());
    config.lookback = 50;
    config.quantity = 10;
    config.indicators = small_indicators();
    config.risk.method = RiskMethod::Percent;
    config.risk.stop_pct = 0.02;
    config.risk.risk_reward_ratio = 2.0;
    config
}

pub fn with_rules(mut config: EngineConfig, rules: RuleSet) -> EngineConfig {
    config.classifier = Classifier::new(rules, 0);
    config
}
