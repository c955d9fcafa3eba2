//! Rule AST and rule-set tables.
//!
//! This module defines the abstract syntax tree for signal conditions:
//! - `Operand`: What can be compared (bar fields, constants, snapshot indicators)
//! - `IndicatorField`: Which snapshot indicator an operand reads
//! - `Rule`: Comparison and composite conditions over the current and previous row
//! - `RuleSet`: Ordered `{condition → signal}` table; first match wins
//!
//! The strategy variants (EMA-only, EMA+RSI+MACD, options trend) are presets of
//! the same table rather than separate code paths.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::domain::signal::Signal;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum IndicatorField {
    EmaShort,
    EmaLong,
    EmaTrend,
    Rsi,
    MacdLine,
    MacdSignal,
    Atr,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Open,
    High,
    Low,
    Close,
    Volume,
    Constant(f64),
    Indicator(IndicatorField),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Rule {
    CrossAbove {
        left: Operand,
        right: Operand,
    },
    CrossBelow {
        left: Operand,
        right: Operand,
    },
    Above {
        left: Operand,
        right: Operand,
    },
    Below {
        left: Operand,
        right: Operand,
    },
    AtLeast {
        left: Operand,
        right: Operand,
    },
    Between {
        operand: Operand,
        lower: f64,
        upper: f64,
    },
    And(Vec<Rule>),
    Or(Vec<Rule>),
    Not(Box<Rule>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SignalRule {
    pub signal: Signal,
    pub rule: Rule,
}

/// RSI band used by the compound presets.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub rsi_oversold: f64,
    pub rsi_overbought: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Thresholds {
            rsi_oversold: 30.0,
            rsi_overbought: 70.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleSetKind {
    EmaCrossover,
    MomentumConfluence,
    OptionsTrend,
    Custom,
}

impl fmt::Display for RuleSetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RuleSetKind::EmaCrossover => "ema_crossover",
            RuleSetKind::MomentumConfluence => "momentum_confluence",
            RuleSetKind::OptionsTrend => "options_trend",
            RuleSetKind::Custom => "custom",
        };
        f.write_str(s)
    }
}

impl FromStr for RuleSetKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ema_crossover" => Ok(RuleSetKind::EmaCrossover),
            "momentum_confluence" => Ok(RuleSetKind::MomentumConfluence),
            "options_trend" => Ok(RuleSetKind::OptionsTrend),
            "custom" => Ok(RuleSetKind::Custom),
            other => Err(format!(
                "unknown rule set '{}' (expected ema_crossover, momentum_confluence, options_trend or custom)",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RuleSet {
    pub kind: RuleSetKind,
    pub entries: Vec<SignalRule>,
}

fn ind(field: IndicatorField) -> Operand {
    Operand::Indicator(field)
}

fn ema_cross_up() -> Rule {
    Rule::CrossAbove {
        left: ind(IndicatorField::EmaShort),
        right: ind(IndicatorField::EmaLong),
    }
}

fn ema_cross_down() -> Rule {
    Rule::CrossBelow {
        left: ind(IndicatorField::EmaShort),
        right: ind(IndicatorField::EmaLong),
    }
}

impl RuleSet {
    /// BUY on short EMA crossing above long EMA, SELL on the reverse.
    pub fn ema_crossover() -> Self {
        RuleSet {
            kind: RuleSetKind::EmaCrossover,
            entries: vec![
                SignalRule {
                    signal: Signal::Buy,
                    rule: ema_cross_up(),
                },
                SignalRule {
                    signal: Signal::Sell,
                    rule: ema_cross_down(),
                },
            ],
        }
    }

    /// Oversold RSI with bullish MACD and EMA stack → BUY; mirror → SELL.
    pub fn momentum_confluence(t: &Thresholds) -> Self {
        RuleSet {
            kind: RuleSetKind::MomentumConfluence,
            entries: vec![
                SignalRule {
                    signal: Signal::Buy,
                    rule: Rule::And(vec![
                        Rule::Below {
                            left: ind(IndicatorField::Rsi),
                            right: Operand::Constant(t.rsi_oversold),
                        },
                        Rule::Above {
                            left: ind(IndicatorField::MacdLine),
                            right: ind(IndicatorField::MacdSignal),
                        },
                        Rule::Above {
                            left: ind(IndicatorField::EmaShort),
                            right: ind(IndicatorField::EmaLong),
                        },
                    ]),
                },
                SignalRule {
                    signal: Signal::Sell,
                    rule: Rule::And(vec![
                        Rule::Above {
                            left: ind(IndicatorField::Rsi),
                            right: Operand::Constant(t.rsi_overbought),
                        },
                        Rule::Below {
                            left: ind(IndicatorField::MacdLine),
                            right: ind(IndicatorField::MacdSignal),
                        },
                        Rule::Below {
                            left: ind(IndicatorField::EmaShort),
                            right: ind(IndicatorField::EmaLong),
                        },
                    ]),
                },
            ],
        }
    }

    /// EMA crossover confirmed by the trend EMA, RSI and MACD → BUY_CALL / BUY_PUT.
    pub fn options_trend(t: &Thresholds) -> Self {
        RuleSet {
            kind: RuleSetKind::OptionsTrend,
            entries: vec![
                SignalRule {
                    signal: Signal::BuyCall,
                    rule: Rule::And(vec![
                        ema_cross_up(),
                        Rule::Above {
                            left: ind(IndicatorField::EmaShort),
                            right: ind(IndicatorField::EmaTrend),
                        },
                        Rule::Above {
                            left: ind(IndicatorField::EmaLong),
                            right: ind(IndicatorField::EmaTrend),
                        },
                        Rule::Below {
                            left: ind(IndicatorField::Rsi),
                            right: Operand::Constant(t.rsi_overbought),
                        },
                        Rule::Above {
                            left: ind(IndicatorField::MacdLine),
                            right: ind(IndicatorField::MacdSignal),
                        },
                    ]),
                },
                SignalRule {
                    signal: Signal::BuyPut,
                    rule: Rule::And(vec![
                        ema_cross_down(),
                        Rule::Below {
                            left: ind(IndicatorField::EmaShort),
                            right: ind(IndicatorField::EmaTrend),
                        },
                        Rule::Below {
                            left: ind(IndicatorField::EmaLong),
                            right: ind(IndicatorField::EmaTrend),
                        },
                        Rule::Above {
                            left: ind(IndicatorField::Rsi),
                            right: Operand::Constant(t.rsi_oversold),
                        },
                        Rule::Below {
                            left: ind(IndicatorField::MacdLine),
                            right: ind(IndicatorField::MacdSignal),
                        },
                    ]),
                },
            ],
        }
    }

    pub fn custom(entries: Vec<SignalRule>) -> Self {
        RuleSet {
            kind: RuleSetKind::Custom,
            entries,
        }
    }

    pub fn emits(&self, signal: Signal) -> bool {
        self.entries.iter().any(|e| e.signal == signal)
    }

    pub fn emits_options(&self) -> bool {
        self.entries.iter().any(|e| e.signal.is_options())
    }

    /// Every snapshot indicator referenced by any entry.
    pub fn fields(&self) -> BTreeSet<IndicatorField> {
        self.entries
            .iter()
            .flat_map(|e| extract_fields(&e.rule))
            .collect()
    }
}

pub fn extract_fields(rule: &Rule) -> Vec<IndicatorField> {
    let mut fields = Vec::new();
    collect_fields(rule, &mut fields);
    fields
}

fn collect_fields(rule: &Rule, out: &mut Vec<IndicatorField>) {
    let mut push = |op: &Operand| {
        if let Operand::Indicator(field) = op {
            out.push(*field);
        }
    };
    match rule {
        Rule::CrossAbove { left, right }
        | Rule::CrossBelow { left, right }
        | Rule::Above { left, right }
        | Rule::Below { left, right }
        | Rule::AtLeast { left, right } => {
            push(left);
            push(right);
        }
        Rule::Between { operand, .. } => push(operand),
        Rule::And(rules) | Rule::Or(rules) => {
            for r in rules {
                collect_fields(r, out);
            }
        }
        Rule::Not(inner) => collect_fields(inner, out),
    }
}
