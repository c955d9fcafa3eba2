//! Order intents handed to the broker collaborator.

use chrono::NaiveDate;
use std::fmt;

use crate::domain::risk::{ExitMode, RiskLevels};
use crate::domain::signal::Signal;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderSide {
    Buy,
    Sell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionType {
    Call,
    Put,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderKind {
    Market,
    /// Market entry with attached stop-loss and take-profit legs.
    Bracket,
    Options,
}

impl OrderKind {
    pub fn for_stock(exit_mode: ExitMode) -> Self {
        match exit_mode {
            ExitMode::Bracket => OrderKind::Bracket,
            ExitMode::Fixed | ExitMode::Trailing => OrderKind::Market,
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderSide::Buy => f.write_str("buy"),
            OrderSide::Sell => f.write_str("sell"),
        }
    }
}

impl fmt::Display for OrderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OrderKind::Market => "market",
            OrderKind::Bracket => "bracket",
            OrderKind::Options => "options",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderIntent {
    pub instrument: String,
    pub quantity: u32,
    pub side: OrderSide,
    pub kind: OrderKind,
    pub option_type: Option<OptionType>,
    /// Reference price the levels were sized from (latest close).
    pub entry_price: f64,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
    pub strike: Option<f64>,
    pub expiry: Option<NaiveDate>,
}

/// Contract terms for BUY_CALL / BUY_PUT.
#[derive(Debug, Clone, PartialEq)]
pub struct OptionsTerms {
    pub strike_offset: f64,
    pub expiry: Option<NaiveDate>,
}

impl Default for OptionsTerms {
    fn default() -> Self {
        OptionsTerms {
            strike_offset: 1.0,
            expiry: None,
        }
    }
}

pub fn round_price(price: f64) -> f64 {
    (price * 100.0).round() / 100.0
}

/// Turn a confirmed signal plus its risk levels into an order intent.
/// `None` for [`Signal::None`].
pub fn build_intent(
    instrument: &str,
    signal: Signal,
    quantity: u32,
    levels: &RiskLevels,
    exit_mode: ExitMode,
    terms: &OptionsTerms,
) -> Option<OrderIntent> {
    let entry = round_price(levels.entry_price);
    let (side, kind, option_type, strike, expiry) = match signal {
        Signal::None => return None,
        Signal::Buy => (OrderSide::Buy, OrderKind::for_stock(exit_mode), None, None, None),
        Signal::Sell => (OrderSide::Sell, OrderKind::for_stock(exit_mode), None, None, None),
        Signal::BuyCall => (
            OrderSide::Buy,
            OrderKind::Options,
            Some(OptionType::Call),
            Some(round_price(levels.entry_price + terms.strike_offset)),
            terms.expiry,
        ),
        Signal::BuyPut => (
            OrderSide::Buy,
            OrderKind::Options,
            Some(OptionType::Put),
            Some(round_price(levels.entry_price - terms.strike_offset)),
            terms.expiry,
        ),
    };

    Some(OrderIntent {
        instrument: instrument.to_string(),
        quantity,
        side,
        kind,
        option_type,
        entry_price: entry,
        stop_loss: Some(round_price(levels.stop_loss)),
        take_profit: Some(round_price(levels.take_profit)),
        strike,
        expiry,
    })
}
