//! Discrete trade signals attached to the latest bar.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::risk::Direction;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Signal {
    #[default]
    None,
    Buy,
    Sell,
    BuyCall,
    BuyPut,
}

impl Signal {
    /// Signals that open a position by buying: shares, calls or puts.
    /// These are the ones the confirmation state machine gates.
    pub fn is_buy_type(self) -> bool {
        matches!(self, Signal::Buy | Signal::BuyCall | Signal::BuyPut)
    }

    pub fn is_options(self) -> bool {
        matches!(self, Signal::BuyCall | Signal::BuyPut)
    }

    /// Direction of the bet on the underlying.
    pub fn direction(self) -> Option<Direction> {
        match self {
            Signal::None => None,
            Signal::Buy | Signal::BuyCall => Some(Direction::Long),
            Signal::Sell | Signal::BuyPut => Some(Direction::Short),
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Signal::None => "NONE",
            Signal::Buy => "BUY",
            Signal::Sell => "SELL",
            Signal::BuyCall => "BUY_CALL",
            Signal::BuyPut => "BUY_PUT",
        };
        f.write_str(s)
    }
}

impl FromStr for Signal {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "NONE" | "HOLD" => Ok(Signal::None),
            "BUY" => Ok(Signal::Buy),
            "SELL" => Ok(Signal::Sell),
            "BUY_CALL" => Ok(Signal::BuyCall),
            "BUY_PUT" => Ok(Signal::BuyPut),
            other => Err(format!("unknown signal '{}'", other)),
        }
    }
}
