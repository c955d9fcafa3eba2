//! Broker port trait: position/order queries and order submission.

use std::fmt;

use crate::domain::error::OrderError;
use crate::domain::order::{OrderIntent, OrderSide};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OrderId(pub String);

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OpenOrder {
    pub id: OrderId,
    pub instrument: String,
    pub side: OrderSide,
    pub quantity: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OpenPosition {
    pub instrument: String,
    /// Positive for long, negative for short.
    pub quantity: i64,
    pub entry_price: f64,
}

pub trait BrokerPort {
    fn open_orders(&self, instrument: &str) -> Result<Vec<OpenOrder>, OrderError>;

    fn open_position(&self, instrument: &str) -> Result<Option<OpenPosition>, OrderError>;

    fn submit_order(&mut self, intent: &OrderIntent) -> Result<OrderId, OrderError>;

    /// Close whatever is held in `instrument` and cancel its open orders.
    fn flatten_position(&mut self, instrument: &str) -> Result<(), OrderError>;
}
