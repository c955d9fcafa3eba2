//! In-memory broker that fills every order immediately at its entry price.
//!
//! Bracket legs are not simulated; the engine's own exit check flattens
//! positions when a stored level is crossed.

use std::collections::BTreeMap;
use tracing::info;

use crate::domain::error::OrderError;
use crate::domain::order::{OrderIntent, OrderSide};
use crate::domain::risk::Direction;
use crate::domain::state::EngineState;
use crate::ports::broker_port::{BrokerPort, OpenOrder, OpenPosition, OrderId};

#[derive(Debug, Default)]
pub struct PaperBroker {
    positions: BTreeMap<String, OpenPosition>,
    fills: Vec<OrderIntent>,
    next_id: u64,
}

impl PaperBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild positions for every instrument that carries risk levels in a
    /// restored snapshot, so the first cycle does not reconcile them away.
    pub fn seeded(state: &EngineState, quantity: u32) -> Self {
        let mut broker = Self::new();
        for (instrument, entry) in &state.instruments {
            let Some(levels) = &entry.risk else {
                continue;
            };
            let quantity = match levels.direction {
                Direction::Long => i64::from(quantity),
                Direction::Short => -i64::from(quantity),
            };
            broker.positions.insert(
                instrument.clone(),
                OpenPosition {
                    instrument: instrument.clone(),
                    quantity,
                    entry_price: levels.entry_price,
                },
            );
        }
        broker
    }

    pub fn positions(&self) -> impl Iterator<Item = &OpenPosition> {
        self.positions.values()
    }

    /// Every intent filled so far, oldest first.
    pub fn fills(&self) -> &[OrderIntent] {
        &self.fills
    }
}

impl BrokerPort for PaperBroker {
    fn open_orders(&self, _instrument: &str) -> Result<Vec<OpenOrder>, OrderError> {
        Ok(Vec::new())
    }

    fn open_position(&self, instrument: &str) -> Result<Option<OpenPosition>, OrderError> {
        Ok(self.positions.get(instrument).cloned())
    }

    fn submit_order(&mut self, intent: &OrderIntent) -> Result<OrderId, OrderError> {
        if intent.quantity == 0 {
            return Err(OrderError::Rejected {
                instrument: intent.instrument.clone(),
                reason: "zero quantity".to_string(),
            });
        }

        self.next_id += 1;
        let id = OrderId(format!("paper-{}", self.next_id));
        let signed = match intent.side {
            OrderSide::Buy => i64::from(intent.quantity),
            OrderSide::Sell => -i64::from(intent.quantity),
        };

        let position = self
            .positions
            .entry(intent.instrument.clone())
            .or_insert_with(|| OpenPosition {
                instrument: intent.instrument.clone(),
                quantity: 0,
                entry_price: intent.entry_price,
            });
        position.quantity += signed;
        if position.quantity == 0 {
            self.positions.remove(&intent.instrument);
        }

        info!(
            instrument = %intent.instrument,
            %id,
            side = %intent.side,
            quantity = intent.quantity,
            price = intent.entry_price,
            "paper fill"
        );
        self.fills.push(intent.clone());
        Ok(id)
    }

    fn flatten_position(&mut self, instrument: &str) -> Result<(), OrderError> {
        if let Some(position) = self.positions.remove(instrument) {
            info!(instrument, quantity = position.quantity, "paper position flattened");
        }
        Ok(())
    }
}
