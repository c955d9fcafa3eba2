//! Order guard: at most one pending order or position per instrument.

use tracing::debug;

use crate::domain::error::EngineError;
use crate::ports::broker_port::BrokerPort;

pub struct OrderGuard;

impl OrderGuard {
    /// `Ok(())` when the instrument is clear to trade. A broker query failure
    /// is returned as an error so the caller never dispatches blind.
    pub fn check(broker: &dyn BrokerPort, instrument: &str) -> Result<(), EngineError> {
        let orders = broker.open_orders(instrument)?;
        if !orders.is_empty() {
            debug!(instrument, open_orders = orders.len(), "guard: open orders");
            return Err(EngineError::ConflictingOrder {
                instrument: instrument.to_string(),
            });
        }
        if let Some(position) = broker.open_position(instrument)? {
            debug!(instrument, quantity = position.quantity, "guard: open position");
            return Err(EngineError::ConflictingOrder {
                instrument: instrument.to_string(),
            });
        }
        Ok(())
    }
}
