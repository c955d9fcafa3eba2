//! trendgate: indicator-driven signal engine with risk-bounded order dispatch.
//!
//! Each cycle pulls recent bars per instrument, computes EMA/RSI/MACD/ATR,
//! classifies the latest bar against a rule set, optionally waits for a
//! confirming bar, sizes stop-loss and take-profit levels, and hands an
//! order intent to a broker unless one is already working.
//!
//! Hexagonal architecture: domain logic in [`domain`], port traits in [`ports`],
//! concrete implementations in [`adapters`].

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod logging;
pub mod ports;
