//! Core domain types and logic.

pub mod ohlcv;
pub mod indicator;
pub mod signal;
pub mod rule;
pub mod rule_parser;
pub mod rule_eval;
pub mod classifier;
pub mod confirmation;
pub mod risk;
pub mod order;
pub mod guard;
pub mod state;
pub mod engine;
pub mod config;
pub mod config_validation;
pub mod error;
