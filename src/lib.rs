//! risk-shield: Risk control and protection for automated trading
//!
//! This library provides the core components for:
//! - Account limits and pre-trade admission control
//! - Position sizing (fixed, Kelly, ATR and volatility based) and a position ledger
//! - Stop-loss orders: fixed, trailing, time, ATR and risk-adaptive
//! - Periodic risk monitoring with alerts, emergency halts and reports
//! - A `RiskSystem` aggregate wiring the pieces together
//! - Logging and Prometheus metrics

pub mod cli;
pub mod config;
pub mod feed;
pub mod monitor;
pub mod position;
pub mod risk;
pub mod signal;
pub mod stops;
pub mod system;
pub mod telemetry;

pub use system::{RiskSystem, StopPlan};
