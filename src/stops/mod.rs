//! Stop-loss management
//!
//! Fixed, trailing, time-based, ATR-based and risk-level driven stops on
//! long positions. Every rule evaluates through [`StopRule`]; the manager
//! keeps one active order per symbol and moves fired, cancelled and expired
//! orders into a bounded history.

mod manager;
mod order;
mod rules;

pub use manager::{StopLossConfig, StopLossManager, StopSummary};
pub use order::{ExitIntent, StopOrder, StopOutcome, StopStatus, StopTrigger};
pub use rules::{
    smart_stop_pct, AtrStop, FixedStop, SmartStop, StopKind, StopRule, TimeStop, Trail,
    TrailingStop, TriggerReason, TriggerResult,
};
