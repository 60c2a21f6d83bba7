//! Risk management module
//!
//! Account limits, per-trade risk, the metrics snapshot and the admission
//! controller that turns them into trade decisions.

mod controller;
pub(crate) mod limits;
mod metrics;
mod trade;
mod types;

pub use controller::{assess_risk_level, ControllerStatus, RiskController};
pub use limits::{DrawdownTracker, RiskLimits, RiskLimitsBuilder};
pub use metrics::RiskMetrics;
pub use trade::TradeRisk;
pub use types::{Decision, RiskError, RiskLevel};
pub(crate) use types::pct;
