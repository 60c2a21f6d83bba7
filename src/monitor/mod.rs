//! Background risk monitoring
//!
//! Samples the latest [`RiskMetrics`](crate::risk::RiskMetrics) on a fixed
//! interval, raises alerts and emergency events, and fans them out to
//! subscribers through bounded queues.

mod alerts;
mod notifier;
mod report;
mod risk_monitor;

pub use alerts::{Alert, AlertType, EmergencyEvent, EmergencyType};
pub use notifier::Notifier;
pub use report::{ReportSummary, RiskDashboard, RiskExport, RiskReport};
pub use risk_monitor::{CycleOutcome, MonitorConfig, RiskMonitor};
