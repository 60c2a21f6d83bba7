//! Alert and emergency records

use crate::risk::RiskLevel;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Kind of warning raised by the monitor
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    DailyLossWarning,
    MaxDrawdown,
    ConsecutiveLossesWarning,
    HighPositionConcentration,
    VarBreach,
}

impl AlertType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertType::DailyLossWarning => "daily_loss_warning",
            AlertType::MaxDrawdown => "max_drawdown",
            AlertType::ConsecutiveLossesWarning => "consecutive_losses_warning",
            AlertType::HighPositionConcentration => "high_position_concentration",
            AlertType::VarBreach => "var_breach",
        }
    }
}

impl fmt::Display for AlertType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of condition that halts trading
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmergencyType {
    DailyLossLimit,
    ConsecutiveLosses,
    LowAccountValue,
}

impl EmergencyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmergencyType::DailyLossLimit => "daily_loss_limit",
            EmergencyType::ConsecutiveLosses => "consecutive_losses",
            EmergencyType::LowAccountValue => "low_account_value",
        }
    }
}

impl fmt::Display for EmergencyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A risk alert
///
/// Append-only apart from the resolution fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: Uuid,
    pub alert_type: AlertType,
    pub severity: RiskLevel,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub current_value: Decimal,
    pub threshold_value: Decimal,
    pub symbol: Option<String>,
    pub resolved: bool,
    pub resolved_time: Option<DateTime<Utc>>,
    pub resolution_note: Option<String>,
}

impl Alert {
    /// Create a new unresolved alert
    pub fn new(
        alert_type: AlertType,
        severity: RiskLevel,
        message: String,
        current_value: Decimal,
        threshold_value: Decimal,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            alert_type,
            severity,
            message,
            timestamp,
            current_value,
            threshold_value,
            symbol: None,
            resolved: false,
            resolved_time: None,
            resolution_note: None,
        }
    }

    /// Mark resolved; returns false if it already was
    pub fn resolve(&mut self, note: &str, now: DateTime<Utc>) -> bool {
        if self.resolved {
            return false;
        }
        self.resolved = true;
        self.resolved_time = Some(now);
        if !note.is_empty() {
            self.resolution_note = Some(note.to_string());
        }
        true
    }
}

/// A trading halt raised by the monitor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmergencyEvent {
    pub id: Uuid,
    pub event_type: EmergencyType,
    pub description: String,
    pub timestamp: DateTime<Utc>,
    /// Always critical
    pub risk_level: RiskLevel,
    pub affected_positions: Vec<String>,
    pub actions_taken: Vec<String>,
    /// Value that breached the limit
    pub financial_impact: Decimal,
}

impl EmergencyEvent {
    pub fn new(
        event_type: EmergencyType,
        description: String,
        financial_impact: Decimal,
        affected_positions: Vec<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            event_type,
            description,
            timestamp,
            risk_level: RiskLevel::Critical,
            affected_positions,
            actions_taken: vec!["new trades halted".to_string()],
            financial_impact,
        }
    }
}
