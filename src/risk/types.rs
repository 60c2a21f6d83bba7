//! Risk management types

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Risk management errors
#[derive(Debug, Error)]
pub enum RiskError {
    /// A configured limit is outside its valid range
    #[error("Invalid limit {field}: {value} ({expected})")]
    InvalidLimit {
        field: &'static str,
        value: String,
        expected: &'static str,
    },
    /// Position rejected by the ledger
    #[error("Position rejected: {0}")]
    PositionRejected(String),
    /// Stop order could not be created
    #[error("Invalid stop for {symbol}: {reason}")]
    InvalidStop { symbol: String, reason: String },
    /// Metrics snapshot cannot be evaluated
    #[error("Degenerate metrics: {0}")]
    DegenerateMetrics(String),
    /// Monitor loop is already running
    #[error("Risk monitor already running")]
    MonitorAlreadyRunning,
    /// Monitor loop did not exit in time
    #[error("Risk monitor did not stop within {0:?}")]
    MonitorStopTimeout(std::time::Duration),
    /// Background work requested outside a Tokio runtime
    #[error("No Tokio runtime available")]
    NoRuntime,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl RiskError {
    pub(crate) fn invalid_limit(
        field: &'static str,
        value: impl fmt::Display,
        expected: &'static str,
    ) -> Self {
        Self::InvalidLimit {
            field,
            value: value.to_string(),
            expected,
        }
    }
}

/// Ordinal risk classification
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    #[default]
    Low,
    Moderate,
    High,
    Critical,
}

impl RiskLevel {
    /// Map an additive risk score onto a level
    pub fn from_score(score: u32) -> Self {
        match score {
            0 => RiskLevel::Low,
            1..=2 => RiskLevel::Moderate,
            3..=4 => RiskLevel::High,
            _ => RiskLevel::Critical,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Moderate => "moderate",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of an admission or limit check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    /// Whether the action may proceed
    pub allowed: bool,
    /// Human-readable explanation
    pub reason: String,
}

impl Decision {
    pub fn allow(reason: impl Into<String>) -> Self {
        Self {
            allowed: true,
            reason: reason.into(),
        }
    }

    pub fn reject(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: reason.into(),
        }
    }
}

/// Format a fraction as a percentage string
pub(crate) fn pct(value: Decimal) -> String {
    format!("{:.2}%", value * Decimal::ONE_HUNDRED)
}
