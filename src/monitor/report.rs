//! Dashboard and report views over the monitor state

use super::alerts::{Alert, AlertType, EmergencyEvent};
use crate::risk::{RiskLevel, RiskLimits, RiskMetrics};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;
use std::collections::BTreeMap;

/// Read-only snapshot of the monitor
#[derive(Debug, Clone, Serialize)]
pub struct RiskDashboard {
    pub monitoring: bool,
    pub session_duration_secs: i64,
    pub current_risk_level: RiskLevel,
    pub current_metrics: Option<RiskMetrics>,
    pub active_alerts_count: usize,
    pub total_alerts: u64,
    pub resolved_alerts: u64,
    pub emergency_count: u64,
    pub dropped_notifications: u64,
    pub cycle_errors: u64,
    /// Most recent unresolved alerts
    pub active_alerts: Vec<Alert>,
    /// Most recent emergency events
    pub recent_events: Vec<EmergencyEvent>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ReportSummary {
    pub total_alerts: usize,
    pub resolved_alerts: usize,
    pub emergency_events: usize,
    pub max_account_value: Decimal,
    pub min_account_value: Decimal,
    pub max_drawdown: Decimal,
    pub avg_daily_pnl: Decimal,
}

/// Aggregate over a trailing window
#[derive(Debug, Clone, Serialize)]
pub struct RiskReport {
    pub period_hours: u32,
    pub generated_at: DateTime<Utc>,
    pub summary: ReportSummary,
    pub alerts_by_type: BTreeMap<AlertType, Vec<Alert>>,
    /// Share of samples at each level
    pub risk_level_distribution: BTreeMap<RiskLevel, Decimal>,
    pub recommendations: Vec<String>,
}

impl RiskReport {
    pub(crate) fn build(
        period_hours: u32,
        generated_at: DateTime<Utc>,
        alerts: &[Alert],
        events: &[EmergencyEvent],
        samples: &[RiskMetrics],
        recommendations: Vec<String>,
    ) -> Self {
        let mut summary = ReportSummary {
            total_alerts: alerts.len(),
            resolved_alerts: alerts.iter().filter(|a| a.resolved).count(),
            emergency_events: events.len(),
            ..Default::default()
        };

        if !samples.is_empty() {
            summary.max_account_value = samples.iter().map(|m| m.account_value).max().unwrap_or_default();
            summary.min_account_value = samples.iter().map(|m| m.account_value).min().unwrap_or_default();
            summary.max_drawdown = samples.iter().map(|m| m.max_drawdown).max().unwrap_or_default();
            summary.avg_daily_pnl =
                samples.iter().map(|m| m.daily_pnl).sum::<Decimal>() / Decimal::from(samples.len());
        }

        let mut alerts_by_type: BTreeMap<AlertType, Vec<Alert>> = BTreeMap::new();
        for alert in alerts {
            alerts_by_type.entry(alert.alert_type).or_default().push(alert.clone());
        }

        Self {
            period_hours,
            generated_at,
            summary,
            alerts_by_type,
            risk_level_distribution: level_distribution(samples),
            recommendations,
        }
    }
}

fn level_distribution(samples: &[RiskMetrics]) -> BTreeMap<RiskLevel, Decimal> {
    let mut counts: BTreeMap<RiskLevel, u64> = BTreeMap::new();
    for sample in samples {
        *counts.entry(sample.risk_level).or_insert(0) += 1;
    }
    let total = Decimal::from(samples.len());
    counts
        .into_iter()
        .map(|(level, count)| (level, Decimal::from(count) / total))
        .collect()
}

/// Advice derived from the latest metrics and open alerts
pub(crate) fn recommendations(current: Option<&RiskMetrics>, active_alerts: usize) -> Vec<String> {
    let mut advice = Vec::new();
    if let Some(metrics) = current {
        if metrics.risk_level >= RiskLevel::High {
            advice.push("Risk level elevated: reduce exposure or pause trading".to_string());
        }
        if metrics.consecutive_losses >= 3 {
            advice.push("Losing streak in progress: review strategy performance".to_string());
        }
        if metrics.max_drawdown > dec!(0.03) {
            advice.push("Drawdown above 3%: tighten stop-loss placement".to_string());
        }
    }
    if active_alerts > 5 {
        advice.push("Many unresolved alerts: review and resolve them".to_string());
    }
    advice
}

/// Full dump written by `export_risk_data`
#[derive(Debug, Clone, Serialize)]
pub struct RiskExport {
    pub exported_at: DateTime<Utc>,
    pub current_metrics: Option<RiskMetrics>,
    pub limits: RiskLimits,
    pub alerts: Vec<Alert>,
    pub events: Vec<EmergencyEvent>,
    pub total_alerts: u64,
    pub resolved_alerts: u64,
    pub emergency_count: u64,
    pub session_duration_secs: i64,
}
