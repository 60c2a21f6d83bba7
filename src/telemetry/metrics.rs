//! Prometheus metrics

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

/// Gauge metric types
#[derive(Debug, Clone, Copy)]
pub enum GaugeMetric {
    /// Current account value
    AccountValue,
    /// Daily P&L
    DailyPnl,
    /// Session max drawdown fraction
    DrawdownPct,
    /// Open position count
    OpenPositions,
    /// Active stop count
    ActiveStops,
    /// Risk level as 0 (low) to 3 (critical)
    RiskLevel,
}

/// Counter metric types
#[derive(Debug, Clone, Copy)]
pub enum CounterMetric {
    TradesAdmitted,
    TradesRejected,
    StopsTriggered,
    Alerts,
    Emergencies,
    /// Monitor cycles that failed
    MonitorErrors,
}

impl GaugeMetric {
    fn name(&self) -> &'static str {
        match self {
            GaugeMetric::AccountValue => "risk_account_value",
            GaugeMetric::DailyPnl => "risk_daily_pnl",
            GaugeMetric::DrawdownPct => "risk_max_drawdown_pct",
            GaugeMetric::OpenPositions => "risk_open_positions",
            GaugeMetric::ActiveStops => "risk_active_stops",
            GaugeMetric::RiskLevel => "risk_level",
        }
    }
}

impl CounterMetric {
    fn name(&self) -> &'static str {
        match self {
            CounterMetric::TradesAdmitted => "risk_trades_admitted_total",
            CounterMetric::TradesRejected => "risk_trades_rejected_total",
            CounterMetric::StopsTriggered => "risk_stops_triggered_total",
            CounterMetric::Alerts => "risk_alerts_total",
            CounterMetric::Emergencies => "risk_emergencies_total",
            CounterMetric::MonitorErrors => "risk_monitor_errors_total",
        }
    }
}

/// Set a gauge value
pub fn set_gauge(metric: GaugeMetric, value: f64) {
    metrics::gauge!(metric.name()).set(value);
}

/// Set a gauge from a decimal value
pub fn set_gauge_decimal(metric: GaugeMetric, value: Decimal) {
    set_gauge(metric, value.to_f64().unwrap_or(0.0));
}

/// Increment a counter by one
pub fn record_counter(metric: CounterMetric) {
    metrics::counter!(metric.name()).increment(1);
}
