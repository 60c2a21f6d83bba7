//! Background risk monitor

use super::alerts::{Alert, AlertType, EmergencyEvent, EmergencyType};
use super::notifier::Notifier;
use super::report::{recommendations, RiskDashboard, RiskExport, RiskReport};
use crate::position::Position;
use crate::risk::limits::check_fraction;
use crate::risk::{RiskError, RiskLevel, RiskLimits, RiskMetrics};
use crate::telemetry::{record_counter, CounterMetric};
use chrono::{DateTime, Duration, Utc};
use parking_lot::{Mutex, RwLock};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Monitor settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub check_interval_secs: u64,
    /// Metrics snapshots, alerts and events kept in memory
    pub history_capacity: usize,
    /// Minimum gap between two records of the same kind
    pub alert_cooldown_secs: i64,
    /// Queue size per subscriber
    pub notifier_capacity: usize,
    pub stop_timeout_secs: u64,
    pub drawdown_threshold: Decimal,
    pub concentration_threshold: Decimal,
    /// VaR95 alert level as a fraction of account value
    pub var_threshold_pct: Decimal,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            check_interval_secs: 5,
            history_capacity: 1000,
            alert_cooldown_secs: 300,
            notifier_capacity: 64,
            stop_timeout_secs: 10,
            drawdown_threshold: dec!(0.05),
            concentration_threshold: dec!(0.9),
            var_threshold_pct: dec!(0.03),
        }
    }
}

impl MonitorConfig {
    pub fn validate(&self) -> Result<(), RiskError> {
        if self.check_interval_secs == 0 {
            return Err(RiskError::invalid_limit(
                "check_interval_secs",
                self.check_interval_secs,
                "at least 1",
            ));
        }
        if self.history_capacity == 0 {
            return Err(RiskError::invalid_limit(
                "history_capacity",
                self.history_capacity,
                "at least 1",
            ));
        }
        if self.alert_cooldown_secs < 0 {
            return Err(RiskError::invalid_limit(
                "alert_cooldown_secs",
                self.alert_cooldown_secs,
                "non-negative",
            ));
        }
        check_fraction("drawdown_threshold", self.drawdown_threshold)?;
        check_fraction("concentration_threshold", self.concentration_threshold)?;
        check_fraction("var_threshold_pct", self.var_threshold_pct)?;
        Ok(())
    }
}

/// Records produced by one cycle
#[derive(Debug, Clone, Default)]
pub struct CycleOutcome {
    pub alerts: Vec<Alert>,
    pub emergencies: Vec<EmergencyEvent>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum CheckKey {
    Alert(AlertType),
    Emergency(EmergencyType),
}

enum Finding {
    Alert {
        alert_type: AlertType,
        severity: RiskLevel,
        message: String,
        current: Decimal,
        threshold: Decimal,
        symbol: Option<String>,
    },
    Emergency {
        event_type: EmergencyType,
        description: String,
        impact: Decimal,
    },
}

impl Finding {
    fn key(&self) -> CheckKey {
        match self {
            Finding::Alert { alert_type, .. } => CheckKey::Alert(*alert_type),
            Finding::Emergency { event_type, .. } => CheckKey::Emergency(*event_type),
        }
    }
}

struct MonitorState {
    current: Option<RiskMetrics>,
    history: VecDeque<RiskMetrics>,
    daily_start_value: Decimal,
    open_positions: Vec<String>,
    largest_position: Option<String>,
    alerts: VecDeque<Alert>,
    events: VecDeque<EmergencyEvent>,
    last_fired: HashMap<CheckKey, DateTime<Utc>>,
    total_alerts: u64,
    resolved_alerts: u64,
    emergency_count: u64,
    session_start: DateTime<Utc>,
}

impl MonitorState {
    fn new() -> Self {
        Self {
            current: None,
            history: VecDeque::new(),
            daily_start_value: dec!(0),
            open_positions: Vec::new(),
            largest_position: None,
            alerts: VecDeque::new(),
            events: VecDeque::new(),
            last_fired: HashMap::new(),
            total_alerts: 0,
            resolved_alerts: 0,
            emergency_count: 0,
            session_start: Utc::now(),
        }
    }

    fn active_alerts(&self) -> impl Iterator<Item = &Alert> {
        self.alerts.iter().filter(|a| !a.resolved)
    }
}

struct MonitorTask {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// Samples the latest metrics on an interval and raises alerts
///
/// [`RiskMonitor::update_metrics`] is the only write path for metrics. The
/// background task started by [`RiskMonitor::start`] only reads them.
pub struct RiskMonitor {
    limits: RiskLimits,
    config: MonitorConfig,
    state: RwLock<MonitorState>,
    task: Mutex<Option<MonitorTask>>,
    alert_notifier: Notifier<Alert>,
    emergency_notifier: Notifier<EmergencyEvent>,
    cycle_errors: AtomicU64,
}

impl RiskMonitor {
    /// Create a new risk monitor
    pub fn new(limits: RiskLimits, config: MonitorConfig) -> Result<Self, RiskError> {
        config.validate()?;
        Ok(Self {
            alert_notifier: Notifier::new(config.notifier_capacity),
            emergency_notifier: Notifier::new(config.notifier_capacity),
            limits,
            config,
            state: RwLock::new(MonitorState::new()),
            task: Mutex::new(None),
            cycle_errors: AtomicU64::new(0),
        })
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Push a new metrics snapshot
    ///
    /// Snapshots not newer than the current one are ignored.
    pub fn update_metrics(&self, mut metrics: RiskMetrics) -> bool {
        let mut state = self.state.write();
        if let Some(current) = &state.current {
            if metrics.timestamp <= current.timestamp {
                tracing::warn!(
                    current = %current.timestamp,
                    received = %metrics.timestamp,
                    "Ignoring stale metrics snapshot"
                );
                return false;
            }
        }

        if metrics.session_start_value > dec!(0) {
            state.daily_start_value = metrics.session_start_value;
        } else {
            if state.daily_start_value <= dec!(0) {
                state.daily_start_value = metrics.daily_base_value();
            }
            metrics.session_start_value = state.daily_start_value;
        }
        state.history.push_back(metrics.clone());
        while state.history.len() > self.config.history_capacity {
            state.history.pop_front();
        }
        state.current = Some(metrics);
        true
    }

    /// Open positions for emergency events and concentration alerts
    pub fn update_positions<'a>(&self, positions: impl IntoIterator<Item = &'a Position>) {
        let mut symbols = Vec::new();
        let mut largest: Option<&Position> = None;
        for position in positions {
            symbols.push(position.symbol.clone());
            let bigger = largest.map_or(true, |l| {
                position.market_value > l.market_value
                    || (position.market_value == l.market_value && position.symbol < l.symbol)
            });
            if bigger {
                largest = Some(position);
            }
        }
        symbols.sort();

        let mut state = self.state.write();
        state.open_positions = symbols;
        state.largest_position = largest.map(|p| p.symbol.clone());
    }

    /// Run every threshold check once against the latest snapshot
    pub fn run_cycle(&self) -> Result<CycleOutcome, RiskError> {
        let now = Utc::now();
        let outcome = {
            let mut state = self.state.write();
            let Some(metrics) = state.current.clone() else {
                return Ok(CycleOutcome::default());
            };
            if metrics.account_value <= dec!(0) {
                return Err(RiskError::DegenerateMetrics(format!(
                    "account value {} not positive",
                    metrics.account_value
                )));
            }

            let findings = self.evaluate(&metrics, state.largest_position.as_deref());
            self.record(&mut state, findings, now)
        };

        // Lock released before fan-out
        for alert in &outcome.alerts {
            tracing::warn!(
                alert_type = %alert.alert_type,
                severity = %alert.severity,
                message = %alert.message,
                "Risk alert"
            );
            record_counter(CounterMetric::Alerts);
            self.alert_notifier.publish(alert);
        }
        for event in &outcome.emergencies {
            tracing::error!(
                event_type = %event.event_type,
                description = %event.description,
                "Emergency stop raised"
            );
            record_counter(CounterMetric::Emergencies);
            self.emergency_notifier.publish(event);
        }
        Ok(outcome)
    }

    fn evaluate(&self, metrics: &RiskMetrics, largest_position: Option<&str>) -> Vec<Finding> {
        let mut findings = Vec::new();
        let daily_limit = self.limits.max_daily_loss_pct();

        let loss_pct = metrics.daily_loss_pct();
        if loss_pct > dec!(0) {
            if loss_pct >= daily_limit {
                findings.push(Finding::Emergency {
                    event_type: EmergencyType::DailyLossLimit,
                    description: format!("Daily loss {:.2}% at limit", loss_pct * dec!(100)),
                    impact: metrics.daily_pnl,
                });
            } else if loss_pct >= daily_limit * dec!(0.8) {
                findings.push(Finding::Alert {
                    alert_type: AlertType::DailyLossWarning,
                    severity: RiskLevel::High,
                    message: format!(
                        "Daily loss {:.2}% approaching limit {:.2}%",
                        loss_pct * dec!(100),
                        daily_limit * dec!(100)
                    ),
                    current: loss_pct,
                    threshold: daily_limit,
                    symbol: None,
                });
            }
        }

        if metrics.max_drawdown >= self.config.drawdown_threshold {
            findings.push(Finding::Alert {
                alert_type: AlertType::MaxDrawdown,
                severity: RiskLevel::High,
                message: format!("Drawdown {:.2}%", metrics.max_drawdown * dec!(100)),
                current: metrics.max_drawdown,
                threshold: self.config.drawdown_threshold,
                symbol: None,
            });
        }

        let losses = metrics.consecutive_losses;
        let max_losses = self.limits.max_consecutive_losses();
        if losses >= max_losses {
            findings.push(Finding::Emergency {
                event_type: EmergencyType::ConsecutiveLosses,
                description: format!("{losses} consecutive losses"),
                impact: Decimal::from(losses),
            });
        } else if u64::from(losses) * 5 >= u64::from(max_losses) * 4 {
            findings.push(Finding::Alert {
                alert_type: AlertType::ConsecutiveLossesWarning,
                severity: RiskLevel::Moderate,
                message: format!("{losses} consecutive losses of {max_losses} allowed"),
                current: Decimal::from(losses),
                threshold: Decimal::from(max_losses),
                symbol: None,
            });
        }

        let concentration = metrics.position_pct();
        if concentration > self.config.concentration_threshold {
            findings.push(Finding::Alert {
                alert_type: AlertType::HighPositionConcentration,
                severity: RiskLevel::Moderate,
                message: format!("Positions at {:.1}% of account", concentration * dec!(100)),
                current: concentration,
                threshold: self.config.concentration_threshold,
                symbol: largest_position.map(str::to_string),
            });
        }

        if metrics.account_value < self.limits.min_account_value() {
            findings.push(Finding::Emergency {
                event_type: EmergencyType::LowAccountValue,
                description: format!(
                    "Account value {:.2} below minimum {:.2}",
                    metrics.account_value,
                    self.limits.min_account_value()
                ),
                impact: metrics.account_value,
            });
        }

        let var_threshold = metrics.account_value * self.config.var_threshold_pct;
        if metrics.var_95 > dec!(0) && metrics.var_95 > var_threshold {
            findings.push(Finding::Alert {
                alert_type: AlertType::VarBreach,
                severity: RiskLevel::High,
                message: format!("VaR95 {:.2} above {:.2}", metrics.var_95, var_threshold),
                current: metrics.var_95,
                threshold: var_threshold,
                symbol: None,
            });
        }

        findings
    }

    fn record(&self, state: &mut MonitorState, findings: Vec<Finding>, now: DateTime<Utc>) -> CycleOutcome {
        let cooldown = Duration::seconds(self.config.alert_cooldown_secs);
        let capacity = self.config.history_capacity;
        let mut outcome = CycleOutcome::default();

        for finding in findings {
            let key = finding.key();
            if let Some(last) = state.last_fired.get(&key) {
                if now - *last < cooldown {
                    continue;
                }
            }
            state.last_fired.insert(key, now);

            match finding {
                Finding::Alert {
                    alert_type,
                    severity,
                    message,
                    current,
                    threshold,
                    symbol,
                } => {
                    let mut alert = Alert::new(alert_type, severity, message, current, threshold, now);
                    alert.symbol = symbol;
                    state.alerts.push_back(alert.clone());
                    while state.alerts.len() > capacity {
                        state.alerts.pop_front();
                    }
                    state.total_alerts += 1;
                    outcome.alerts.push(alert);
                }
                Finding::Emergency {
                    event_type,
                    description,
                    impact,
                } => {
                    let event = EmergencyEvent::new(
                        event_type,
                        description,
                        impact,
                        state.open_positions.clone(),
                        now,
                    );
                    state.events.push_back(event.clone());
                    while state.events.len() > capacity {
                        state.events.pop_front();
                    }
                    state.emergency_count += 1;
                    outcome.emergencies.push(event);
                }
            }
        }
        outcome
    }

    /// Spawn the sampling loop on the current Tokio runtime
    pub fn start(self: &Arc<Self>) -> Result<(), RiskError> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| RiskError::NoRuntime)?;
        let mut task = self.task.lock();
        if task.is_some() {
            return Err(RiskError::MonitorAlreadyRunning);
        }

        let (shutdown, mut shutdown_rx) = watch::channel(false);
        let monitor = Arc::clone(self);
        let period = std::time::Duration::from_secs(self.config.check_interval_secs);

        let handle = runtime.spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;

                    _ = shutdown_rx.changed() => break,

                    _ = interval.tick() => {
                        if *shutdown_rx.borrow() {
                            break;
                        }
                        if let Err(e) = monitor.run_cycle() {
                            monitor.cycle_errors.fetch_add(1, Ordering::Relaxed);
                            record_counter(CounterMetric::MonitorErrors);
                            tracing::error!(error = %e, "Risk monitor cycle failed");
                        }
                    }
                }
            }
            tracing::info!("Risk monitor loop exited");
        });

        *task = Some(MonitorTask { shutdown, handle });
        tracing::info!(interval_secs = self.config.check_interval_secs, "Risk monitor started");
        Ok(())
    }

    /// Signal the loop to exit and wait for it
    pub async fn stop(&self) -> Result<(), RiskError> {
        let task = self.task.lock().take();
        let Some(MonitorTask { shutdown, mut handle }) = task else {
            return Ok(());
        };
        // Receiver already gone means the loop has exited
        let _ = shutdown.send(true);

        let timeout = std::time::Duration::from_secs(self.config.stop_timeout_secs);
        match tokio::time::timeout(timeout, &mut handle).await {
            Ok(Ok(())) => {
                tracing::info!("Risk monitor stopped");
                Ok(())
            }
            Ok(Err(e)) => {
                tracing::error!(error = %e, "Risk monitor task failed");
                Ok(())
            }
            Err(_) => {
                handle.abort();
                Err(RiskError::MonitorStopTimeout(timeout))
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.lock().is_some()
    }

    /// Run `callback` for every new alert
    pub fn on_alert<F>(&self, callback: F) -> Result<(), RiskError>
    where
        F: Fn(Alert) + Send + Sync + 'static,
    {
        self.alert_notifier.subscribe_fn(callback)
    }

    /// Run `callback` for every emergency event
    pub fn on_emergency<F>(&self, callback: F) -> Result<(), RiskError>
    where
        F: Fn(EmergencyEvent) + Send + Sync + 'static,
    {
        self.emergency_notifier.subscribe_fn(callback)
    }

    pub fn alert_receiver(&self) -> tokio::sync::mpsc::Receiver<Alert> {
        self.alert_notifier.subscribe()
    }

    pub fn emergency_receiver(&self) -> tokio::sync::mpsc::Receiver<EmergencyEvent> {
        self.emergency_notifier.subscribe()
    }

    /// Mark an alert resolved; false if unknown or already resolved
    pub fn resolve_alert(&self, id: uuid::Uuid, note: &str) -> bool {
        let mut state = self.state.write();
        let resolved = state
            .alerts
            .iter_mut()
            .find(|a| a.id == id)
            .map(|a| a.resolve(note, Utc::now()))
            .unwrap_or(false);
        if resolved {
            state.resolved_alerts += 1;
            tracing::info!(%id, note, "Alert resolved");
        }
        resolved
    }

    pub fn active_alerts(&self) -> Vec<Alert> {
        self.state.read().active_alerts().cloned().collect()
    }

    pub fn current_metrics(&self) -> Option<RiskMetrics> {
        self.state.read().current.clone()
    }

    pub fn cycle_errors(&self) -> u64 {
        self.cycle_errors.load(Ordering::Relaxed)
    }

    pub fn get_risk_dashboard(&self) -> RiskDashboard {
        let monitoring = self.is_running();
        let state = self.state.read();
        let active: Vec<Alert> = state.active_alerts().cloned().collect();
        let recent_active = active[active.len().saturating_sub(10)..].to_vec();
        let recent_events = state
            .events
            .iter()
            .skip(state.events.len().saturating_sub(5))
            .cloned()
            .collect();

        RiskDashboard {
            monitoring,
            session_duration_secs: (Utc::now() - state.session_start).num_seconds(),
            current_risk_level: state
                .current
                .as_ref()
                .map(|m| m.risk_level)
                .unwrap_or_default(),
            current_metrics: state.current.clone(),
            active_alerts_count: active.len(),
            total_alerts: state.total_alerts,
            resolved_alerts: state.resolved_alerts,
            emergency_count: state.emergency_count,
            dropped_notifications: self.alert_notifier.dropped() + self.emergency_notifier.dropped(),
            cycle_errors: self.cycle_errors(),
            active_alerts: recent_active,
            recent_events,
        }
    }

    /// Summarize the trailing `hours`
    pub fn generate_risk_report(&self, hours: u32) -> RiskReport {
        let now = Utc::now();
        let cutoff = now - Duration::hours(i64::from(hours));
        let state = self.state.read();

        let alerts: Vec<Alert> = state
            .alerts
            .iter()
            .filter(|a| a.timestamp >= cutoff)
            .cloned()
            .collect();
        let events: Vec<EmergencyEvent> = state
            .events
            .iter()
            .filter(|e| e.timestamp >= cutoff)
            .cloned()
            .collect();
        let samples: Vec<RiskMetrics> = state
            .history
            .iter()
            .filter(|m| m.timestamp >= cutoff)
            .cloned()
            .collect();
        let advice = recommendations(state.current.as_ref(), state.active_alerts().count());

        RiskReport::build(hours, now, &alerts, &events, &samples, advice)
    }

    /// Write the full monitor state as JSON
    pub fn export_risk_data(&self, path: &Path) -> Result<(), RiskError> {
        let export = {
            let state = self.state.read();
            RiskExport {
                exported_at: Utc::now(),
                current_metrics: state.current.clone(),
                limits: self.limits.clone(),
                alerts: state.alerts.iter().cloned().collect(),
                events: state.events.iter().cloned().collect(),
                total_alerts: state.total_alerts,
                resolved_alerts: state.resolved_alerts,
                emergency_count: state.emergency_count,
                session_duration_secs: (Utc::now() - state.session_start).num_seconds(),
            }
        };

        let file = std::fs::File::create(path)?;
        serde_json::to_writer_pretty(std::io::BufWriter::new(file), &export)?;
        tracing::info!(path = %path.display(), "Risk data exported");
        Ok(())
    }

    /// Re-baseline the day before the next session opens
    pub fn reset_daily_monitoring(&self) {
        let mut state = self.state.write();
        let now = Utc::now();
        let start_value = match state.current.as_mut() {
            Some(current) => {
                current.daily_pnl = dec!(0);
                current.session_start_value = current.account_value;
                current.account_value
            }
            None => dec!(0),
        };
        state.daily_start_value = start_value;

        let mut resolved = 0;
        for alert in state.alerts.iter_mut() {
            if alert.alert_type == AlertType::DailyLossWarning && alert.resolve("session reset", now) {
                resolved += 1;
            }
        }
        state.resolved_alerts += resolved;
        state.last_fired.remove(&CheckKey::Alert(AlertType::DailyLossWarning));
        state.last_fired.remove(&CheckKey::Emergency(EmergencyType::DailyLossLimit));
        tracing::info!(start_value = %state.daily_start_value, "Daily monitoring reset");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits() -> RiskLimits {
        RiskLimits::builder()
            .with_max_daily_loss_pct(dec!(0.02))
            .with_min_account_value(dec!(10000))
            .build()
            .unwrap()
    }

    fn monitor() -> RiskMonitor {
        RiskMonitor::new(limits(), MonitorConfig::default()).unwrap()
    }

    fn snapshot(account: Decimal, daily_pnl: Decimal, offset_secs: i64) -> RiskMetrics {
        let mut metrics = RiskMetrics::new(account);
        metrics.daily_pnl = daily_pnl;
        metrics.timestamp = Utc::now() + Duration::seconds(offset_secs);
        metrics
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = MonitorConfig {
            check_interval_secs: 0,
            ..Default::default()
        };
        assert!(RiskMonitor::new(limits(), config).is_err());
    }

    #[test]
    fn test_stale_snapshot_ignored() {
        let monitor = monitor();
        assert!(monitor.update_metrics(snapshot(dec!(100000), dec!(0), 10)));
        assert!(!monitor.update_metrics(snapshot(dec!(90000), dec!(0), 5)));
        assert_eq!(monitor.current_metrics().unwrap().account_value, dec!(100000));
    }

    #[test]
    fn test_cycle_without_metrics() {
        let monitor = monitor();
        let outcome = monitor.run_cycle().unwrap();
        assert!(outcome.alerts.is_empty());
    }

    #[test]
    fn test_degenerate_account_is_error() {
        let monitor = monitor();
        monitor.update_metrics(snapshot(dec!(0), dec!(0), 1));
        assert!(matches!(monitor.run_cycle(), Err(RiskError::DegenerateMetrics(_))));
    }

    #[test]
    fn test_daily_loss_warning_then_emergency() {
        let monitor = monitor();
        let mut rx = monitor.alert_receiver();
        let mut emergencies = monitor.emergency_receiver();

        // 1.7% of a 100k start: warning
        monitor.update_metrics(snapshot(dec!(98300), dec!(-1700), 1));
        let outcome = monitor.run_cycle().unwrap();
        assert_eq!(outcome.alerts.len(), 1);
        assert_eq!(outcome.alerts[0].alert_type, AlertType::DailyLossWarning);
        assert_eq!(outcome.alerts[0].severity, RiskLevel::High);
        assert!(rx.try_recv().is_ok());

        // Same condition inside the cooldown is suppressed
        monitor.update_metrics(snapshot(dec!(98200), dec!(-1800), 2));
        assert!(monitor.run_cycle().unwrap().alerts.is_empty());

        monitor.update_metrics(snapshot(dec!(97900), dec!(-2100), 3));
        let outcome = monitor.run_cycle().unwrap();
        assert_eq!(outcome.emergencies.len(), 1);
        assert_eq!(outcome.emergencies[0].event_type, EmergencyType::DailyLossLimit);
        assert!(emergencies.try_recv().is_ok());
    }

    #[test]
    fn test_daily_loss_uses_snapshot_session_start() {
        let monitor = monitor();
        // 1500 of a 100k start is 1.5%, under the 1.6% warning line.
        // Against 92000 + 1500 it would read 1.604%.
        let mut metrics = snapshot(dec!(92000), dec!(-1500), 1);
        metrics.session_start_value = dec!(100000);
        monitor.update_metrics(metrics);
        assert!(monitor.run_cycle().unwrap().alerts.is_empty());

        // Snapshots without a start value inherit the latched one
        monitor.update_metrics(snapshot(dec!(91900), dec!(-1700), 2));
        assert_eq!(
            monitor.current_metrics().unwrap().session_start_value,
            dec!(100000)
        );
        let outcome = monitor.run_cycle().unwrap();
        assert_eq!(outcome.alerts[0].alert_type, AlertType::DailyLossWarning);
    }

    #[test]
    fn test_consecutive_loss_thresholds() {
        let monitor = monitor();
        let mut metrics = snapshot(dec!(100000), dec!(0), 1);
        metrics.consecutive_losses = 4;
        monitor.update_metrics(metrics);
        let outcome = monitor.run_cycle().unwrap();
        assert_eq!(outcome.alerts[0].alert_type, AlertType::ConsecutiveLossesWarning);

        let mut metrics = snapshot(dec!(100000), dec!(0), 2);
        metrics.consecutive_losses = 5;
        monitor.update_metrics(metrics);
        let outcome = monitor.run_cycle().unwrap();
        assert_eq!(outcome.emergencies[0].event_type, EmergencyType::ConsecutiveLosses);
    }

    #[test]
    fn test_drawdown_concentration_var_and_account_checks() {
        let monitor = monitor();
        let mut ledger = crate::position::PositionManager::default();
        ledger.add_position("AAPL", 50, dec!(170), Utc::now()).unwrap();
        monitor.update_positions(ledger.positions().values());
        let mut metrics = snapshot(dec!(9000), dec!(0), 1);
        metrics.max_drawdown = dec!(0.06);
        metrics.position_value = dec!(8500);
        metrics.var_95 = dec!(500);
        monitor.update_metrics(metrics);

        let outcome = monitor.run_cycle().unwrap();
        let types: Vec<AlertType> = outcome.alerts.iter().map(|a| a.alert_type).collect();
        assert!(types.contains(&AlertType::MaxDrawdown));
        assert!(types.contains(&AlertType::HighPositionConcentration));
        assert!(types.contains(&AlertType::VarBreach));
        assert_eq!(outcome.emergencies[0].event_type, EmergencyType::LowAccountValue);
        assert_eq!(outcome.emergencies[0].affected_positions, vec!["AAPL".to_string()]);
    }

    #[test]
    fn test_concentration_alert_names_largest_position() {
        let monitor = monitor();
        let mut ledger = crate::position::PositionManager::default();
        let now = Utc::now();
        ledger.add_position("AAPL", 100, dec!(150), now).unwrap();
        ledger.add_position("NVDA", 10, dec!(800), now).unwrap();
        ledger.add_position("MSFT", 30, dec!(400), now).unwrap();
        monitor.update_positions(ledger.positions().values());

        let mut metrics = snapshot(dec!(40000), dec!(0), 1);
        metrics.position_value = dec!(39000);
        monitor.update_metrics(metrics);

        let outcome = monitor.run_cycle().unwrap();
        let alert = outcome
            .alerts
            .iter()
            .find(|a| a.alert_type == AlertType::HighPositionConcentration)
            .unwrap();
        assert_eq!(alert.symbol.as_deref(), Some("AAPL"));
        assert_eq!(
            outcome.alerts.iter().filter(|a| a.symbol.is_some()).count(),
            1
        );
        assert_eq!(
            monitor.get_risk_dashboard().active_alerts[0].symbol.as_deref(),
            Some("AAPL")
        );
    }

    #[test]
    fn test_resolve_alert_idempotent() {
        let monitor = monitor();
        let mut metrics = snapshot(dec!(100000), dec!(0), 1);
        metrics.max_drawdown = dec!(0.08);
        monitor.update_metrics(metrics);
        let id = monitor.run_cycle().unwrap().alerts[0].id;

        assert!(monitor.resolve_alert(id, "reviewed"));
        assert!(!monitor.resolve_alert(id, "reviewed"));
        assert!(!monitor.resolve_alert(uuid::Uuid::new_v4(), ""));
        assert!(monitor.active_alerts().is_empty());
        assert_eq!(monitor.get_risk_dashboard().resolved_alerts, 1);
    }

    #[test]
    fn test_dashboard_and_report() {
        let monitor = monitor();
        let mut metrics = snapshot(dec!(100000), dec!(-500), 1);
        metrics.max_drawdown = dec!(0.06);
        metrics.risk_level = RiskLevel::High;
        monitor.update_metrics(metrics);
        monitor.run_cycle().unwrap();

        let dashboard = monitor.get_risk_dashboard();
        assert!(!dashboard.monitoring);
        assert_eq!(dashboard.active_alerts_count, 1);
        assert_eq!(dashboard.current_risk_level, RiskLevel::High);

        let report = monitor.generate_risk_report(24);
        assert_eq!(report.summary.total_alerts, 1);
        assert_eq!(report.summary.avg_daily_pnl, dec!(-500));
        assert!(!report.recommendations.is_empty());
    }

    #[test]
    fn test_reset_daily_monitoring() {
        let monitor = monitor();
        monitor.update_metrics(snapshot(dec!(98300), dec!(-1700), 1));
        monitor.run_cycle().unwrap();
        assert_eq!(monitor.active_alerts().len(), 1);

        monitor.reset_daily_monitoring();
        assert!(monitor.active_alerts().is_empty());
        assert_eq!(monitor.current_metrics().unwrap().daily_pnl, dec!(0));

        // New baseline is the current account value
        monitor.update_metrics(snapshot(dec!(96700), dec!(-1600), 2));
        let outcome = monitor.run_cycle().unwrap();
        assert_eq!(outcome.alerts[0].alert_type, AlertType::DailyLossWarning);
    }

    #[test]
    fn test_export_risk_data() {
        let monitor = monitor();
        monitor.update_metrics(snapshot(dec!(100000), dec!(0), 1));
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("risk.json");

        monitor.export_risk_data(&path).unwrap();
        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert!(json["limits"].is_object());
        assert!(json["current_metrics"].is_object());
    }

    #[tokio::test]
    async fn test_start_stop_lifecycle() {
        let config = MonitorConfig {
            check_interval_secs: 1,
            ..Default::default()
        };
        let monitor = Arc::new(RiskMonitor::new(limits(), config).unwrap());
        monitor.start().unwrap();
        assert!(monitor.is_running());
        assert!(matches!(monitor.start(), Err(RiskError::MonitorAlreadyRunning)));

        monitor.stop().await.unwrap();
        assert!(!monitor.is_running());
        // Second stop is a no-op
        monitor.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_loop_counts_cycle_errors() {
        let config = MonitorConfig {
            check_interval_secs: 1,
            ..Default::default()
        };
        let monitor = Arc::new(RiskMonitor::new(limits(), config).unwrap());
        monitor.update_metrics(snapshot(dec!(-5), dec!(0), 1));
        monitor.start().unwrap();

        // First tick fires immediately
        for _ in 0..50 {
            if monitor.cycle_errors() > 0 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
        assert!(monitor.cycle_errors() >= 1);
        assert!(monitor.is_running());
        monitor.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_slow_alert_callback_keeps_cadence() {
        let config = MonitorConfig {
            check_interval_secs: 1,
            alert_cooldown_secs: 0,
            ..Default::default()
        };
        let monitor = Arc::new(RiskMonitor::new(limits(), config).unwrap());
        let mut metrics = snapshot(dec!(100000), dec!(0), 1);
        metrics.max_drawdown = dec!(0.10);
        monitor.update_metrics(metrics);
        monitor
            .on_alert(|_| std::thread::sleep(std::time::Duration::from_secs(2)))
            .unwrap();

        let started = std::time::Instant::now();
        monitor.start().unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(3500)).await;
        let elapsed = started.elapsed();
        monitor.stop().await.unwrap();

        // Ticks at 0, 1, 2 and 3 seconds, one drawdown alert each
        assert!(elapsed < std::time::Duration::from_millis(4500), "{elapsed:?}");
        assert!(monitor.get_risk_dashboard().total_alerts >= 3);
    }
}
