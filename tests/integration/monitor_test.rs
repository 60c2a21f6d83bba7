//! Risk monitor behaviour through the public API

use chrono::{Duration, Utc};
use risk_shield::monitor::{AlertType, EmergencyType, MonitorConfig, RiskMonitor};
use risk_shield::risk::{RiskLimits, RiskMetrics};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;

fn limits() -> RiskLimits {
    RiskLimits::builder()
        .with_max_single_loss_pct(dec!(0.005))
        .with_max_daily_loss_pct(dec!(0.02))
        .with_max_position_pct(dec!(0.1))
        .with_min_account_value(dec!(10000))
        .build()
        .unwrap()
}

fn snapshot(loss: Decimal, offset_secs: i64) -> RiskMetrics {
    let mut metrics = RiskMetrics::new(dec!(100000) - loss);
    metrics.daily_pnl = -loss;
    metrics.timestamp = Utc::now() + Duration::seconds(offset_secs);
    metrics
}

#[test]
fn test_escalating_daily_loss_raises_alert_by_breach() {
    let monitor = RiskMonitor::new(limits(), MonitorConfig::default()).unwrap();
    let losses = [dec!(1800), dec!(2000), dec!(2200), dec!(2400), dec!(2600)];

    let mut alerts = Vec::new();
    let mut emergencies = Vec::new();
    let mut alert_before_breach = false;
    for (i, loss) in losses.into_iter().enumerate() {
        assert!(monitor.update_metrics(snapshot(loss, i as i64 + 1)));
        let outcome = monitor.run_cycle().unwrap();
        if loss >= dec!(2000) && !alerts.is_empty() {
            alert_before_breach = true;
        }
        alerts.extend(outcome.alerts);
        emergencies.extend(outcome.emergencies);
    }

    assert!(alert_before_breach);
    assert_eq!(alerts[0].alert_type, AlertType::DailyLossWarning);
    // Repeat breaches fall inside the cooldown
    assert_eq!(emergencies.len(), 1);
    assert_eq!(emergencies[0].event_type, EmergencyType::DailyLossLimit);
}

#[tokio::test]
async fn test_subscribers_receive_alerts() {
    let monitor = RiskMonitor::new(limits(), MonitorConfig::default()).unwrap();
    let mut rx = monitor.alert_receiver();
    let (tx, mut callback_rx) = tokio::sync::mpsc::unbounded_channel();
    monitor
        .on_alert(move |alert| {
            let _ = tx.send(alert.alert_type);
        })
        .unwrap();

    monitor.update_metrics(snapshot(dec!(1700), 1));
    monitor.run_cycle().unwrap();

    assert_eq!(rx.recv().await.unwrap().alert_type, AlertType::DailyLossWarning);
    assert_eq!(callback_rx.recv().await, Some(AlertType::DailyLossWarning));
}

#[test]
fn test_callback_requires_runtime() {
    let monitor = RiskMonitor::new(limits(), MonitorConfig::default()).unwrap();
    assert!(monitor.on_emergency(|_| {}).is_err());
}

#[tokio::test]
async fn test_background_loop_raises_emergency() {
    let config = MonitorConfig {
        check_interval_secs: 1,
        ..Default::default()
    };
    let monitor = Arc::new(RiskMonitor::new(limits(), config).unwrap());
    let mut events = monitor.emergency_receiver();
    monitor.update_metrics(snapshot(dec!(2500), 1));

    monitor.start().unwrap();
    let event = tokio::time::timeout(std::time::Duration::from_secs(5), events.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(event.event_type, EmergencyType::DailyLossLimit);

    monitor.stop().await.unwrap();
    assert!(!monitor.is_running());
    assert_eq!(monitor.get_risk_dashboard().emergency_count, 1);
}

#[test]
fn test_export_writes_json() {
    let monitor = RiskMonitor::new(limits(), MonitorConfig::default()).unwrap();
    monitor.update_metrics(snapshot(dec!(1700), 1));
    monitor.run_cycle().unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("export.json");
    monitor.export_risk_data(&path).unwrap();

    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(json["alerts"].as_array().unwrap().len(), 1);
    assert_eq!(json["total_alerts"], 1);
}
