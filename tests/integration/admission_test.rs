//! Admission control and sizing through the public API

use chrono::Utc;
use risk_shield::position::{PositionLimits, PositionManager, SizingMethod};
use risk_shield::risk::{RiskController, RiskError, RiskLimits, TradeRisk};
use risk_shield::signal::TradeIntent;
use rust_decimal_macros::dec;

fn limits() -> RiskLimits {
    RiskLimits::builder()
        .with_max_single_loss_pct(dec!(0.005))
        .with_max_daily_loss_pct(dec!(0.02))
        .with_max_position_pct(dec!(0.1))
        .with_min_account_value(dec!(10000))
        .build()
        .unwrap()
}

#[test]
fn test_stop_bounded_trade_admitted() {
    let controller = RiskController::new(limits());
    let trade = TradeRisk::from(&TradeIntent::buy("AAPL", 100, dec!(150.0)).with_stop(dec!(147.0)));

    assert_eq!(trade.estimated_loss(dec!(100000)), Some(dec!(300)));
    let decision = controller.validate_trade(&trade, dec!(100000));
    assert!(decision.allowed, "{}", decision.reason);
}

#[test]
fn test_oversized_loss_fraction_rejected() {
    let controller = RiskController::new(limits());
    let trade = TradeRisk::from(
        &TradeIntent::buy("TSLA", 5000, dec!(200.0)).with_loss_fraction(dec!(0.05)),
    );

    let decision = controller.validate_trade(&trade, dec!(100000));
    assert!(!decision.allowed);
    assert!(decision.reason.contains("Single-trade loss"));
}

#[test]
fn test_emergency_stop_persists_until_operator_reset() {
    let mut controller = RiskController::new(limits());
    for _ in 0..5 {
        controller.record_trade_result(dec!(-100));
    }
    assert!(controller.is_emergency_stopped());

    // Recovering metrics do not lift the halt
    let now = Utc::now();
    controller.update_metrics(dec!(120000), std::iter::empty(), dec!(2000), now);
    let trade = TradeRisk::from(&TradeIntent::buy("AAPL", 10, dec!(150)).with_stop(dec!(149)));
    let decision = controller.validate_trade(&trade, dec!(120000));
    assert!(!decision.allowed);
    assert!(decision.reason.contains("Emergency stop active"));

    controller.reset_session(dec!(120000), now);
    assert!(controller.is_emergency_stopped());

    assert!(controller.reset_emergency_stop("ops"));
    assert!(controller.validate_trade(&trade, dec!(120000)).allowed);
}

#[test]
fn test_invalid_limits_fail_at_construction() {
    let err = RiskLimits::builder()
        .with_max_position_pct(dec!(1.2))
        .build()
        .unwrap_err();
    assert!(matches!(err, RiskError::InvalidLimit { .. }));

    let limits = PositionLimits {
        max_single_position_pct: dec!(0),
        ..PositionLimits::default()
    };
    assert!(PositionManager::new(limits).is_err());
}

#[test]
fn test_kelly_without_history_falls_back_to_two_percent() {
    let manager = PositionManager::default();
    let quantity = manager.calculate_position_size(
        "AAPL",
        dec!(100),
        dec!(100000),
        &SizingMethod::KellyCriterion,
    );
    assert_eq!(quantity, 20);
}

#[test]
fn test_atr_sizing() {
    let manager = PositionManager::default();
    let method = SizingMethod::AtrBased {
        atr: dec!(2.5),
        risk_pct: dec!(0.01),
        atr_multiplier: dec!(2),
    };
    // 1000 risked over 5.00 per share
    assert_eq!(
        manager.calculate_position_size("F", dec!(20), dec!(100000), &method),
        200
    );
    // Capped at 10% of the account
    assert_eq!(
        manager.calculate_position_size("AAPL", dec!(100), dec!(100000), &method),
        100
    );
}

#[test]
fn test_ledger_limits_after_open() {
    let mut manager = PositionManager::default();
    let now = Utc::now();
    manager.add_position("AAPL", 50, dec!(150), now).unwrap();

    assert!(manager
        .check_position_limits("MSFT", 20, dec!(300), dec!(100000))
        .allowed);
    assert!(!manager
        .check_position_limits("MSFT", 100, dec!(300), dec!(100000))
        .allowed);
    assert!(manager.add_position("AAPL", 10, dec!(150), now).is_err());
}
