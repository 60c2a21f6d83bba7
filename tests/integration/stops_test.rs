//! Stop-loss lifecycle through the public API

use chrono::{Duration, Utc};
use risk_shield::risk::RiskLevel;
use risk_shield::stops::{StopKind, StopLossConfig, StopLossManager, StopOutcome, StopStatus, Trail, TriggerReason};
use rust_decimal_macros::dec;

fn manager() -> StopLossManager {
    StopLossManager::new(StopLossConfig::default(), dec!(0.005)).unwrap()
}

#[test]
fn test_trailing_stop_ratchets_then_fires() {
    let mut stops = manager();
    let now = Utc::now();
    stops
        .create_trailing_stop("AAPL", 100, dec!(100), Some(Trail::Percent(dec!(0.05))), now)
        .unwrap();

    let mut last_stop = dec!(95);
    for price in [dec!(104), dec!(110), dec!(107), dec!(112), dec!(108)] {
        match stops.update_price("AAPL", price, now) {
            StopOutcome::Holding { stop_price } => {
                assert!(stop_price >= last_stop);
                last_stop = stop_price;
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }
    assert_eq!(last_stop, dec!(106.40));

    let trigger = stops.update_price("AAPL", dec!(106), now).into_trigger().unwrap();
    assert_eq!(trigger.exit.price, dec!(106));
    assert_eq!(trigger.exit.reason, TriggerReason::PriceBreach);
    assert!(stops.stop_info("AAPL").is_none());

    // Terminal: further ticks are not tracked
    assert!(!stops.update_price("AAPL", dec!(90), now).is_tracked());
}

#[test]
fn test_time_stop_fires_regardless_of_price() {
    let mut stops = manager();
    let created = Utc::now();
    stops
        .create_time_stop("MSFT", 10, dec!(300), dec!(290), Some(Duration::hours(1)), created)
        .unwrap();

    assert!(matches!(
        stops.update_price("MSFT", dec!(320), created + Duration::minutes(59)),
        StopOutcome::Holding { .. }
    ));
    let trigger = stops
        .update_price("MSFT", dec!(320), created + Duration::hours(1))
        .into_trigger()
        .unwrap();
    assert_eq!(trigger.exit.reason, TriggerReason::HoldTimeElapsed);
    assert_eq!(trigger.order.status, StopStatus::Triggered);
}

#[test]
fn test_stop_above_entry_rejected() {
    let mut stops = manager();
    assert!(stops
        .create_fixed_stop("AAPL", 100, dec!(150), dec!(151), Utc::now())
        .is_err());
    assert_eq!(stops.active_count(), 0);
}

#[test]
fn test_smart_stop_respects_loss_budget() {
    let mut stops = manager();
    let now = Utc::now();
    // Level distance 15.00 per share, budget 500 / 1000 shares = 0.50
    let order = stops
        .create_smart_stop("NVDA", 1000, dec!(1000), RiskLevel::Moderate, dec!(100000), now)
        .unwrap();
    assert_eq!(order.stop_price(), dec!(999.5));
    assert!(order.risk_amount() <= dec!(500));

    let low = stops
        .create_smart_stop("AMD", 10, dec!(100), RiskLevel::Low, dec!(100000), now)
        .unwrap();
    assert!(matches!(low.rule, StopKind::Trailing(_) | StopKind::Smart(_)));
    assert_eq!(low.stop_price(), dec!(99.2));
}

#[test]
fn test_replace_cancel_and_expire() {
    let mut stops = manager();
    let now = Utc::now();
    stops.create_fixed_stop("AAPL", 100, dec!(150), dec!(145), now).unwrap();
    stops.create_fixed_stop("AAPL", 100, dec!(150), dec!(146), now).unwrap();
    stops.create_fixed_stop("MSFT", 10, dec!(300), dec!(290), now).unwrap();
    assert_eq!(stops.stop_info("AAPL").unwrap().stop_price(), dec!(146));

    let removed = stops.remove_stop("MSFT", now).unwrap();
    assert_eq!(removed.status, StopStatus::Cancelled);

    let expired = stops.expire_all(now);
    assert_eq!(expired.len(), 1);

    let summary = stops.summary();
    assert_eq!(summary.active, 0);
    assert_eq!(summary.cancelled, 2);
    assert_eq!(summary.expired, 1);
}
