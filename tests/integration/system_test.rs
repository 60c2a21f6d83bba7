//! End-to-end flow through the risk system aggregate

use chrono::{Duration, Utc};
use risk_shield::config::Config;
use risk_shield::feed::{AccountSnapshot, PriceTick};
use risk_shield::signal::TradeIntent;
use risk_shield::stops::Trail;
use risk_shield::{RiskSystem, StopPlan};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn snapshot(system: &RiskSystem, realized: Decimal, at: chrono::DateTime<Utc>) -> (AccountSnapshot, Decimal) {
    let positions = system.positions();
    let unrealized: Decimal = positions.iter().map(|p| p.unrealized_pnl).sum();
    let market_value: Decimal = positions.iter().map(|p| p.market_value).sum();
    let daily_pnl = realized + unrealized;
    let equity = dec!(100000) + daily_pnl;
    (
        AccountSnapshot {
            cash: equity - market_value,
            equity,
            timestamp: at,
        },
        daily_pnl,
    )
}

#[test]
fn test_trade_lifecycle_with_trailing_stop() {
    let system = RiskSystem::new(&Config::default()).unwrap();
    let start = Utc::now();
    system.reset_session(dec!(100000), start);

    let intent = TradeIntent::buy("AAPL", 100, dec!(150))
        .with_stop(dec!(147))
        .with_target(dec!(160));
    let decision = system
        .open_position(
            &intent,
            dec!(100000),
            StopPlan::Trailing(Some(Trail::Percent(dec!(0.02)))),
            start,
        )
        .unwrap();
    assert!(decision.allowed, "{}", decision.reason);

    let mut realized = dec!(0);
    let mut exit = None;
    for (i, price) in [dec!(152), dec!(155), dec!(153), dec!(151)].into_iter().enumerate() {
        let at = start + Duration::seconds(i as i64 + 1);
        if let Some(trigger) = system.on_tick(&PriceTick::new("AAPL", price, at)) {
            realized += (trigger.exit.price - dec!(150)) * Decimal::from(trigger.exit.quantity);
            exit = Some(trigger.exit);
        }
        let (snap, daily_pnl) = snapshot(&system, realized, at);
        system.refresh_metrics(&snap, daily_pnl);
    }

    // Stop ratcheted to 151.90 at the 155 high
    let exit = exit.unwrap();
    assert_eq!(exit.price, dec!(151));
    assert_eq!(realized, dec!(100));

    let status = system.status();
    assert_eq!(status.total_trades, 1);
    assert_eq!(status.consecutive_losses, 0);
    assert!(!status.emergency_stop);
    assert!(system.positions().is_empty());
    assert_eq!(system.metrics().daily_pnl, dec!(100));
}

#[test]
fn test_consecutive_stop_outs_halt_trading() {
    let system = RiskSystem::new(&Config::default()).unwrap();
    let now = Utc::now();

    for i in 0..5 {
        let symbol = format!("SYM{i}");
        let intent = TradeIntent::buy(symbol.as_str(), 100, dec!(100)).with_stop(dec!(99));
        let decision = system
            .open_position(&intent, dec!(100000), StopPlan::Fixed(dec!(99)), now)
            .unwrap();
        assert!(decision.allowed, "{}", decision.reason);
        assert!(system
            .on_tick(&PriceTick::new(symbol.as_str(), dec!(98.5), now))
            .is_some());
    }

    let status = system.status();
    assert_eq!(status.consecutive_losses, 5);
    assert!(status.emergency_stop);

    let intent = TradeIntent::buy("NEXT", 10, dec!(100)).with_stop(dec!(99));
    let decision = system
        .open_position(&intent, dec!(100000), StopPlan::None, now)
        .unwrap();
    assert!(!decision.allowed);
    assert!(decision.reason.contains("Emergency stop active"));

    assert!(system.reset_emergency_stop("ops"));
    assert!(system
        .open_position(&intent, dec!(100000), StopPlan::None, now)
        .unwrap()
        .allowed);
}

#[test]
fn test_portfolio_and_stop_views() {
    let system = RiskSystem::new(&Config::default()).unwrap();
    let now = Utc::now();
    let intent = TradeIntent::buy("SPY", 20, dec!(400)).with_stop(dec!(392));
    system
        .open_position(
            &intent,
            dec!(100000),
            StopPlan::AtrBased {
                atr: dec!(4),
                multiplier: None,
            },
            now,
        )
        .unwrap();

    let summary = system.portfolio_summary(dec!(100000));
    assert_eq!(summary.positions_count, 1);
    assert_eq!(summary.total_market_value, dec!(8000));

    assert!(system.update_atr("SPY", dec!(5)));
    let stops = system.stop_summary();
    assert_eq!(stops.active, 1);
    assert_eq!(stops.by_kind.get("atr_based"), Some(&1));
    assert!(system.stop_info("SPY").is_some());
}

#[tokio::test]
async fn test_start_and_stop() {
    let system = RiskSystem::new(&Config::default()).unwrap();
    system.start().unwrap();
    assert!(system.dashboard().monitoring);
    system.stop().await.unwrap();
    assert!(!system.dashboard().monitoring);

    let report = system.report(24);
    assert_eq!(report.period_hours, 24);
}
