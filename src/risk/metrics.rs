//! Account risk snapshot

use super::types::RiskLevel;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Point-in-time account risk metrics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskMetrics {
    /// When the snapshot was taken
    pub timestamp: DateTime<Utc>,
    /// Total account value
    pub account_value: Decimal,
    /// Cash not tied up in positions
    pub available_cash: Decimal,
    /// Marked value of open positions
    pub position_value: Decimal,
    /// Unrealized P&L of open positions
    pub unrealized_pnl: Decimal,
    /// Realized P&L of closed trades this session
    pub realized_pnl: Decimal,
    /// P&L since the session started
    pub daily_pnl: Decimal,
    /// Account value when the session started; 0 means unknown
    #[serde(default)]
    pub session_start_value: Decimal,
    /// Largest peak-to-current decline this session
    pub max_drawdown: Decimal,
    /// Losing trades in a row
    pub consecutive_losses: u32,
    /// Trades recorded
    pub total_trades: u64,
    /// One-day 95% value-at-risk in account currency
    pub var_95: Decimal,
    /// Derived risk classification
    pub risk_level: RiskLevel,
}

impl RiskMetrics {
    /// Fresh snapshot for a session starting at the given account value
    pub fn new(account_value: Decimal) -> Self {
        Self {
            timestamp: Utc::now(),
            account_value,
            available_cash: account_value,
            position_value: dec!(0),
            unrealized_pnl: dec!(0),
            realized_pnl: dec!(0),
            daily_pnl: dec!(0),
            session_start_value: dec!(0),
            max_drawdown: dec!(0),
            consecutive_losses: 0,
            total_trades: 0,
            var_95: dec!(0),
            risk_level: RiskLevel::Low,
        }
    }

    /// Share of the account held in positions
    pub fn position_pct(&self) -> Decimal {
        if self.account_value <= dec!(0) {
            return dec!(0);
        }
        self.position_value / self.account_value
    }

    /// Value the daily loss is measured against
    ///
    /// `session_start_value` when known, otherwise backed out of the
    /// current value and the session P&L.
    pub fn daily_base_value(&self) -> Decimal {
        if self.session_start_value > dec!(0) {
            self.session_start_value
        } else {
            self.account_value - self.daily_pnl
        }
    }

    /// Session loss as a positive fraction of the session-start value
    /// (0 when flat or up)
    pub fn daily_loss_pct(&self) -> Decimal {
        let base = self.daily_base_value();
        if self.account_value <= dec!(0) || base <= dec!(0) || self.daily_pnl >= dec!(0) {
            return dec!(0);
        }
        -self.daily_pnl / base
    }
}

impl Default for RiskMetrics {
    fn default() -> Self {
        Self::new(dec!(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_metrics() {
        let metrics = RiskMetrics::new(dec!(100000));
        assert_eq!(metrics.available_cash, dec!(100000));
        assert_eq!(metrics.risk_level, RiskLevel::Low);
        assert_eq!(metrics.position_pct(), dec!(0));
    }

    #[test]
    fn test_daily_loss_pct() {
        // 1500 lost from a 100000 start
        let mut metrics = RiskMetrics::new(dec!(98500));
        metrics.daily_pnl = dec!(-1500);
        assert_eq!(metrics.daily_base_value(), dec!(100000));
        assert_eq!(metrics.daily_loss_pct(), dec!(0.015));

        metrics.daily_pnl = dec!(500);
        assert_eq!(metrics.daily_loss_pct(), dec!(0));
    }

    #[test]
    fn test_daily_loss_uses_session_start() {
        let mut metrics = RiskMetrics::new(dec!(90000));
        metrics.daily_pnl = dec!(-2000);
        metrics.session_start_value = dec!(100000);
        assert_eq!(metrics.daily_loss_pct(), dec!(0.02));
    }

    #[test]
    fn test_zero_account_is_safe() {
        let mut metrics = RiskMetrics::default();
        metrics.position_value = dec!(100);
        metrics.daily_pnl = dec!(-100);
        assert_eq!(metrics.position_pct(), dec!(0));
        assert_eq!(metrics.daily_loss_pct(), dec!(0));
    }
}
