//! Per-trade risk estimate

use crate::signal::{Side, TradeIntent};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Risk profile of one proposed trade
///
/// Loss is taken from the stop distance when a stop is set, otherwise from
/// the strategy's loss fraction. Without either the loss is unknown and the
/// loss-based checks are skipped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeRisk {
    pub symbol: String,
    pub side: Side,
    pub quantity: u64,
    pub entry_price: Decimal,
    pub stop_price: Option<Decimal>,
    pub target_price: Option<Decimal>,
    pub estimated_loss_fraction: Option<Decimal>,
}

impl TradeRisk {
    /// Notional value of the trade
    pub fn position_value(&self) -> Decimal {
        Decimal::from(self.quantity) * self.entry_price
    }

    /// Expected loss in account currency
    pub fn estimated_loss(&self, account_value: Decimal) -> Option<Decimal> {
        if let Some(stop) = self.stop_price {
            return Some((self.entry_price - stop).abs() * Decimal::from(self.quantity));
        }
        self.estimated_loss_fraction
            .map(|fraction| fraction.abs() * account_value)
    }

    /// Expected gain in account currency
    pub fn estimated_gain(&self) -> Option<Decimal> {
        self.target_price
            .map(|target| (target - self.entry_price).abs() * Decimal::from(self.quantity))
    }

    /// Gain divided by loss, when both are known and the loss is non-zero
    pub fn risk_reward_ratio(&self, account_value: Decimal) -> Option<Decimal> {
        let loss = self.estimated_loss(account_value)?;
        let gain = self.estimated_gain()?;
        if loss <= Decimal::ZERO {
            return None;
        }
        Some(gain / loss)
    }
}

impl From<&TradeIntent> for TradeRisk {
    fn from(intent: &TradeIntent) -> Self {
        Self {
            symbol: intent.symbol.clone(),
            side: intent.side,
            quantity: intent.quantity,
            entry_price: intent.price,
            stop_price: intent.stop_price,
            target_price: intent.target_price,
            estimated_loss_fraction: intent.estimated_loss_fraction,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_loss_from_stop() {
        let risk = TradeRisk::from(&TradeIntent::buy("AAPL", 100, dec!(150)).with_stop(dec!(147)));
        assert_eq!(risk.estimated_loss(dec!(100000)), Some(dec!(300)));
        assert_eq!(risk.position_value(), dec!(15000));
    }

    #[test]
    fn test_loss_from_fraction() {
        let risk = TradeRisk::from(
            &TradeIntent::buy("TSLA", 5000, dec!(200)).with_loss_fraction(dec!(0.05)),
        );
        assert_eq!(risk.estimated_loss(dec!(100000)), Some(dec!(5000)));
    }

    #[test]
    fn test_stop_takes_precedence_over_fraction() {
        let risk = TradeRisk::from(
            &TradeIntent::buy("AAPL", 10, dec!(100))
                .with_stop(dec!(99))
                .with_loss_fraction(dec!(0.5)),
        );
        assert_eq!(risk.estimated_loss(dec!(100000)), Some(dec!(10)));
    }

    #[test]
    fn test_unknown_loss() {
        let risk = TradeRisk::from(&TradeIntent::buy("AAPL", 10, dec!(100)));
        assert!(risk.estimated_loss(dec!(100000)).is_none());
        assert!(risk.risk_reward_ratio(dec!(100000)).is_none());
    }

    #[test]
    fn test_risk_reward_ratio() {
        let risk = TradeRisk::from(
            &TradeIntent::buy("AAPL", 100, dec!(150))
                .with_stop(dec!(147))
                .with_target(dec!(156)),
        );
        assert_eq!(risk.estimated_gain(), Some(dec!(600)));
        assert_eq!(risk.risk_reward_ratio(dec!(100000)), Some(dec!(2)));
    }
}
