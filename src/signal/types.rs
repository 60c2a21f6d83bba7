//! Trade intent types

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Trading side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// Open or add to a long position
    Buy,
    /// Reduce or close a long position
    Sell,
}

/// A proposed trade emitted by a strategy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeIntent {
    /// Trading symbol
    pub symbol: String,
    /// Trade direction
    pub side: Side,
    /// Number of shares
    pub quantity: u64,
    /// Intended entry price
    pub price: Decimal,
    /// Protective stop price, if the strategy set one
    #[serde(default)]
    pub stop_price: Option<Decimal>,
    /// Profit target, if the strategy set one
    #[serde(default)]
    pub target_price: Option<Decimal>,
    /// Strategy's own loss estimate as a fraction of account value
    #[serde(default)]
    pub estimated_loss_fraction: Option<Decimal>,
}

impl TradeIntent {
    /// Create a buy intent without stop or target
    pub fn buy(symbol: impl Into<String>, quantity: u64, price: Decimal) -> Self {
        Self {
            symbol: symbol.into(),
            side: Side::Buy,
            quantity,
            price,
            stop_price: None,
            target_price: None,
            estimated_loss_fraction: None,
        }
    }

    /// Set the protective stop price
    pub fn with_stop(mut self, stop_price: Decimal) -> Self {
        self.stop_price = Some(stop_price);
        self
    }

    /// Set the profit target
    pub fn with_target(mut self, target_price: Decimal) -> Self {
        self.target_price = Some(target_price);
        self
    }

    /// Set the estimated loss as a fraction of account value
    pub fn with_loss_fraction(mut self, fraction: Decimal) -> Self {
        self.estimated_loss_fraction = Some(fraction);
        self
    }
}
