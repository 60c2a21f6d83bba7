//! Market and account feed types

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A single price tick from the market-data feed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceTick {
    /// Trading symbol (e.g., "AAPL")
    pub symbol: String,
    /// Last trade price
    pub price: Decimal,
    /// Tick timestamp
    pub timestamp: DateTime<Utc>,
    /// Traded volume, when the feed provides it
    #[serde(default)]
    pub volume: Option<Decimal>,
}

impl PriceTick {
    pub fn new(symbol: impl Into<String>, price: Decimal, timestamp: DateTime<Utc>) -> Self {
        Self {
            symbol: symbol.into(),
            price,
            timestamp,
            volume: None,
        }
    }
}

/// Account balances reported by the broker ledger
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountSnapshot {
    /// Uninvested cash
    pub cash: Decimal,
    /// Total account equity (cash + marked positions)
    pub equity: Decimal,
    /// Snapshot timestamp
    pub timestamp: DateTime<Utc>,
}
