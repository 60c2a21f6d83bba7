//! Stop rule variants and trigger evaluation

use crate::risk::RiskLevel;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Why a stop fired
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerReason {
    /// Price traded at or through the stop
    PriceBreach,
    /// Position held longer than allowed
    HoldTimeElapsed,
}

impl TriggerReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerReason::PriceBreach => "price_breach",
            TriggerReason::HoldTimeElapsed => "hold_time_elapsed",
        }
    }
}

/// Result of evaluating a stop against a tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerResult {
    Hold,
    Trigger(TriggerReason),
}

impl TriggerResult {
    pub fn is_triggered(&self) -> bool {
        matches!(self, TriggerResult::Trigger(_))
    }
}

/// Behaviour shared by every stop variant
pub trait StopRule {
    /// Current trigger price
    fn stop_price(&self) -> Decimal;

    /// Feed the latest price into the rule before evaluation
    fn observe(&mut self, _price: Decimal) {}

    /// Decide whether the stop fires at this price and time
    fn evaluate(&self, price: Decimal, _now: DateTime<Utc>, _created_at: DateTime<Utc>) -> TriggerResult {
        if price <= self.stop_price() {
            TriggerResult::Trigger(TriggerReason::PriceBreach)
        } else {
            TriggerResult::Hold
        }
    }
}

/// Static stop price
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixedStop {
    pub stop_price: Decimal,
}

impl StopRule for FixedStop {
    fn stop_price(&self) -> Decimal {
        self.stop_price
    }
}

/// Trailing distance below the high-water mark
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Trail {
    /// Fraction of the highest price
    Percent(Decimal),
    /// Absolute price distance
    Amount(Decimal),
}

impl Trail {
    fn stop_below(&self, price: Decimal) -> Decimal {
        match self {
            Trail::Percent(pct) => price * (Decimal::ONE - *pct),
            Trail::Amount(amount) => price - *amount,
        }
    }
}

/// Stop that ratchets up behind the highest price seen
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrailingStop {
    pub trail: Trail,
    pub highest_price: Decimal,
    pub stop_price: Decimal,
}

impl TrailingStop {
    pub fn new(entry_price: Decimal, trail: Trail) -> Self {
        Self {
            trail,
            highest_price: entry_price,
            stop_price: trail.stop_below(entry_price),
        }
    }
}

impl StopRule for TrailingStop {
    fn stop_price(&self) -> Decimal {
        self.stop_price
    }

    fn observe(&mut self, price: Decimal) {
        if price > self.highest_price {
            self.highest_price = price;
            // Never lower the stop
            self.stop_price = self.stop_price.max(self.trail.stop_below(price));
        }
    }
}

/// Price stop with a maximum holding period
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeStop {
    pub stop_price: Decimal,
    pub max_hold_secs: i64,
}

impl TimeStop {
    pub fn max_hold(&self) -> Duration {
        Duration::seconds(self.max_hold_secs)
    }
}

impl StopRule for TimeStop {
    fn stop_price(&self) -> Decimal {
        self.stop_price
    }

    fn evaluate(&self, price: Decimal, now: DateTime<Utc>, created_at: DateTime<Utc>) -> TriggerResult {
        if price <= self.stop_price {
            TriggerResult::Trigger(TriggerReason::PriceBreach)
        } else if now - created_at >= self.max_hold() {
            TriggerResult::Trigger(TriggerReason::HoldTimeElapsed)
        } else {
            TriggerResult::Hold
        }
    }
}

/// Stop kept `atr * multiplier` below the latest price
///
/// Moves with volatility in both directions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AtrStop {
    pub atr_multiplier: Decimal,
    pub current_atr: Decimal,
    pub stop_price: Decimal,
}

impl AtrStop {
    pub fn new(entry_price: Decimal, current_atr: Decimal, atr_multiplier: Decimal) -> Self {
        Self {
            atr_multiplier,
            current_atr,
            stop_price: entry_price - current_atr * atr_multiplier,
        }
    }

    pub fn distance(&self) -> Decimal {
        self.current_atr * self.atr_multiplier
    }
}

impl StopRule for AtrStop {
    fn stop_price(&self) -> Decimal {
        self.stop_price
    }

    fn observe(&mut self, price: Decimal) {
        self.stop_price = price - self.distance();
    }
}

/// Stop variant picked from the account's risk level
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SmartStop {
    pub risk_level: RiskLevel,
    pub inner: Box<StopKind>,
}

impl StopRule for SmartStop {
    fn stop_price(&self) -> Decimal {
        self.inner.stop_price()
    }

    fn observe(&mut self, price: Decimal) {
        self.inner.observe(price);
    }

    fn evaluate(&self, price: Decimal, now: DateTime<Utc>, created_at: DateTime<Utc>) -> TriggerResult {
        self.inner.evaluate(price, now, created_at)
    }
}

/// Every supported stop rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StopKind {
    Fixed(FixedStop),
    Trailing(TrailingStop),
    TimeBased(TimeStop),
    AtrBased(AtrStop),
    Smart(SmartStop),
}

impl StopKind {
    pub fn name(&self) -> &'static str {
        match self {
            StopKind::Fixed(_) => "fixed",
            StopKind::Trailing(_) => "trailing",
            StopKind::TimeBased(_) => "time_based",
            StopKind::AtrBased(_) => "atr_based",
            StopKind::Smart(_) => "smart",
        }
    }

    fn rule(&self) -> &dyn StopRule {
        match self {
            StopKind::Fixed(rule) => rule,
            StopKind::Trailing(rule) => rule,
            StopKind::TimeBased(rule) => rule,
            StopKind::AtrBased(rule) => rule,
            StopKind::Smart(rule) => rule,
        }
    }

    fn rule_mut(&mut self) -> &mut dyn StopRule {
        match self {
            StopKind::Fixed(rule) => rule,
            StopKind::Trailing(rule) => rule,
            StopKind::TimeBased(rule) => rule,
            StopKind::AtrBased(rule) => rule,
            StopKind::Smart(rule) => rule,
        }
    }

    /// Refresh the ATR input; no-op for rules without one
    pub fn set_atr(&mut self, atr: Decimal) -> bool {
        match self {
            StopKind::AtrBased(rule) => {
                rule.current_atr = atr;
                true
            }
            StopKind::Smart(rule) => rule.inner.set_atr(atr),
            _ => false,
        }
    }

    /// High-water mark for trailing rules
    pub fn highest_price(&self) -> Option<Decimal> {
        match self {
            StopKind::Trailing(rule) => Some(rule.highest_price),
            StopKind::Smart(rule) => rule.inner.highest_price(),
            _ => None,
        }
    }
}

impl StopRule for StopKind {
    fn stop_price(&self) -> Decimal {
        self.rule().stop_price()
    }

    fn observe(&mut self, price: Decimal) {
        self.rule_mut().observe(price);
    }

    fn evaluate(&self, price: Decimal, now: DateTime<Utc>, created_at: DateTime<Utc>) -> TriggerResult {
        self.rule().evaluate(price, now, created_at)
    }
}

/// Stop distance as a fraction of entry for each risk level
pub fn smart_stop_pct(level: RiskLevel) -> Decimal {
    match level {
        RiskLevel::Low => dec!(0.008),
        RiskLevel::Moderate => dec!(0.015),
        RiskLevel::High => dec!(0.010),
        RiskLevel::Critical => dec!(0.005),
    }
}
