//! Stop order lifecycle

use super::rules::{StopKind, StopRule, TriggerReason, TriggerResult};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stop order status
///
/// Orders are active from creation; every other state is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopStatus {
    Active,
    Triggered,
    Cancelled,
    Expired,
}

impl StopStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, StopStatus::Active)
    }
}

/// Protective stop on a long position
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StopOrder {
    pub id: Uuid,
    pub symbol: String,
    pub quantity: u64,
    pub entry_price: Decimal,
    pub created_at: DateTime<Utc>,
    pub status: StopStatus,
    pub rule: StopKind,
    /// Price that fired the stop
    pub trigger_price: Option<Decimal>,
    pub trigger_reason: Option<TriggerReason>,
    /// When the order left the active state
    pub closed_at: Option<DateTime<Utc>>,
}

impl StopOrder {
    pub(crate) fn new(
        symbol: &str,
        quantity: u64,
        entry_price: Decimal,
        rule: StopKind,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            symbol: symbol.to_string(),
            quantity,
            entry_price,
            created_at,
            status: StopStatus::Active,
            rule,
            trigger_price: None,
            trigger_reason: None,
            closed_at: None,
        }
    }

    pub fn stop_price(&self) -> Decimal {
        self.rule.stop_price()
    }

    pub fn is_active(&self) -> bool {
        self.status == StopStatus::Active
    }

    /// Apply a tick and evaluate the trigger
    ///
    /// Terminal orders ignore ticks.
    pub(crate) fn on_price(&mut self, price: Decimal, now: DateTime<Utc>) -> TriggerResult {
        if !self.is_active() {
            return TriggerResult::Hold;
        }
        // Evaluated against the level in force before this tick
        let result = self.rule.evaluate(price, now, self.created_at);
        match result {
            TriggerResult::Hold => self.rule.observe(price),
            TriggerResult::Trigger(reason) => {
                self.status = StopStatus::Triggered;
                self.trigger_price = Some(price);
                self.trigger_reason = Some(reason);
                self.closed_at = Some(now);
            }
        }
        result
    }

    /// Move an active order to a terminal state; returns false if already terminal
    pub(crate) fn close(&mut self, status: StopStatus, now: DateTime<Utc>) -> bool {
        if !self.is_active() || !status.is_terminal() {
            return false;
        }
        self.status = status;
        self.closed_at = Some(now);
        true
    }

    /// Loss if the stop fills at its current price
    pub fn risk_amount(&self) -> Decimal {
        (self.entry_price - self.stop_price()).max(Decimal::ZERO) * Decimal::from(self.quantity)
    }
}

/// Instruction to flatten a position after a stop fires
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExitIntent {
    pub symbol: String,
    pub quantity: u64,
    pub price: Decimal,
    pub reason: TriggerReason,
}

/// A fired stop with its exit instruction
#[derive(Debug, Clone)]
pub struct StopTrigger {
    pub order: StopOrder,
    pub exit: ExitIntent,
}

/// Result of feeding a price into the stop book
#[derive(Debug, Clone)]
pub enum StopOutcome {
    /// No active stop for the symbol
    Untracked,
    /// Stop still active at this price
    Holding { stop_price: Decimal },
    Triggered(StopTrigger),
}

impl StopOutcome {
    /// Whether an active stop handled the tick
    pub fn is_tracked(&self) -> bool {
        !matches!(self, StopOutcome::Untracked)
    }

    pub fn into_trigger(self) -> Option<StopTrigger> {
        match self {
            StopOutcome::Triggered(trigger) => Some(trigger),
            _ => None,
        }
    }
}
