//! Stop book: one active stop per symbol

use super::order::{ExitIntent, StopOrder, StopOutcome, StopStatus, StopTrigger};
use super::rules::{
    smart_stop_pct, AtrStop, FixedStop, SmartStop, StopKind, StopRule, TimeStop, Trail,
    TrailingStop, TriggerResult,
};
use crate::risk::limits::check_fraction;
use crate::risk::{RiskError, RiskLevel};
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, VecDeque};

/// Stop defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StopLossConfig {
    /// Trail used when a trailing stop is requested without one
    pub default_trailing_pct: Decimal,
    /// Holding period used when a time stop is requested without one
    pub default_max_hold_secs: i64,
    pub default_atr_multiplier: Decimal,
    /// Terminal orders kept for inspection
    pub history_size: usize,
}

impl Default for StopLossConfig {
    fn default() -> Self {
        Self {
            default_trailing_pct: dec!(0.02),
            default_max_hold_secs: 86_400,
            default_atr_multiplier: dec!(2),
            history_size: 500,
        }
    }
}

impl StopLossConfig {
    pub fn validate(&self) -> Result<(), RiskError> {
        check_fraction("default_trailing_pct", self.default_trailing_pct)?;
        if self.default_max_hold_secs <= 0 {
            return Err(RiskError::invalid_limit(
                "default_max_hold_secs",
                self.default_max_hold_secs,
                "positive",
            ));
        }
        if self.default_atr_multiplier <= dec!(0) {
            return Err(RiskError::invalid_limit(
                "default_atr_multiplier",
                self.default_atr_multiplier,
                "positive",
            ));
        }
        Ok(())
    }

    pub fn default_max_hold(&self) -> Duration {
        Duration::seconds(self.default_max_hold_secs)
    }
}

/// Counts over the stop book
#[derive(Debug, Clone, Default, Serialize)]
pub struct StopSummary {
    pub active: usize,
    pub triggered: usize,
    pub cancelled: usize,
    pub expired: usize,
    /// Active stops per rule type
    pub by_kind: BTreeMap<&'static str, usize>,
    /// Loss if every active stop fills at its stop price
    pub total_risk: Decimal,
}

/// Owns every active stop order, keyed by symbol
pub struct StopLossManager {
    config: StopLossConfig,
    max_single_loss_pct: Decimal,
    active: HashMap<String, StopOrder>,
    history: VecDeque<StopOrder>,
    triggered: usize,
    cancelled: usize,
    expired: usize,
}

impl StopLossManager {
    /// Create a new stop manager
    ///
    /// `max_single_loss_pct` bounds the distance of smart stops.
    pub fn new(config: StopLossConfig, max_single_loss_pct: Decimal) -> Result<Self, RiskError> {
        config.validate()?;
        check_fraction("max_single_loss_pct", max_single_loss_pct)?;
        Ok(Self {
            config,
            max_single_loss_pct,
            active: HashMap::new(),
            history: VecDeque::new(),
            triggered: 0,
            cancelled: 0,
            expired: 0,
        })
    }

    pub fn config(&self) -> &StopLossConfig {
        &self.config
    }

    /// Stop at a fixed price
    pub fn create_fixed_stop(
        &mut self,
        symbol: &str,
        quantity: u64,
        entry_price: Decimal,
        stop_price: Decimal,
        now: DateTime<Utc>,
    ) -> Result<&StopOrder, RiskError> {
        self.insert(
            symbol,
            quantity,
            entry_price,
            StopKind::Fixed(FixedStop { stop_price }),
            now,
        )
    }

    /// Trailing stop; `None` uses the configured percentage
    pub fn create_trailing_stop(
        &mut self,
        symbol: &str,
        quantity: u64,
        entry_price: Decimal,
        trail: Option<Trail>,
        now: DateTime<Utc>,
    ) -> Result<&StopOrder, RiskError> {
        let trail = trail.unwrap_or(Trail::Percent(self.config.default_trailing_pct));
        match trail {
            Trail::Percent(pct) if pct <= dec!(0) || pct >= Decimal::ONE => {
                return Err(invalid(symbol, format!("trailing percent {pct} not in (0, 1)")));
            }
            Trail::Amount(amount) if amount <= dec!(0) => {
                return Err(invalid(symbol, format!("trailing amount {amount} not positive")));
            }
            _ => {}
        }
        self.insert(
            symbol,
            quantity,
            entry_price,
            StopKind::Trailing(TrailingStop::new(entry_price, trail)),
            now,
        )
    }

    /// Price stop that also fires after `max_hold`
    pub fn create_time_stop(
        &mut self,
        symbol: &str,
        quantity: u64,
        entry_price: Decimal,
        stop_price: Decimal,
        max_hold: Option<Duration>,
        now: DateTime<Utc>,
    ) -> Result<&StopOrder, RiskError> {
        let max_hold = max_hold.unwrap_or_else(|| self.config.default_max_hold());
        if max_hold <= Duration::zero() {
            return Err(invalid(symbol, "max hold must be positive".to_string()));
        }
        self.insert(
            symbol,
            quantity,
            entry_price,
            StopKind::TimeBased(TimeStop {
                stop_price,
                max_hold_secs: max_hold.num_seconds(),
            }),
            now,
        )
    }

    /// Volatility stop `atr * multiplier` below price
    pub fn create_atr_stop(
        &mut self,
        symbol: &str,
        quantity: u64,
        entry_price: Decimal,
        atr: Decimal,
        atr_multiplier: Option<Decimal>,
        now: DateTime<Utc>,
    ) -> Result<&StopOrder, RiskError> {
        let multiplier = atr_multiplier.unwrap_or(self.config.default_atr_multiplier);
        if atr <= dec!(0) || multiplier <= dec!(0) {
            return Err(invalid(
                symbol,
                format!("ATR {atr} and multiplier {multiplier} must be positive"),
            ));
        }
        self.insert(
            symbol,
            quantity,
            entry_price,
            StopKind::AtrBased(AtrStop::new(entry_price, atr, multiplier)),
            now,
        )
    }

    /// Stop chosen from the current risk level
    ///
    /// The distance never exceeds the per-trade loss budget of
    /// `account_value * max_single_loss_pct` spread over the quantity.
    pub fn create_smart_stop(
        &mut self,
        symbol: &str,
        quantity: u64,
        entry_price: Decimal,
        risk_level: RiskLevel,
        account_value: Decimal,
        now: DateTime<Utc>,
    ) -> Result<&StopOrder, RiskError> {
        if quantity == 0 {
            return Err(invalid(symbol, "quantity must be positive".to_string()));
        }
        let pct = smart_stop_pct(risk_level);
        let level_distance = entry_price * pct;
        let loss_cap = (account_value * self.max_single_loss_pct / Decimal::from(quantity))
            .max(dec!(0));
        let distance = level_distance.min(loss_cap);

        let inner = match risk_level {
            RiskLevel::Low if distance < level_distance => {
                StopKind::Trailing(TrailingStop::new(entry_price, Trail::Amount(distance)))
            }
            RiskLevel::Low => StopKind::Trailing(TrailingStop::new(entry_price, Trail::Percent(pct))),
            _ => StopKind::Fixed(FixedStop {
                stop_price: entry_price - distance,
            }),
        };
        tracing::debug!(
            symbol,
            level = %risk_level,
            %distance,
            capped = distance < level_distance,
            "Smart stop selected"
        );

        self.insert(
            symbol,
            quantity,
            entry_price,
            StopKind::Smart(SmartStop {
                risk_level,
                inner: Box::new(inner),
            }),
            now,
        )
    }

    fn insert(
        &mut self,
        symbol: &str,
        quantity: u64,
        entry_price: Decimal,
        rule: StopKind,
        now: DateTime<Utc>,
    ) -> Result<&StopOrder, RiskError> {
        if quantity == 0 {
            return Err(invalid(symbol, "quantity must be positive".to_string()));
        }
        if entry_price <= dec!(0) {
            return Err(invalid(symbol, format!("entry price {entry_price} not positive")));
        }
        let stop_price = rule.stop_price();
        if stop_price >= entry_price {
            return Err(invalid(
                symbol,
                format!("stop {stop_price} must be below entry {entry_price}"),
            ));
        }

        let order = StopOrder::new(symbol, quantity, entry_price, rule, now);
        tracing::info!(
            symbol,
            kind = order.rule.name(),
            %entry_price,
            %stop_price,
            quantity,
            "Stop created"
        );

        if let Some(mut replaced) = self.active.insert(symbol.to_string(), order) {
            replaced.close(StopStatus::Cancelled, now);
            tracing::info!(symbol, id = %replaced.id, "Active stop replaced");
            self.archive(replaced);
        }

        self.active
            .get(symbol)
            .ok_or_else(|| invalid(symbol, "stop not recorded".to_string()))
    }

    /// Feed a price into the symbol's stop
    pub fn update_price(&mut self, symbol: &str, price: Decimal, now: DateTime<Utc>) -> StopOutcome {
        let Some(order) = self.active.get_mut(symbol) else {
            return StopOutcome::Untracked;
        };

        let reason = match order.on_price(price, now) {
            TriggerResult::Hold => {
                return StopOutcome::Holding {
                    stop_price: order.stop_price(),
                }
            }
            TriggerResult::Trigger(reason) => reason,
        };

        let Some(order) = self.active.remove(symbol) else {
            return StopOutcome::Untracked;
        };
        tracing::warn!(
            symbol,
            %price,
            stop_price = %order.stop_price(),
            reason = reason.as_str(),
            "Stop triggered"
        );

        let exit = ExitIntent {
            symbol: order.symbol.clone(),
            quantity: order.quantity,
            price,
            reason,
        };
        self.archive(order.clone());
        StopOutcome::Triggered(StopTrigger { order, exit })
    }

    /// Refresh the ATR input of the symbol's stop
    pub fn update_atr(&mut self, symbol: &str, atr: Decimal) -> bool {
        if atr <= dec!(0) {
            tracing::warn!(symbol, %atr, "Ignoring non-positive ATR");
            return false;
        }
        self.active
            .get_mut(symbol)
            .map(|order| order.rule.set_atr(atr))
            .unwrap_or(false)
    }

    /// Cancel the symbol's stop
    pub fn remove_stop(&mut self, symbol: &str, now: DateTime<Utc>) -> Option<StopOrder> {
        let mut order = self.active.remove(symbol)?;
        order.close(StopStatus::Cancelled, now);
        tracing::info!(symbol, id = %order.id, "Stop cancelled");
        self.archive(order.clone());
        Some(order)
    }

    /// Expire every active stop at the session boundary
    pub fn expire_all(&mut self, now: DateTime<Utc>) -> Vec<StopOrder> {
        let mut symbols: Vec<String> = self.active.keys().cloned().collect();
        symbols.sort();

        let mut expired = Vec::with_capacity(symbols.len());
        for symbol in symbols {
            if let Some(mut order) = self.active.remove(&symbol) {
                order.close(StopStatus::Expired, now);
                self.archive(order.clone());
                expired.push(order);
            }
        }
        if !expired.is_empty() {
            tracing::info!(count = expired.len(), "Stops expired");
        }
        expired
    }

    fn archive(&mut self, order: StopOrder) {
        match order.status {
            StopStatus::Triggered => self.triggered += 1,
            StopStatus::Cancelled => self.cancelled += 1,
            StopStatus::Expired => self.expired += 1,
            StopStatus::Active => return,
        }
        self.history.push_back(order);
        while self.history.len() > self.config.history_size {
            self.history.pop_front();
        }
    }

    /// Active stop for a symbol
    pub fn stop_info(&self, symbol: &str) -> Option<&StopOrder> {
        self.active.get(symbol)
    }

    pub fn active_stops(&self) -> impl Iterator<Item = &StopOrder> {
        self.active.values()
    }

    /// Terminal orders, oldest first
    pub fn history(&self) -> impl Iterator<Item = &StopOrder> {
        self.history.iter()
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn summary(&self) -> StopSummary {
        let mut by_kind = BTreeMap::new();
        for order in self.active.values() {
            *by_kind.entry(order.rule.name()).or_insert(0) += 1;
        }
        StopSummary {
            active: self.active.len(),
            triggered: self.triggered,
            cancelled: self.cancelled,
            expired: self.expired,
            by_kind,
            total_risk: self.active.values().map(StopOrder::risk_amount).sum(),
        }
    }
}

fn invalid(symbol: &str, reason: String) -> RiskError {
    RiskError::InvalidStop {
        symbol: symbol.to_string(),
        reason,
    }
}
