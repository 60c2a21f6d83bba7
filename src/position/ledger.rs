//! Position ledger

use super::kelly::KellyCalculator;
use super::sizing::{calculate_quantity, SizingInput, SizingMethod};
use crate::risk::limits::check_fraction;
use crate::risk::{Decision, RiskError};
use chrono::{DateTime, Utc};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};

/// Ledger-level position limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PositionLimits {
    /// Maximum value of one position as a fraction of account value
    pub max_single_position_pct: Decimal,
    /// Maximum value of all positions as a fraction of account value
    pub max_total_position_pct: Decimal,
    /// Maximum number of open positions
    pub max_positions_count: usize,
    /// Smallest position value worth opening
    pub min_position_value: Decimal,
    /// Number of closed trades kept for Kelly sizing
    pub history_window: usize,
}

impl Default for PositionLimits {
    fn default() -> Self {
        Self {
            max_single_position_pct: dec!(0.10),
            max_total_position_pct: dec!(0.80),
            max_positions_count: 10,
            min_position_value: dec!(1000),
            history_window: 100,
        }
    }
}

impl PositionLimits {
    pub fn validate(&self) -> Result<(), RiskError> {
        check_fraction("max_single_position_pct", self.max_single_position_pct)?;
        check_fraction("max_total_position_pct", self.max_total_position_pct)?;
        if self.max_positions_count == 0 {
            return Err(RiskError::invalid_limit(
                "max_positions_count",
                self.max_positions_count,
                "at least 1",
            ));
        }
        if self.min_position_value < dec!(0) {
            return Err(RiskError::invalid_limit(
                "min_position_value",
                self.min_position_value,
                "non-negative",
            ));
        }
        if self.history_window == 0 {
            return Err(RiskError::invalid_limit(
                "history_window",
                self.history_window,
                "at least 1",
            ));
        }
        Ok(())
    }
}

/// An open long position
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub symbol: String,
    pub quantity: u64,
    pub entry_price: Decimal,
    pub current_price: Decimal,
    pub market_value: Decimal,
    pub unrealized_pnl: Decimal,
    pub unrealized_pnl_pct: Decimal,
    /// Share of total position value
    pub weight: Decimal,
    pub entry_time: DateTime<Utc>,
}

impl Position {
    fn new(symbol: String, quantity: u64, entry_price: Decimal, entry_time: DateTime<Utc>) -> Self {
        Self {
            symbol,
            quantity,
            entry_price,
            current_price: entry_price,
            market_value: Decimal::from(quantity) * entry_price,
            unrealized_pnl: dec!(0),
            unrealized_pnl_pct: dec!(0),
            weight: dec!(0),
            entry_time,
        }
    }

    /// Mark to a new price
    pub fn mark(&mut self, price: Decimal) {
        let quantity = Decimal::from(self.quantity);
        self.current_price = price;
        self.market_value = quantity * price;
        self.unrealized_pnl = (price - self.entry_price) * quantity;
        self.unrealized_pnl_pct = if self.entry_price > dec!(0) {
            (price - self.entry_price) / self.entry_price
        } else {
            dec!(0)
        };
    }
}

/// A closed position
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClosedPosition {
    /// Position as it was when closed
    pub position: Position,
    pub exit_price: Decimal,
    pub exit_time: DateTime<Utc>,
    pub realized_pnl: Decimal,
    pub return_pct: Decimal,
}

/// Portfolio-level view of the ledger
#[derive(Debug, Clone, Serialize)]
pub struct PortfolioSummary {
    pub positions_count: usize,
    pub total_market_value: Decimal,
    pub total_unrealized_pnl: Decimal,
    pub position_pct: Decimal,
    pub available_cash: Decimal,
    pub largest_weight: Decimal,
    pub win_rate: Decimal,
    pub total_return: Decimal,
}

/// Suggested change to bring the ledger back within limits
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Adjustment {
    /// Trim one oversized position
    Reduce {
        symbol: String,
        current_pct: Decimal,
        target_pct: Decimal,
        reduce_quantity: u64,
    },
    /// Cut total exposure
    ReduceTotal {
        excess_value: Decimal,
        current_total_pct: Decimal,
        target_total_pct: Decimal,
    },
}

/// Default annualised volatility target for `optimize_portfolio`
pub const DEFAULT_TARGET_VOLATILITY: Decimal = dec!(0.15);

/// Volatility-driven portfolio hint
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PortfolioSuggestion {
    /// Dispersion above 1.2x target: cut high-volatility positions
    ReduceVolatility { current: Decimal, target: Decimal },
    /// Dispersion below 0.8x target: room to take more return
    IncreaseReturn { current: Decimal, target: Decimal },
}

/// Owns the live positions and the trade history used for sizing
pub struct PositionManager {
    limits: PositionLimits,
    kelly: KellyCalculator,
    positions: HashMap<String, Position>,
    closed_positions: VecDeque<ClosedPosition>,
    returns: VecDeque<Decimal>,
    total_trades: u64,
    winning_trades: u64,
    losing_trades: u64,
    total_return: Decimal,
}

impl PositionManager {
    /// Create a new position manager
    pub fn new(limits: PositionLimits) -> Result<Self, RiskError> {
        limits.validate()?;
        Ok(Self {
            limits,
            kelly: KellyCalculator::default(),
            positions: HashMap::new(),
            closed_positions: VecDeque::new(),
            returns: VecDeque::new(),
            total_trades: 0,
            winning_trades: 0,
            losing_trades: 0,
            total_return: dec!(0),
        })
    }

    /// Replace the Kelly calculator
    pub fn with_kelly(mut self, kelly: KellyCalculator) -> Self {
        self.kelly = kelly;
        self
    }

    pub fn limits(&self) -> &PositionLimits {
        &self.limits
    }

    /// Suggested share count for a new position
    pub fn calculate_position_size(
        &self,
        symbol: &str,
        entry_price: Decimal,
        account_value: Decimal,
        method: &SizingMethod,
    ) -> u64 {
        let returns: Vec<Decimal> = self.returns.iter().copied().collect();
        let input = SizingInput {
            entry_price,
            account_value,
            max_position_pct: self.limits.max_single_position_pct,
            returns: &returns,
        };
        let quantity = calculate_quantity(method, &input, &self.kelly);
        tracing::debug!(symbol, method = method.mode_name(), quantity, "Position sized");
        quantity
    }

    /// Open a new position
    pub fn add_position(
        &mut self,
        symbol: &str,
        quantity: u64,
        entry_price: Decimal,
        entry_time: DateTime<Utc>,
    ) -> Result<&Position, RiskError> {
        if quantity == 0 || entry_price <= dec!(0) {
            return Err(RiskError::PositionRejected(format!(
                "{symbol}: quantity and price must be positive"
            )));
        }
        if self.positions.contains_key(symbol) {
            return Err(RiskError::PositionRejected(format!(
                "{symbol}: position already open"
            )));
        }
        if self.positions.len() >= self.limits.max_positions_count {
            tracing::warn!(
                symbol,
                max = self.limits.max_positions_count,
                "Maximum positions reached"
            );
            return Err(RiskError::PositionRejected(format!(
                "{symbol}: maximum of {} positions reached",
                self.limits.max_positions_count
            )));
        }

        let value = Decimal::from(quantity) * entry_price;
        if value < self.limits.min_position_value {
            tracing::warn!(symbol, %value, min = %self.limits.min_position_value, "Position below minimum value");
            return Err(RiskError::PositionRejected(format!(
                "{symbol}: value {value:.2} below minimum {:.2}",
                self.limits.min_position_value
            )));
        }

        self.positions.insert(
            symbol.to_string(),
            Position::new(symbol.to_string(), quantity, entry_price, entry_time),
        );
        self.recalculate_weights();
        tracing::info!(symbol, quantity, %entry_price, "Position opened");

        self.positions
            .get(symbol)
            .ok_or_else(|| RiskError::PositionRejected(format!("{symbol}: not recorded")))
    }

    /// Close a position
    ///
    /// With an exit price the outcome is recorded into the sizing history;
    /// without one the position is dropped at its last mark and no outcome
    /// is recorded.
    pub fn remove_position(
        &mut self,
        symbol: &str,
        exit_price: Option<Decimal>,
        exit_time: DateTime<Utc>,
    ) -> Option<ClosedPosition> {
        let position = self.positions.remove(symbol)?;
        let price = exit_price.unwrap_or(position.current_price);
        let realized_pnl = (price - position.entry_price) * Decimal::from(position.quantity);
        let return_pct = if position.entry_price > dec!(0) {
            (price - position.entry_price) / position.entry_price
        } else {
            dec!(0)
        };

        let closed = ClosedPosition {
            position,
            exit_price: price,
            exit_time,
            realized_pnl,
            return_pct,
        };

        if exit_price.is_some() {
            self.record_outcome(&closed);
        }
        self.recalculate_weights();

        tracing::info!(
            symbol,
            pnl = %realized_pnl,
            return_pct = %return_pct,
            "Position closed"
        );
        Some(closed)
    }

    fn record_outcome(&mut self, closed: &ClosedPosition) {
        let window = self.limits.history_window;

        self.returns.push_back(closed.return_pct);
        while self.returns.len() > window {
            self.returns.pop_front();
        }
        self.closed_positions.push_back(closed.clone());
        while self.closed_positions.len() > window {
            self.closed_positions.pop_front();
        }

        self.total_trades += 1;
        self.total_return += closed.return_pct;
        if closed.realized_pnl > dec!(0) {
            self.winning_trades += 1;
        } else if closed.realized_pnl < dec!(0) {
            self.losing_trades += 1;
        }
    }

    /// Mark one symbol; returns false when no position is open for it
    pub fn update_price(&mut self, symbol: &str, price: Decimal) -> bool {
        let Some(position) = self.positions.get_mut(symbol) else {
            return false;
        };
        position.mark(price);
        self.recalculate_weights();
        true
    }

    /// Mark many symbols at once
    pub fn update_prices(&mut self, prices: &HashMap<String, Decimal>) {
        for (symbol, price) in prices {
            if let Some(position) = self.positions.get_mut(symbol) {
                position.mark(*price);
            }
        }
        self.recalculate_weights();
    }

    fn recalculate_weights(&mut self) {
        let total = self.total_market_value();
        for position in self.positions.values_mut() {
            position.weight = if total > dec!(0) {
                position.market_value / total
            } else {
                dec!(0)
            };
        }
    }

    /// Check a prospective position against the ledger limits
    pub fn check_position_limits(
        &self,
        symbol: &str,
        quantity: u64,
        entry_price: Decimal,
        account_value: Decimal,
    ) -> Decision {
        if account_value <= dec!(0) {
            return Decision::reject("Account value must be positive");
        }

        let value = Decimal::from(quantity) * entry_price;
        let position_pct = value / account_value;
        if position_pct > self.limits.max_single_position_pct {
            return Decision::reject(format!(
                "{symbol}: position {:.1}% exceeds single-position limit {:.1}%",
                position_pct * dec!(100),
                self.limits.max_single_position_pct * dec!(100)
            ));
        }

        let total_pct = (self.total_market_value() + value) / account_value;
        if total_pct > self.limits.max_total_position_pct {
            return Decision::reject(format!(
                "{symbol}: total exposure {:.1}% exceeds limit {:.1}%",
                total_pct * dec!(100),
                self.limits.max_total_position_pct * dec!(100)
            ));
        }

        if self.positions.len() >= self.limits.max_positions_count {
            return Decision::reject(format!(
                "{symbol}: {} open positions at limit {}",
                self.positions.len(),
                self.limits.max_positions_count
            ));
        }

        if value < self.limits.min_position_value {
            return Decision::reject(format!(
                "{symbol}: value {value:.2} below minimum {:.2}",
                self.limits.min_position_value
            ));
        }

        Decision::allow("Position within limits")
    }

    /// Portfolio totals for the given account value
    pub fn portfolio_summary(&self, account_value: Decimal) -> PortfolioSummary {
        let total_market_value = self.total_market_value();
        PortfolioSummary {
            positions_count: self.positions.len(),
            total_market_value,
            total_unrealized_pnl: self.total_unrealized_pnl(),
            position_pct: if account_value > dec!(0) {
                total_market_value / account_value
            } else {
                dec!(0)
            },
            available_cash: account_value - total_market_value,
            largest_weight: self
                .positions
                .values()
                .map(|p| p.weight)
                .max()
                .unwrap_or(dec!(0)),
            win_rate: self.win_rate(),
            total_return: self.total_return,
        }
    }

    /// Positions that break the limits and how to fix them
    pub fn suggest_adjustments(&self, account_value: Decimal) -> Vec<Adjustment> {
        let mut suggestions = Vec::new();
        if account_value <= dec!(0) {
            return suggestions;
        }

        let target = self.limits.max_single_position_pct;
        let mut symbols: Vec<&String> = self.positions.keys().collect();
        symbols.sort();
        for symbol in symbols {
            let position = &self.positions[symbol];
            let current_pct = position.market_value / account_value;
            if current_pct > target {
                let excess = (current_pct - target) / current_pct;
                let reduce_quantity = (Decimal::from(position.quantity) * excess)
                    .ceil()
                    .to_u64()
                    .unwrap_or(0);
                suggestions.push(Adjustment::Reduce {
                    symbol: symbol.clone(),
                    current_pct,
                    target_pct: target,
                    reduce_quantity,
                });
            }
        }

        let total = self.total_market_value();
        let total_pct = total / account_value;
        if total_pct > self.limits.max_total_position_pct {
            suggestions.push(Adjustment::ReduceTotal {
                excess_value: total - account_value * self.limits.max_total_position_pct,
                current_total_pct: total_pct,
                target_total_pct: self.limits.max_total_position_pct,
            });
        }

        suggestions
    }

    /// Compare the spread of unrealized returns with a volatility target.
    ///
    /// Volatility is the population standard deviation of the open
    /// positions' `unrealized_pnl_pct`. Needs at least two positions.
    pub fn optimize_portfolio(&self, target_volatility: Decimal) -> Vec<PortfolioSuggestion> {
        if self.positions.len() < 2 {
            return Vec::new();
        }

        let count = Decimal::from(self.positions.len());
        let mean = self
            .positions
            .values()
            .map(|p| p.unrealized_pnl_pct)
            .sum::<Decimal>()
            / count;
        let variance = self
            .positions
            .values()
            .map(|p| (p.unrealized_pnl_pct - mean) * (p.unrealized_pnl_pct - mean))
            .sum::<Decimal>()
            / count;
        let current = variance
            .to_f64()
            .map(f64::sqrt)
            .and_then(Decimal::from_f64)
            .unwrap_or(dec!(0));

        if current > target_volatility * dec!(1.2) {
            vec![PortfolioSuggestion::ReduceVolatility {
                current,
                target: target_volatility,
            }]
        } else if current < target_volatility * dec!(0.8) {
            vec![PortfolioSuggestion::IncreaseReturn {
                current,
                target: target_volatility,
            }]
        } else {
            Vec::new()
        }
    }

    pub fn position(&self, symbol: &str) -> Option<&Position> {
        self.positions.get(symbol)
    }

    pub fn positions(&self) -> &HashMap<String, Position> {
        &self.positions
    }

    pub fn closed_positions(&self) -> impl Iterator<Item = &ClosedPosition> {
        self.closed_positions.iter()
    }

    pub fn open_count(&self) -> usize {
        self.positions.len()
    }

    pub fn total_market_value(&self) -> Decimal {
        self.positions.values().map(|p| p.market_value).sum()
    }

    pub fn total_unrealized_pnl(&self) -> Decimal {
        self.positions.values().map(|p| p.unrealized_pnl).sum()
    }

    /// Recorded trade returns, oldest first
    pub fn return_history(&self) -> impl Iterator<Item = &Decimal> {
        self.returns.iter()
    }

    pub fn win_rate(&self) -> Decimal {
        if self.total_trades == 0 {
            return dec!(0);
        }
        Decimal::from(self.winning_trades) / Decimal::from(self.total_trades)
    }

    pub fn trade_counts(&self) -> (u64, u64, u64) {
        (self.total_trades, self.winning_trades, self.losing_trades)
    }
}

impl Default for PositionManager {
    fn default() -> Self {
        Self {
            limits: PositionLimits::default(),
            kelly: KellyCalculator::default(),
            positions: HashMap::new(),
            closed_positions: VecDeque::new(),
            returns: VecDeque::new(),
            total_trades: 0,
            winning_trades: 0,
            losing_trades: 0,
            total_return: dec!(0),
        }
    }
}
