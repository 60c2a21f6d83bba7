//! Admission control and account-level risk state

use super::limits::{DrawdownTracker, RiskLimits};
use super::metrics::RiskMetrics;
use super::trade::TradeRisk;
use super::types::{pct, Decision, RiskLevel};
use crate::position::Position;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;
use std::collections::VecDeque;

/// P&L changes kept for historical VaR
const VAR_WINDOW: usize = 250;
/// Samples needed before VaR is reported
const VAR_MIN_SAMPLES: usize = 20;

/// Controller flags and counters
#[derive(Debug, Clone, Serialize)]
pub struct ControllerStatus {
    pub emergency_stop: bool,
    pub emergency_reason: Option<String>,
    pub daily_loss_exceeded: bool,
    pub risk_level: RiskLevel,
    pub consecutive_losses: u32,
    pub total_trades: u64,
    pub daily_pnl: Decimal,
    pub realized_pnl: Decimal,
    pub max_drawdown: Decimal,
    pub session_start: DateTime<Utc>,
}

/// Gatekeeper for new trades
///
/// Holds the latest [`RiskMetrics`] and two halt flags. The daily-loss flag
/// clears at the next session; the emergency stop stays set until an
/// operator calls [`RiskController::reset_emergency_stop`].
pub struct RiskController {
    limits: RiskLimits,
    metrics: RiskMetrics,
    drawdown: DrawdownTracker,
    pnl_changes: VecDeque<Decimal>,
    last_daily_pnl: Option<Decimal>,
    emergency_stop: bool,
    emergency_reason: Option<String>,
    daily_loss_exceeded: bool,
    session_start: DateTime<Utc>,
}

impl RiskController {
    /// Create a new controller
    pub fn new(limits: RiskLimits) -> Self {
        Self {
            limits,
            metrics: RiskMetrics::default(),
            drawdown: DrawdownTracker::new(dec!(0)),
            pnl_changes: VecDeque::new(),
            last_daily_pnl: None,
            emergency_stop: false,
            emergency_reason: None,
            daily_loss_exceeded: false,
            session_start: Utc::now(),
        }
    }

    pub fn limits(&self) -> &RiskLimits {
        &self.limits
    }

    pub fn metrics(&self) -> &RiskMetrics {
        &self.metrics
    }

    pub fn is_emergency_stopped(&self) -> bool {
        self.emergency_stop
    }

    pub fn is_daily_loss_exceeded(&self) -> bool {
        self.daily_loss_exceeded
    }

    /// Decide whether a trade may proceed
    ///
    /// Checks run in a fixed order and stop at the first failure: emergency
    /// stop, daily loss flag, single-trade loss, single-position size,
    /// consecutive losses, risk/reward, minimum account value.
    pub fn validate_trade(&self, trade: &TradeRisk, account_value: Decimal) -> Decision {
        let decision = self.evaluate_trade(trade, account_value);
        if decision.allowed {
            tracing::debug!(symbol = %trade.symbol, quantity = trade.quantity, "Trade admitted");
        } else {
            tracing::warn!(symbol = %trade.symbol, reason = %decision.reason, "Trade rejected");
        }
        decision
    }

    fn evaluate_trade(&self, trade: &TradeRisk, account_value: Decimal) -> Decision {
        if self.emergency_stop {
            let reason = self.emergency_reason.as_deref().unwrap_or("operator halt");
            return Decision::reject(format!("Emergency stop active: {reason}"));
        }
        if self.daily_loss_exceeded {
            return Decision::reject(format!(
                "Daily loss limit {} reached",
                pct(self.limits.max_daily_loss_pct())
            ));
        }
        if account_value <= dec!(0) {
            return Decision::reject("Account value must be positive");
        }

        if let Some(loss) = trade.estimated_loss(account_value) {
            let loss_pct = loss / account_value;
            if loss_pct > self.limits.max_single_loss_pct() {
                return Decision::reject(format!(
                    "Single-trade loss {} exceeds limit {}",
                    pct(loss_pct),
                    pct(self.limits.max_single_loss_pct())
                ));
            }
        }

        let position_pct = trade.position_value() / account_value;
        let cap = self.limits.single_position_cap();
        if position_pct > cap {
            return Decision::reject(format!(
                "Position size {} exceeds limit {}",
                pct(position_pct),
                pct(cap)
            ));
        }

        if self.metrics.consecutive_losses >= self.limits.max_consecutive_losses() {
            return Decision::reject(format!(
                "Consecutive losses {} at limit {}",
                self.metrics.consecutive_losses,
                self.limits.max_consecutive_losses()
            ));
        }

        if let Some(ratio) = trade.risk_reward_ratio(account_value) {
            if ratio < Decimal::ONE {
                return Decision::reject(format!("Risk/reward {ratio:.2} below 1.0"));
            }
        }

        if account_value < self.limits.min_account_value() {
            return Decision::reject(format!(
                "Account value {account_value:.2} below minimum {:.2}",
                self.limits.min_account_value()
            ));
        }

        Decision::allow("Trade within risk limits")
    }

    /// Refresh the metrics snapshot from the account and open positions
    pub fn update_metrics<'a>(
        &mut self,
        account_value: Decimal,
        positions: impl IntoIterator<Item = &'a Position>,
        daily_pnl: Decimal,
        now: DateTime<Utc>,
    ) -> &RiskMetrics {
        if self.drawdown.base_equity <= dec!(0) {
            self.drawdown.reset(account_value - daily_pnl);
        }

        let (position_value, unrealized_pnl) = positions
            .into_iter()
            .fold((dec!(0), dec!(0)), |(value, pnl), p| {
                (value + p.market_value, pnl + p.unrealized_pnl)
            });

        if let Some(previous) = self.last_daily_pnl.replace(daily_pnl) {
            self.pnl_changes.push_back(daily_pnl - previous);
            while self.pnl_changes.len() > VAR_WINDOW {
                self.pnl_changes.pop_front();
            }
        }

        self.metrics.timestamp = now;
        self.metrics.account_value = account_value;
        self.metrics.position_value = position_value;
        self.metrics.unrealized_pnl = unrealized_pnl;
        self.metrics.available_cash = account_value - position_value;
        self.metrics.daily_pnl = daily_pnl;
        self.metrics.session_start_value = self.drawdown.base_equity;
        self.metrics.max_drawdown = self.drawdown.update(daily_pnl);
        self.metrics.var_95 = historical_var(&self.pnl_changes);
        self.metrics.risk_level = assess_risk_level(&self.metrics, &self.limits);

        self.check_risk_limits();
        &self.metrics
    }

    /// Record a closed trade's P&L
    pub fn record_trade_result(&mut self, pnl: Decimal) {
        self.metrics.total_trades += 1;
        self.metrics.realized_pnl += pnl;
        if pnl > dec!(0) {
            self.metrics.consecutive_losses = 0;
        } else if pnl < dec!(0) {
            self.metrics.consecutive_losses += 1;
        }
        tracing::info!(
            %pnl,
            consecutive_losses = self.metrics.consecutive_losses,
            total_trades = self.metrics.total_trades,
            "Trade result recorded"
        );
        self.metrics.risk_level = assess_risk_level(&self.metrics, &self.limits);
        self.check_risk_limits();
    }

    fn check_risk_limits(&mut self) {
        let daily_loss = self.metrics.daily_loss_pct();
        if !self.daily_loss_exceeded && daily_loss >= self.limits.max_daily_loss_pct() {
            self.daily_loss_exceeded = true;
            tracing::warn!(
                daily_loss = %pct(daily_loss),
                limit = %pct(self.limits.max_daily_loss_pct()),
                "Daily loss limit reached, new trades blocked for the session"
            );
        }

        if self.emergency_stop {
            return;
        }
        if self.metrics.risk_level == RiskLevel::Critical {
            self.trigger_emergency_stop("risk level critical".to_string());
        } else if self.metrics.consecutive_losses >= self.limits.max_consecutive_losses() {
            self.trigger_emergency_stop(format!(
                "{} consecutive losses",
                self.metrics.consecutive_losses
            ));
        }
    }

    /// Raise the emergency stop from outside the controller
    pub fn halt(&mut self, reason: impl Into<String>) {
        if !self.emergency_stop {
            self.trigger_emergency_stop(reason.into());
        }
    }

    fn trigger_emergency_stop(&mut self, reason: String) {
        tracing::error!(%reason, "Emergency stop triggered");
        self.emergency_stop = true;
        self.emergency_reason = Some(reason);
    }

    /// Clear the emergency stop
    ///
    /// The loss streak is cleared with it; returns false when no stop was set.
    pub fn reset_emergency_stop(&mut self, operator: &str) -> bool {
        if !self.emergency_stop {
            return false;
        }
        tracing::warn!(
            operator,
            reason = self.emergency_reason.as_deref().unwrap_or(""),
            "Emergency stop reset"
        );
        self.emergency_stop = false;
        self.emergency_reason = None;
        self.metrics.consecutive_losses = 0;
        true
    }

    /// Start a new trading session
    ///
    /// Clears session P&L, drawdown and the daily-loss flag. The emergency
    /// stop and the loss streak carry over.
    pub fn reset_session(&mut self, account_value: Decimal, now: DateTime<Utc>) {
        self.daily_loss_exceeded = false;
        self.drawdown.reset(account_value);
        self.pnl_changes.clear();
        self.last_daily_pnl = None;
        self.session_start = now;

        self.metrics.timestamp = now;
        self.metrics.account_value = account_value;
        self.metrics.daily_pnl = dec!(0);
        self.metrics.session_start_value = account_value;
        self.metrics.realized_pnl = dec!(0);
        self.metrics.max_drawdown = dec!(0);
        self.metrics.var_95 = dec!(0);
        self.metrics.risk_level = assess_risk_level(&self.metrics, &self.limits);
        tracing::info!(%account_value, "Risk session reset");
    }

    pub fn status(&self) -> ControllerStatus {
        ControllerStatus {
            emergency_stop: self.emergency_stop,
            emergency_reason: self.emergency_reason.clone(),
            daily_loss_exceeded: self.daily_loss_exceeded,
            risk_level: self.metrics.risk_level,
            consecutive_losses: self.metrics.consecutive_losses,
            total_trades: self.metrics.total_trades,
            daily_pnl: self.metrics.daily_pnl,
            realized_pnl: self.metrics.realized_pnl,
            max_drawdown: self.metrics.max_drawdown,
            session_start: self.session_start,
        }
    }
}

/// Score the snapshot and bucket it into a risk level
pub fn assess_risk_level(metrics: &RiskMetrics, limits: &RiskLimits) -> RiskLevel {
    let mut score = 0;

    let loss_ratio = metrics.daily_loss_pct() / limits.max_daily_loss_pct();
    if loss_ratio >= dec!(0.8) {
        score += 3;
    } else if loss_ratio >= dec!(0.5) {
        score += 2;
    } else if loss_ratio >= dec!(0.3) {
        score += 1;
    }

    if metrics.max_drawdown > dec!(0.05) {
        score += 2;
    } else if metrics.max_drawdown > dec!(0.03) {
        score += 1;
    }

    if metrics.consecutive_losses >= 4 {
        score += 2;
    } else if metrics.consecutive_losses >= 3 {
        score += 1;
    }

    if metrics.position_pct() > dec!(0.7) {
        score += 1;
    }

    RiskLevel::from_score(score)
}

/// One-step 95% VaR from the 5th percentile of P&L changes
fn historical_var(changes: &VecDeque<Decimal>) -> Decimal {
    if changes.len() < VAR_MIN_SAMPLES {
        return dec!(0);
    }
    let mut sorted: Vec<Decimal> = changes.iter().copied().collect();
    sorted.sort();
    let index = sorted.len() * 5 / 100;
    (-sorted[index]).max(dec!(0))
}
