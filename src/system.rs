//! Risk system aggregate
//!
//! Owns the controller, the position ledger with its stop book, and the
//! monitor for one trading session. Locks are per table and never held
//! across an `.await` or a subscriber callback.

use crate::config::Config;
use crate::feed::{AccountSnapshot, PriceTick};
use crate::monitor::{RiskDashboard, RiskMonitor, RiskReport};
use crate::position::{
    ClosedPosition, PortfolioSuggestion, PortfolioSummary, Position, PositionManager, SizingMethod,
};
use crate::risk::{ControllerStatus, Decision, RiskController, RiskError, RiskMetrics, TradeRisk};
use crate::signal::{Side, TradeIntent};
use crate::stops::{StopLossManager, StopOrder, StopOutcome, StopSummary, StopTrigger, Trail};
use crate::telemetry::{record_counter, set_gauge, set_gauge_decimal, CounterMetric, GaugeMetric};
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Protective stop to attach when a position opens
#[derive(Debug, Clone, PartialEq)]
pub enum StopPlan {
    Fixed(Decimal),
    /// `None` uses the configured trail
    Trailing(Option<Trail>),
    TimeBased {
        stop_price: Decimal,
        max_hold: Option<Duration>,
    },
    AtrBased {
        atr: Decimal,
        multiplier: Option<Decimal>,
    },
    /// Chosen from the current risk level
    Smart,
    None,
}

/// Positions and stops, updated together per tick
struct Ledger {
    positions: PositionManager,
    stops: StopLossManager,
}

/// One session's risk components
pub struct RiskSystem {
    controller: Arc<Mutex<RiskController>>,
    ledger: Mutex<Ledger>,
    monitor: Arc<RiskMonitor>,
    sizing: SizingMethod,
    halt_wired: AtomicBool,
}

impl RiskSystem {
    /// Create a new risk system from configuration
    pub fn new(config: &Config) -> Result<Self, RiskError> {
        let limits = config.limits.clone();
        let positions = PositionManager::new(config.positions.clone())?;
        let stops = StopLossManager::new(config.stops.clone(), limits.max_single_loss_pct())?;
        let monitor = RiskMonitor::new(limits.clone(), config.monitor.clone())?;

        Ok(Self {
            controller: Arc::new(Mutex::new(RiskController::new(limits))),
            ledger: Mutex::new(Ledger { positions, stops }),
            monitor: Arc::new(monitor),
            sizing: config.sizing.clone(),
            halt_wired: AtomicBool::new(false),
        })
    }

    /// Start the monitor loop and route its emergencies into the controller
    pub fn start(&self) -> Result<(), RiskError> {
        if !self.halt_wired.swap(true, Ordering::SeqCst) {
            let controller = Arc::clone(&self.controller);
            let wired = self.monitor.on_emergency(move |event| {
                controller
                    .lock()
                    .halt(format!("monitor {}: {}", event.event_type, event.description));
            });
            if let Err(e) = wired {
                self.halt_wired.store(false, Ordering::SeqCst);
                return Err(e);
            }
        }
        self.monitor.start()
    }

    /// Stop the monitor loop
    pub async fn stop(&self) -> Result<(), RiskError> {
        self.monitor.stop().await
    }

    /// Admission decision for a trade intent
    pub fn validate(&self, intent: &TradeIntent, account_value: Decimal) -> Decision {
        let trade = TradeRisk::from(intent);
        let decision = self.controller.lock().validate_trade(&trade, account_value);
        record_counter(if decision.allowed {
            CounterMetric::TradesAdmitted
        } else {
            CounterMetric::TradesRejected
        });
        decision
    }

    /// Suggested quantity using the configured sizing method
    pub fn size(&self, symbol: &str, entry_price: Decimal, account_value: Decimal) -> u64 {
        self.ledger
            .lock()
            .positions
            .calculate_position_size(symbol, entry_price, account_value, &self.sizing)
    }

    /// Validate a long entry and, if admitted, open it with a stop
    ///
    /// A rejection is returned as the decision; ledger or stop failures are
    /// errors and leave no position behind.
    pub fn open_position(
        &self,
        intent: &TradeIntent,
        account_value: Decimal,
        plan: StopPlan,
        now: DateTime<Utc>,
    ) -> Result<Decision, RiskError> {
        if intent.side != Side::Buy {
            return Ok(Decision::reject("Only long entries open positions"));
        }
        let decision = self.validate(intent, account_value);
        if !decision.allowed {
            return Ok(decision);
        }
        let risk_level = self.controller.lock().metrics().risk_level;

        let mut ledger = self.ledger.lock();
        let Ledger { positions, stops } = &mut *ledger;
        let symbol = intent.symbol.as_str();
        positions.add_position(symbol, intent.quantity, intent.price, now)?;

        let created = match plan {
            StopPlan::Fixed(stop_price) => stops
                .create_fixed_stop(symbol, intent.quantity, intent.price, stop_price, now)
                .map(|_| ()),
            StopPlan::Trailing(trail) => stops
                .create_trailing_stop(symbol, intent.quantity, intent.price, trail, now)
                .map(|_| ()),
            StopPlan::TimeBased {
                stop_price,
                max_hold,
            } => stops
                .create_time_stop(symbol, intent.quantity, intent.price, stop_price, max_hold, now)
                .map(|_| ()),
            StopPlan::AtrBased { atr, multiplier } => stops
                .create_atr_stop(symbol, intent.quantity, intent.price, atr, multiplier, now)
                .map(|_| ()),
            StopPlan::Smart => stops
                .create_smart_stop(
                    symbol,
                    intent.quantity,
                    intent.price,
                    risk_level,
                    account_value,
                    now,
                )
                .map(|_| ()),
            StopPlan::None => Ok(()),
        };

        if let Err(e) = created {
            positions.remove_position(symbol, None, now);
            return Err(e);
        }
        set_gauge(GaugeMetric::OpenPositions, positions.open_count() as f64);
        set_gauge(GaugeMetric::ActiveStops, stops.active_count() as f64);
        Ok(decision)
    }

    /// Apply a price tick
    ///
    /// The position mark and stop evaluation happen under one lock. A fired
    /// stop closes the position and its P&L goes to the controller.
    pub fn on_tick(&self, tick: &PriceTick) -> Option<StopTrigger> {
        let fired = {
            let mut ledger = self.ledger.lock();
            ledger.positions.update_price(&tick.symbol, tick.price);
            match ledger.stops.update_price(&tick.symbol, tick.price, tick.timestamp) {
                StopOutcome::Triggered(trigger) => {
                    let closed = ledger.positions.remove_position(
                        &tick.symbol,
                        Some(trigger.exit.price),
                        tick.timestamp,
                    );
                    set_gauge(GaugeMetric::OpenPositions, ledger.positions.open_count() as f64);
                    set_gauge(GaugeMetric::ActiveStops, ledger.stops.active_count() as f64);
                    Some((trigger, closed))
                }
                StopOutcome::Holding { .. } | StopOutcome::Untracked => None,
            }
        };

        let (trigger, closed) = fired?;
        record_counter(CounterMetric::StopsTriggered);
        if let Some(closed) = closed {
            self.controller.lock().record_trade_result(closed.realized_pnl);
        }
        Some(trigger)
    }

    /// Refresh the ATR input of a symbol's stop
    pub fn update_atr(&self, symbol: &str, atr: Decimal) -> bool {
        self.ledger.lock().stops.update_atr(symbol, atr)
    }

    /// Close a position at `exit_price`, cancelling its stop
    pub fn close_position(
        &self,
        symbol: &str,
        exit_price: Decimal,
        now: DateTime<Utc>,
    ) -> Option<ClosedPosition> {
        let closed = {
            let mut ledger = self.ledger.lock();
            ledger.stops.remove_stop(symbol, now);
            ledger.positions.remove_position(symbol, Some(exit_price), now)
        }?;
        self.controller.lock().record_trade_result(closed.realized_pnl);
        Some(closed)
    }

    /// Recompute metrics from an account snapshot and hand them to the monitor
    pub fn refresh_metrics(&self, snapshot: &AccountSnapshot, daily_pnl: Decimal) -> RiskMetrics {
        let positions: Vec<Position> = self
            .ledger
            .lock()
            .positions
            .positions()
            .values()
            .cloned()
            .collect();

        let metrics = self
            .controller
            .lock()
            .update_metrics(snapshot.equity, &positions, daily_pnl, snapshot.timestamp)
            .clone();

        self.monitor.update_positions(&positions);
        self.monitor.update_metrics(metrics.clone());

        set_gauge_decimal(GaugeMetric::AccountValue, metrics.account_value);
        set_gauge_decimal(GaugeMetric::DailyPnl, metrics.daily_pnl);
        set_gauge_decimal(GaugeMetric::DrawdownPct, metrics.max_drawdown);
        set_gauge(GaugeMetric::RiskLevel, metrics.risk_level as u8 as f64);
        metrics
    }

    /// Expire every active stop at the end of a session
    pub fn end_session(&self, now: DateTime<Utc>) -> Vec<StopOrder> {
        let expired = self.ledger.lock().stops.expire_all(now);
        set_gauge(GaugeMetric::ActiveStops, 0.0);
        expired
    }

    /// Open a new session from the given account value
    pub fn reset_session(&self, account_value: Decimal, now: DateTime<Utc>) {
        self.controller.lock().reset_session(account_value, now);
        self.monitor.reset_daily_monitoring();
    }

    pub fn reset_emergency_stop(&self, operator: &str) -> bool {
        self.controller.lock().reset_emergency_stop(operator)
    }

    pub fn status(&self) -> ControllerStatus {
        self.controller.lock().status()
    }

    pub fn metrics(&self) -> RiskMetrics {
        self.controller.lock().metrics().clone()
    }

    pub fn positions(&self) -> Vec<Position> {
        self.ledger.lock().positions.positions().values().cloned().collect()
    }

    pub fn portfolio_summary(&self, account_value: Decimal) -> PortfolioSummary {
        self.ledger.lock().positions.portfolio_summary(account_value)
    }

    /// Volatility hints over the open positions
    pub fn optimize_portfolio(&self, target_volatility: Decimal) -> Vec<PortfolioSuggestion> {
        self.ledger.lock().positions.optimize_portfolio(target_volatility)
    }

    pub fn stop_info(&self, symbol: &str) -> Option<StopOrder> {
        self.ledger.lock().stops.stop_info(symbol).cloned()
    }

    pub fn stop_summary(&self) -> StopSummary {
        self.ledger.lock().stops.summary()
    }

    pub fn monitor(&self) -> &Arc<RiskMonitor> {
        &self.monitor
    }

    pub fn dashboard(&self) -> RiskDashboard {
        self.monitor.get_risk_dashboard()
    }

    pub fn report(&self, hours: u32) -> RiskReport {
        self.monitor.generate_risk_report(hours)
    }
}
