//! Simulate command implementation

use crate::config::Config;
use crate::feed::{AccountSnapshot, PriceTick};
use crate::monitor::{RiskDashboard, RiskReport};
use crate::risk::{ControllerStatus, Decision};
use crate::signal::TradeIntent;
use crate::stops::{ExitIntent, Trail};
use crate::system::{RiskSystem, StopPlan};
use chrono::{DateTime, Duration, Utc};
use clap::{Args, ValueEnum};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;

/// Stop attached to the simulated entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StopChoice {
    Fixed,
    Trailing,
    Smart,
    None,
}

#[derive(Args, Debug)]
pub struct SimulateArgs {
    /// Symbol to simulate
    #[arg(long, default_value = "SIM")]
    pub symbol: String,

    /// Starting account value
    #[arg(long, default_value = "100000")]
    pub account: Decimal,

    /// Entry price
    #[arg(long, default_value = "100")]
    pub entry: Decimal,

    /// Comma-separated price path; generated from --steps and --drift when empty
    #[arg(long, value_delimiter = ',')]
    pub prices: Vec<Decimal>,

    /// Number of generated ticks
    #[arg(long, default_value = "20")]
    pub steps: u32,

    /// Per-tick price change as a fraction of entry
    #[arg(long, default_value = "-0.002", allow_hyphen_values = true)]
    pub drift: Decimal,

    /// Stop attached to the entry
    #[arg(long, value_enum, default_value = "smart")]
    pub stop: StopChoice,

    /// Stop distance below entry for fixed and trailing stops
    #[arg(long, default_value = "0.01")]
    pub stop_pct: Decimal,

    /// Report window in hours
    #[arg(long, default_value = "24")]
    pub report_hours: u32,
}

#[derive(Debug, Serialize)]
struct SimulationResult {
    quantity: u64,
    decision: Decision,
    exits: Vec<ExitIntent>,
    status: ControllerStatus,
    dashboard: RiskDashboard,
    report: RiskReport,
}

impl SimulateArgs {
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        anyhow::ensure!(self.entry > dec!(0), "entry price must be positive");
        anyhow::ensure!(self.account > dec!(0), "account value must be positive");

        let system = RiskSystem::new(config)?;
        system.start()?;
        let result = self.replay(&system, Utc::now());
        system.stop().await?;

        println!("{}", serde_json::to_string_pretty(&result?)?);
        Ok(())
    }

    fn price_path(&self) -> Vec<Decimal> {
        if !self.prices.is_empty() {
            return self.prices.clone();
        }
        (1..=self.steps)
            .map(|i| self.entry * (Decimal::ONE + self.drift * Decimal::from(i)))
            .filter(|p| *p > dec!(0))
            .collect()
    }

    fn stop_plan(&self) -> StopPlan {
        match self.stop {
            StopChoice::Fixed => StopPlan::Fixed(self.entry * (Decimal::ONE - self.stop_pct)),
            StopChoice::Trailing => StopPlan::Trailing(Some(Trail::Percent(self.stop_pct))),
            StopChoice::Smart => StopPlan::Smart,
            StopChoice::None => StopPlan::None,
        }
    }

    fn replay(&self, system: &RiskSystem, start: DateTime<Utc>) -> anyhow::Result<SimulationResult> {
        system.reset_session(self.account, start);

        let quantity = system.size(&self.symbol, self.entry, self.account);
        let stop_price = self.entry * (Decimal::ONE - self.stop_pct);
        let intent = TradeIntent::buy(self.symbol.as_str(), quantity, self.entry).with_stop(stop_price);
        let decision = system.open_position(&intent, self.account, self.stop_plan(), start)?;
        tracing::info!(
            symbol = %self.symbol,
            quantity,
            allowed = decision.allowed,
            reason = %decision.reason,
            "Simulated entry"
        );

        let mut exits = Vec::new();
        let mut realized = dec!(0);
        for (i, price) in self.price_path().into_iter().enumerate() {
            let now = start + Duration::seconds(i as i64 + 1);
            if let Some(trigger) = system.on_tick(&PriceTick::new(self.symbol.as_str(), price, now)) {
                realized += (trigger.exit.price - trigger.order.entry_price)
                    * Decimal::from(trigger.exit.quantity);
                exits.push(trigger.exit);
            }

            let unrealized: Decimal = system.positions().iter().map(|p| p.unrealized_pnl).sum();
            let daily_pnl = realized + unrealized;
            let equity = self.account + daily_pnl;
            let snapshot = AccountSnapshot {
                cash: equity - system.positions().iter().map(|p| p.market_value).sum::<Decimal>(),
                equity,
                timestamp: now,
            };
            system.refresh_metrics(&snapshot, daily_pnl);
            system.monitor().run_cycle()?;
        }

        Ok(SimulationResult {
            quantity,
            decision,
            exits,
            status: system.status(),
            dashboard: system.dashboard(),
            report: system.report(self.report_hours),
        })
    }
}
