//! Check-config command implementation

use crate::config::Config;
use crate::risk::pct;
use clap::Args;

#[derive(Args, Debug)]
pub struct CheckConfigArgs {
    /// Print the full parsed configuration
    #[arg(long)]
    pub verbose: bool,
}

impl CheckConfigArgs {
    pub fn execute(&self, path: &str) -> anyhow::Result<()> {
        let config = Config::load(path)?;
        tracing::info!(path, "Configuration valid");

        let limits = &config.limits;
        println!("Configuration OK: {path}");
        println!(
            "  Limits: single loss {}, daily loss {}, position {} (x{} leverage), total {}",
            pct(limits.max_single_loss_pct()),
            pct(limits.max_daily_loss_pct()),
            pct(limits.max_position_pct()),
            limits.max_leverage(),
            pct(limits.max_total_position_pct()),
        );
        println!(
            "  Halts: {} consecutive losses, account below {}",
            limits.max_consecutive_losses(),
            limits.min_account_value()
        );
        println!("  Sizing: {}", config.sizing.mode_name());
        println!(
            "  Monitor: every {}s, alert cooldown {}s",
            config.monitor.check_interval_secs, config.monitor.alert_cooldown_secs
        );
        if self.verbose {
            println!("{config:#?}");
        }
        Ok(())
    }
}
