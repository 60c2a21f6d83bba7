//! Limits command implementation

use crate::risk::RiskLimits;
use clap::Args;

#[derive(Args, Debug)]
pub struct LimitsArgs {
    /// Output format: toml or json
    #[arg(long, default_value = "toml")]
    pub format: String,
}

impl LimitsArgs {
    pub fn execute(&self) -> anyhow::Result<()> {
        let limits = RiskLimits::default();
        match self.format.as_str() {
            "json" => println!("{}", serde_json::to_string_pretty(&limits)?),
            "toml" => println!("{}", render_toml(&limits)),
            other => anyhow::bail!("unknown format {other:?}, expected toml or json"),
        }
        Ok(())
    }
}

fn render_toml(limits: &RiskLimits) -> String {
    [
        "[limits]".to_string(),
        format!("max_single_loss_pct = {}", limits.max_single_loss_pct()),
        format!("max_daily_loss_pct = {}", limits.max_daily_loss_pct()),
        format!("max_position_pct = {}", limits.max_position_pct()),
        format!("max_total_position_pct = {}", limits.max_total_position_pct()),
        format!("max_consecutive_losses = {}", limits.max_consecutive_losses()),
        format!("min_account_value = {}", limits.min_account_value()),
        format!("max_correlation = {}", limits.max_correlation()),
        format!("max_leverage = {}", limits.max_leverage()),
    ]
    .join("\n")
}
