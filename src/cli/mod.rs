//! CLI interface for risk-shield
//!
//! Provides subcommands for:
//! - `check-config`: Load and validate a configuration file
//! - `simulate`: Replay a price path through the risk system
//! - `limits`: Show the default risk limits

mod check;
mod limits;
mod simulate;

pub use check::CheckConfigArgs;
pub use limits::LimitsArgs;
pub use simulate::SimulateArgs;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "risk-shield")]
#[command(about = "Risk control and protection for automated trading")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Load, validate and print the configuration
    CheckConfig(CheckConfigArgs),
    /// Replay a price path through the risk system
    Simulate(SimulateArgs),
    /// Show the default risk limits
    Limits(LimitsArgs),
}
