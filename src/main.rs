use clap::Parser;
use risk_shield::cli::{Cli, Commands};
use risk_shield::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // check-config reports load errors instead of falling back
    if let Commands::CheckConfig(args) = &cli.command {
        return args.execute(&cli.config);
    }

    let config = match Config::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Warning: Could not load config from {}: {}", cli.config, e);
            eprintln!("Using default configuration");
            Config::parse(include_str!("../config.toml.example"))?
        }
    };

    let _telemetry = risk_shield::telemetry::init_telemetry(&config.telemetry)?;

    match cli.command {
        Commands::Simulate(args) => {
            tracing::info!("Starting simulation");
            args.execute(&config).await?;
        }
        Commands::Limits(args) => args.execute()?,
        Commands::CheckConfig(_) => {}
    }

    Ok(())
}
