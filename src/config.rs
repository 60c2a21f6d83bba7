//! Configuration types for risk-shield

use crate::monitor::MonitorConfig;
use crate::position::{PositionLimits, SizingMethod};
use crate::risk::RiskLimits;
use crate::stops::StopLossConfig;
use crate::telemetry::LogFormat;
use serde::Deserialize;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub limits: RiskLimits,
    #[serde(default)]
    pub positions: PositionLimits,
    #[serde(default)]
    pub sizing: SizingMethod,
    #[serde(default)]
    pub stops: StopLossConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// Telemetry configuration
#[derive(Debug, Clone, Deserialize)]
pub struct TelemetryConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub log_format: LogFormat,
    /// Prometheus listener port; disabled when unset
    #[serde(default)]
    pub metrics_port: Option<u16>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: LogFormat::Pretty,
            metrics_port: None,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            limits: RiskLimits::default(),
            positions: PositionLimits::default(),
            sizing: SizingMethod::default(),
            stops: StopLossConfig::default(),
            monitor: MonitorConfig::default(),
            telemetry: TelemetryConfig::default(),
        }
    }
}

impl Config {
    /// Load and validate configuration from a TOML file
    pub fn load(path: impl AsRef<std::path::Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse and validate configuration from TOML text
    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the sections that are not validated while deserializing
    pub fn validate(&self) -> anyhow::Result<()> {
        self.positions.validate()?;
        self.stops.validate()?;
        self.monitor.validate()?;
        Ok(())
    }
}
