//! Structured logging setup

use serde::{Deserialize, Serialize};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable format
    #[default]
    Pretty,
    /// JSON format for log aggregation
    Json,
}

/// Filter used when `RUST_LOG` is unset
///
/// This crate logs at `level`; dependencies stay at `warn` unless `level`
/// is quieter.
pub fn default_directives(level: &str) -> String {
    let level = level.trim().to_ascii_lowercase();
    let deps = match level.as_str() {
        "error" | "off" => level.as_str(),
        _ => "warn",
    };
    format!("{deps},risk_shield={level}")
}

fn build_filter(level: &str) -> anyhow::Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(default_directives(level))
        .map_err(|e| anyhow::anyhow!("Invalid log level {level:?}: {e}"))
}

/// Initialize logging with the given level and format
///
/// `RUST_LOG` overrides `level` when set. Logs go to stderr so command
/// output on stdout stays machine-readable.
pub fn init_logging(level: &str, format: LogFormat) -> anyhow::Result<()> {
    let registry = tracing_subscriber::registry().with(build_filter(level)?);

    let result = match format {
        LogFormat::Pretty => registry.with(fmt::layer().with_writer(std::io::stderr)).try_init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init(),
    };
    result.map_err(|e| anyhow::anyhow!("Failed to init logging: {}", e))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directives_scope_crate() {
        assert_eq!(default_directives("info"), "warn,risk_shield=info");
        assert_eq!(default_directives(" DEBUG "), "warn,risk_shield=debug");
        assert_eq!(default_directives("error"), "error,risk_shield=error");
    }

    #[test]
    fn test_default_directives_parse() {
        for level in ["trace", "debug", "info", "warn", "error", "off"] {
            assert!(EnvFilter::try_new(default_directives(level)).is_ok(), "{level}");
        }
    }

    #[test]
    fn test_log_format_from_config() {
        #[derive(Deserialize)]
        struct Wrapper {
            format: LogFormat,
        }
        let parsed: Wrapper = toml::from_str("format = \"json\"").unwrap();
        assert_eq!(parsed.format, LogFormat::Json);
    }
}
