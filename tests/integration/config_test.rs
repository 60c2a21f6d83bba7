//! Configuration loading from disk

use risk_shield::config::Config;
use risk_shield::position::SizingMethod;
use risk_shield::telemetry::LogFormat;
use rust_decimal_macros::dec;
use std::io::Write;

#[test]
fn test_example_config_loads() {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/config.toml.example");
    let config = Config::load(path).unwrap();
    assert_eq!(config.limits.max_daily_loss_pct(), dec!(0.02));
    assert_eq!(config.sizing, SizingMethod::FixedPercentage { pct: dec!(0.05) });
    assert_eq!(config.monitor.alert_cooldown_secs, 300);
}

#[test]
fn test_load_partial_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
[limits]
max_single_loss_pct = 0.01

[sizing]
method = "atr_based"
atr = 2.5
risk_pct = 0.01
atr_multiplier = 2.0

[telemetry]
log_format = "json"
"#
    )
    .unwrap();

    let config = Config::load(file.path()).unwrap();
    assert_eq!(config.limits.max_single_loss_pct(), dec!(0.01));
    assert_eq!(config.sizing.mode_name(), "atr_based");
    assert_eq!(config.telemetry.log_format, LogFormat::Json);
    assert_eq!(config.telemetry.log_level, "info");
    assert_eq!(config.stops.history_size, 500);
}

#[test]
fn test_invalid_limits_rejected_at_load() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[limits]\nmax_daily_loss_pct = 1.5").unwrap();
    let err = Config::load(file.path()).unwrap_err();
    assert!(err.to_string().contains("max_daily_loss_pct"));
}

#[test]
fn test_missing_file_is_error() {
    let dir = tempfile::tempdir().unwrap();
    assert!(Config::load(dir.path().join("absent.toml")).is_err());
}
