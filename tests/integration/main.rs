//! Integration tests for risk-shield

mod admission_test;
mod config_test;
mod monitor_test;
mod stops_test;
mod system_test;
