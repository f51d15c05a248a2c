//! Configuration validation.
//!
//! Validates all config fields before a backtest runs. Keys that may be
//! omitted are checked against the same defaults the CLI falls back to.

use crate::domain::error::SynthError;
use crate::domain::timeframe::Timeframe;
use crate::ports::config_port::ConfigPort;
use chrono::NaiveDate;

pub const DEFAULT_TIMEFRAME: &str = "1m";
pub const DEFAULT_RISK_PER_TRADE: f64 = 0.01;
pub const DEFAULT_MIN_CONFIDENCE: f64 = 0.7;

pub fn validate_backtest_config(config: &dyn ConfigPort) -> Result<(), SynthError> {
    validate_symbol(config)?;
    validate_timeframe(config)?;
    validate_dates(config)?;
    validate_initial_balance(config)?;
    validate_unit_interval(
        config,
        "backtest",
        "risk_per_trade",
        DEFAULT_RISK_PER_TRADE,
    )?;
    validate_unit_interval(
        config,
        "backtest",
        "min_confidence_threshold",
        DEFAULT_MIN_CONFIDENCE,
    )?;
    Ok(())
}

pub fn validate_simulation_config(config: &dyn ConfigPort) -> Result<(), SynthError> {
    validate_positive(config, "exits", "stop_loss_pct", 0.01)?;
    validate_positive(config, "exits", "take_profit_pct", 0.02)?;
    if config.get_double("exits", "confidence_multiplier_base", 0.5) < 0.0 {
        return Err(SynthError::invalid(
            "exits",
            "confidence_multiplier_base",
            "confidence_multiplier_base must be non-negative",
        ));
    }
    validate_unit_interval(config, "exits", "confidence_floor", 0.6)?;

    validate_at_least_one(config, "simulation", "candle_window", 50)?;
    validate_at_least_one(config, "simulation", "tick_capacity", 5_000)?;
    validate_at_least_one(config, "simulation", "candle_capacity", 500)?;
    validate_at_least_one(config, "simulation", "signal_interval", 1)?;

    if config.get_int("data", "max_retries", 3) < 0 {
        return Err(SynthError::invalid(
            "data",
            "max_retries",
            "max_retries must be non-negative",
        ));
    }
    if config.get_int("data", "pace_ms", 500) < 0 {
        return Err(SynthError::invalid(
            "data",
            "pace_ms",
            "pace_ms must be non-negative",
        ));
    }
    Ok(())
}

fn validate_symbol(config: &dyn ConfigPort) -> Result<(), SynthError> {
    match config.get_string("backtest", "symbol") {
        Some(s) if !s.trim().is_empty() => Ok(()),
        _ => Err(SynthError::missing("backtest", "symbol")),
    }
}

fn validate_timeframe(config: &dyn ConfigPort) -> Result<(), SynthError> {
    let value = config
        .get_string("backtest", "timeframe")
        .unwrap_or_else(|| DEFAULT_TIMEFRAME.to_string());
    value.parse::<Timeframe>().map(|_| ())
}

fn validate_initial_balance(config: &dyn ConfigPort) -> Result<(), SynthError> {
    let value = config.get_double("backtest", "initial_balance", 0.0);
    if value <= 0.0 {
        return Err(SynthError::invalid(
            "backtest",
            "initial_balance",
            "initial_balance must be positive",
        ));
    }
    Ok(())
}

fn validate_unit_interval(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: f64,
) -> Result<(), SynthError> {
    let value = config.get_double(section, key, default);
    if !(0.0..=1.0).contains(&value) {
        return Err(SynthError::invalid(
            section,
            key,
            format!("{key} must be between 0 and 1"),
        ));
    }
    Ok(())
}

fn validate_positive(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: f64,
) -> Result<(), SynthError> {
    if config.get_double(section, key, default) <= 0.0 {
        return Err(SynthError::invalid(
            section,
            key,
            format!("{key} must be positive"),
        ));
    }
    Ok(())
}

fn validate_at_least_one(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: i64,
) -> Result<(), SynthError> {
    if config.get_int(section, key, default) < 1 {
        return Err(SynthError::invalid(
            section,
            key,
            format!("{key} must be at least 1"),
        ));
    }
    Ok(())
}

fn validate_dates(config: &dyn ConfigPort) -> Result<(), SynthError> {
    let start_str = config.get_string("backtest", "start_date");
    let end_str = config.get_string("backtest", "end_date");

    let start_date = parse_date(start_str.as_deref(), "start_date")?;
    let end_date = parse_date(end_str.as_deref(), "end_date")?;

    if start_date >= end_date {
        return Err(SynthError::invalid(
            "backtest",
            "start_date",
            "start_date must be before end_date",
        ));
    }
    Ok(())
}

pub fn parse_date(value: Option<&str>, field: &str) -> Result<NaiveDate, SynthError> {
    match value {
        None => Err(SynthError::missing("backtest", field)),
        Some(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").map_err(|_| {
            SynthError::invalid(
                "backtest",
                field,
                format!("invalid {field} format, expected YYYY-MM-DD"),
            )
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_config_adapter::FileConfigAdapter;

    fn make_config(content: &str) -> FileConfigAdapter {
        FileConfigAdapter::from_string(content).unwrap()
    }

    const VALID: &str = r#"
[backtest]
symbol = BOOM1000
timeframe = 5m
start_date = 2024-01-01
end_date = 2024-03-31
initial_balance = 1000.0
risk_per_trade = 0.01
min_confidence_threshold = 0.7
"#;

    fn assert_invalid(result: Result<(), SynthError>, expected_key: &str) {
        match result {
            Err(SynthError::ConfigInvalid { key, .. }) => assert_eq!(key, expected_key),
            other => panic!("expected ConfigInvalid for {expected_key}, got {other:?}"),
        }
    }

    #[test]
    fn valid_backtest_config_passes() {
        assert!(validate_backtest_config(&make_config(VALID)).is_ok());
    }

    #[test]
    fn missing_symbol_fails() {
        let config = make_config(&VALID.replace("symbol = BOOM1000\n", ""));
        assert!(matches!(
            validate_backtest_config(&config),
            Err(SynthError::ConfigMissing { ref key, .. }) if key == "symbol"
        ));
    }

    #[test]
    fn timeframe_defaults_when_omitted() {
        let config = make_config(&VALID.replace("timeframe = 5m\n", ""));
        assert!(validate_backtest_config(&config).is_ok());
    }

    #[test]
    fn unknown_timeframe_fails() {
        let config = make_config(&VALID.replace("timeframe = 5m", "timeframe = 7m"));
        assert_invalid(validate_backtest_config(&config), "timeframe");
    }

    #[test]
    fn initial_balance_zero_fails() {
        let config = make_config(&VALID.replace("initial_balance = 1000.0", "initial_balance = 0"));
        assert_invalid(validate_backtest_config(&config), "initial_balance");
    }

    #[test]
    fn risk_per_trade_out_of_range_fails() {
        let config = make_config(&VALID.replace("risk_per_trade = 0.01", "risk_per_trade = 1.5"));
        assert_invalid(validate_backtest_config(&config), "risk_per_trade");
    }

    #[test]
    fn min_confidence_negative_fails() {
        let config = make_config(&VALID.replace(
            "min_confidence_threshold = 0.7",
            "min_confidence_threshold = -0.1",
        ));
        assert_invalid(validate_backtest_config(&config), "min_confidence_threshold");
    }

    #[test]
    fn invalid_start_date_format_fails() {
        let config = make_config(&VALID.replace("2024-01-01", "01/01/2024"));
        assert_invalid(validate_backtest_config(&config), "start_date");
    }

    #[test]
    fn missing_end_date_fails() {
        let config = make_config(&VALID.replace("end_date = 2024-03-31\n", ""));
        assert!(matches!(
            validate_backtest_config(&config),
            Err(SynthError::ConfigMissing { ref key, .. }) if key == "end_date"
        ));
    }

    #[test]
    fn start_date_after_end_date_fails() {
        let config = make_config(&VALID.replace("2024-03-31", "2023-12-31"));
        assert_invalid(validate_backtest_config(&config), "start_date");
    }

    #[test]
    fn simulation_defaults_pass() {
        assert!(validate_simulation_config(&make_config("[backtest]\n")).is_ok());
    }

    #[test]
    fn simulation_sections_pass() {
        let config = make_config(
            r#"
[exits]
stop_loss_pct = 0.015
take_profit_pct = 0.03
confidence_multiplier_base = 0.5
confidence_floor = 0.65

[simulation]
candle_window = 100
tick_capacity = 2000
candle_capacity = 200
quality_gate = true

[data]
path = ./data
max_retries = 2
pace_ms = 0
"#,
        );
        assert!(validate_simulation_config(&config).is_ok());
    }

    #[test]
    fn stop_loss_zero_fails() {
        let config = make_config("[exits]\nstop_loss_pct = 0\n");
        assert_invalid(validate_simulation_config(&config), "stop_loss_pct");
    }

    #[test]
    fn confidence_floor_above_one_fails() {
        let config = make_config("[exits]\nconfidence_floor = 1.2\n");
        assert_invalid(validate_simulation_config(&config), "confidence_floor");
    }

    #[test]
    fn candle_window_zero_fails() {
        let config = make_config("[simulation]\ncandle_window = 0\n");
        assert_invalid(validate_simulation_config(&config), "candle_window");
    }

    #[test]
    fn negative_retries_fail() {
        let config = make_config("[data]\nmax_retries = -1\n");
        assert_invalid(validate_simulation_config(&config), "max_retries");
    }
}
