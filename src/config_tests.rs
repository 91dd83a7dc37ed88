use crate::config::Config;
use crate::domain::market::Timeframe;
use std::env;
use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::OnceLock;

// Global lock to prevent race conditions when modifying environment variables in tests
static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

fn get_env_lock() -> &'static Mutex<()> {
    ENV_LOCK.get_or_init(|| Mutex::new(()))
}

const VARS: [&str; 7] = [
    "SYMBOLS",
    "TIMEFRAME",
    "GAP_FILL_ENABLED",
    "FUTURE_GUARD_ENABLED",
    "SOURCE_FILES",
    "OBSERVABILITY_ENABLED",
    "OBSERVABILITY_INTERVAL",
];

fn clear_vars() {
    for var in VARS {
        unsafe { env::remove_var(var) };
    }
}

#[test]
fn test_config_defaults() {
    let _guard = get_env_lock().lock().unwrap();
    clear_vars();

    let config = Config::from_env().unwrap();

    assert_eq!(config.symbols, vec!["BTC/USDT", "ETH/USDT"]);
    assert_eq!(config.timeframe, Timeframe::FiveMin);
    assert!(config.gap_fill_enabled);
    assert!(config.future_guard_enabled);
    assert!(config.source_files.is_empty());
    assert!(config.observability_enabled);
    assert_eq!(config.observability_interval, 60);
}

#[test]
fn test_config_from_env_values() {
    let _guard = get_env_lock().lock().unwrap();
    clear_vars();
    unsafe {
        env::set_var("SYMBOLS", "SOL/USDT, ADA/USDT");
        env::set_var("TIMEFRAME", "1M");
        env::set_var("GAP_FILL_ENABLED", "false");
        env::set_var("SOURCE_FILES", "a.csv,b.csv");
        env::set_var("OBSERVABILITY_INTERVAL", "15");
    }

    let config = Config::from_env().unwrap();

    assert_eq!(config.symbols, vec!["SOL/USDT", "ADA/USDT"]);
    assert_eq!(config.timeframe, Timeframe::OneMonth);
    assert!(!config.gap_fill_enabled);
    assert_eq!(
        config.source_files,
        vec![PathBuf::from("a.csv"), PathBuf::from("b.csv")]
    );
    assert_eq!(config.observability_interval, 15);

    let settings = config.pipeline_settings();
    assert_eq!(settings.symbols.len(), 2);
    assert!(!settings.gap_fill_enabled);
    assert!(settings.future_guard_enabled);

    clear_vars();
}

#[test]
fn test_undocumented_timeframe_rejected() {
    let _guard = get_env_lock().lock().unwrap();
    clear_vars();
    unsafe { env::set_var("TIMEFRAME", "7m") };

    let err = Config::from_env().unwrap_err();
    assert!(format!("{:#}", err).contains("TIMEFRAME"));

    clear_vars();
}

#[test]
fn test_blank_symbols_rejected() {
    let _guard = get_env_lock().lock().unwrap();
    clear_vars();
    unsafe { env::set_var("SYMBOLS", " , ") };

    assert!(Config::from_env().is_err());

    clear_vars();
}
