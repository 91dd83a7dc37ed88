//! Pipeline configuration parsing from environment variables.
//!
//! This module handles loading the tracked symbols, the output timeframe, the optional
//! stages and the CSV files replayed by the runner.

use crate::domain::market::timeframe::Timeframe;
use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;

/// Pipeline environment configuration
#[derive(Debug, Clone)]
pub struct PipelineEnvConfig {
    pub symbols: Vec<String>,
    pub timeframe: Timeframe,
    pub gap_fill_enabled: bool,
    pub future_guard_enabled: bool,
    pub source_files: Vec<PathBuf>,
}

/// Splits a comma separated list, dropping blanks.
pub(crate) fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

impl PipelineEnvConfig {
    pub fn from_env() -> Result<Self> {
        let symbols = parse_list(
            &env::var("SYMBOLS").unwrap_or_else(|_| "BTC/USDT,ETH/USDT".to_string()),
        );
        if symbols.is_empty() {
            anyhow::bail!("SYMBOLS must name at least one symbol");
        }

        let timeframe = env::var("TIMEFRAME")
            .unwrap_or_else(|_| "5m".to_string())
            .parse::<Timeframe>()
            .context("Failed to parse TIMEFRAME")?;

        let gap_fill_enabled = env::var("GAP_FILL_ENABLED")
            .unwrap_or_else(|_| "true".to_string())
            .parse::<bool>()
            .context("Failed to parse GAP_FILL_ENABLED")?;

        let future_guard_enabled = env::var("FUTURE_GUARD_ENABLED")
            .unwrap_or_else(|_| "true".to_string())
            .parse::<bool>()
            .context("Failed to parse FUTURE_GUARD_ENABLED")?;

        let source_files = parse_list(&env::var("SOURCE_FILES").unwrap_or_default())
            .into_iter()
            .map(PathBuf::from)
            .collect();

        Ok(Self {
            symbols,
            timeframe,
            gap_fill_enabled,
            future_guard_enabled,
            source_files,
        })
    }
}
