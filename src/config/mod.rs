//! Configuration module for candlesync.
//!
//! This module provides structured configuration loading from environment variables,
//! organized by domain: Pipeline and Observability.

mod observability_config;
mod pipeline_config;

pub use observability_config::ObservabilityEnvConfig;
pub use pipeline_config::PipelineEnvConfig;

use crate::application::pipeline::PipelineSettings;
use crate::domain::market::timeframe::Timeframe;
use anyhow::{Context, Result};
use std::path::PathBuf;

/// Main application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    // Pipeline (from PipelineEnvConfig)
    pub symbols: Vec<String>,
    pub timeframe: Timeframe,
    pub gap_fill_enabled: bool,
    pub future_guard_enabled: bool,
    pub source_files: Vec<PathBuf>,

    // Observability (from ObservabilityEnvConfig)
    pub observability_enabled: bool,
    pub observability_interval: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let pipeline = PipelineEnvConfig::from_env().context("Failed to load pipeline config")?;
        let observability = ObservabilityEnvConfig::from_env();

        Ok(Self {
            symbols: pipeline.symbols,
            timeframe: pipeline.timeframe,
            gap_fill_enabled: pipeline.gap_fill_enabled,
            future_guard_enabled: pipeline.future_guard_enabled,
            source_files: pipeline.source_files,

            observability_enabled: observability.enabled,
            observability_interval: observability.interval_seconds,
        })
    }

    /// Settings handed to [`crate::application::pipeline::MarketDataPipeline`].
    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            symbols: self.symbols.clone(),
            timeframe: self.timeframe,
            gap_fill_enabled: self.gap_fill_enabled,
            future_guard_enabled: self.future_guard_enabled,
        }
    }
}
