//! Prometheus metrics definitions for candlesync
//!
//! All metrics use the `candlesync_` prefix and are read-only.

use prometheus::{IntCounter, IntGauge, Opts, Registry, TextEncoder};
use std::sync::Arc;

/// Prometheus metrics for the sync pipeline
#[derive(Clone)]
pub struct Metrics {
    registry: Arc<Registry>,
    /// Raw events forwarded by the multi-source merge
    pub raw_events_merged_total: IntCounter,
    /// Raw events dropped because they arrived behind the merge frontier
    pub out_of_order_events_total: IntCounter,
    /// 1-minute snapshots assembled from raw events
    pub snapshots_assembled_total: IntCounter,
    /// Synthetic minutes inserted by gap repair
    pub gap_minutes_filled_total: IntCounter,
    /// Snapshots dropped because their window had not closed yet
    pub future_snapshots_dropped_total: IntCounter,
    /// Snapshots delivered to the sink
    pub snapshots_emitted_total: IntCounter,
    /// Start time (epoch ms) of the last delivered snapshot
    pub last_snapshot_timestamp: IntGauge,
}

fn counter(registry: &Registry, name: &str, help: &str) -> anyhow::Result<IntCounter> {
    let counter = IntCounter::with_opts(Opts::new(name, help))?;
    registry.register(Box::new(counter.clone()))?;
    Ok(counter)
}

impl Metrics {
    /// Create a new Metrics instance with all gauges and counters registered
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let raw_events_merged_total = counter(
            &registry,
            "candlesync_raw_events_merged_total",
            "Raw events forwarded by the source merge",
        )?;
        let out_of_order_events_total = counter(
            &registry,
            "candlesync_out_of_order_events_total",
            "Raw events dropped for arriving out of order",
        )?;
        let snapshots_assembled_total = counter(
            &registry,
            "candlesync_snapshots_assembled_total",
            "1-minute snapshots assembled from raw events",
        )?;
        let gap_minutes_filled_total = counter(
            &registry,
            "candlesync_gap_minutes_filled_total",
            "Synthetic minutes inserted by gap repair",
        )?;
        let future_snapshots_dropped_total = counter(
            &registry,
            "candlesync_future_snapshots_dropped_total",
            "Snapshots dropped because their window is still open",
        )?;
        let snapshots_emitted_total = counter(
            &registry,
            "candlesync_snapshots_emitted_total",
            "Snapshots delivered to the sink",
        )?;

        let last_snapshot_timestamp = IntGauge::with_opts(Opts::new(
            "candlesync_last_snapshot_timestamp",
            "Start time in epoch milliseconds of the last delivered snapshot",
        ))?;
        registry.register(Box::new(last_snapshot_timestamp.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            raw_events_merged_total,
            out_of_order_events_total,
            snapshots_assembled_total,
            gap_minutes_filled_total,
            future_snapshots_dropped_total,
            snapshots_emitted_total,
            last_snapshot_timestamp,
        })
    }

    /// Render all metrics in Prometheus text format
    pub fn render(&self) -> String {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        encoder
            .encode_to_string(&metric_families)
            .unwrap_or_default()
    }
}
