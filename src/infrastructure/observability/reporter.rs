//! Push-based metrics reporter for candlesync
//!
//! Periodically outputs pipeline counters as structured JSON to stdout.
//!
//! **Security**: This system only SENDS data, never accepts requests.

use crate::infrastructure::observability::metrics::Metrics;
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Metrics snapshot for JSON output
#[derive(Serialize)]
pub struct MetricsSnapshot {
    pub timestamp: String,
    pub uptime_seconds: u64,
    pub version: String,
    pub pipeline: PipelineSnapshot,
}

#[derive(Serialize)]
pub struct PipelineSnapshot {
    pub raw_events_merged: u64,
    pub out_of_order_events: u64,
    pub snapshots_assembled: u64,
    pub gap_minutes_filled: u64,
    pub future_snapshots_dropped: u64,
    pub snapshots_emitted: u64,
    pub last_snapshot_timestamp: Option<i64>,
}

/// Push-based metrics reporter
///
/// Outputs metrics as structured JSON logs on a configurable interval.
/// No HTTP server, no incoming connections - only outbound data.
pub struct MetricsReporter {
    metrics: Metrics,
    start_time: Instant,
    interval: Duration,
}

impl MetricsReporter {
    /// Create a new metrics reporter
    ///
    /// # Arguments
    /// * `metrics` - Prometheus metrics shared with the pipeline
    /// * `interval_seconds` - How often to output metrics (default: 60)
    pub fn new(metrics: Metrics, interval_seconds: u64) -> Self {
        Self {
            metrics,
            start_time: Instant::now(),
            interval: Duration::from_secs(interval_seconds),
        }
    }

    /// Run the reporter in a loop, outputting metrics periodically
    pub async fn run(self) {
        info!(
            "MetricsReporter: Starting push-based metrics (interval: {:?})",
            self.interval
        );

        loop {
            tokio::time::sleep(self.interval).await;
            self.report();
        }
    }

    /// Outputs one snapshot immediately
    pub fn report(&self) {
        let snapshot = self.collect_snapshot();
        match serde_json::to_string(&snapshot) {
            Ok(json) => {
                // Use a special prefix so logs can be easily filtered
                println!("METRICS_JSON:{}", json);
                info!(
                    "Merged: {} | Emitted: {} | Gap minutes: {} | Uptime: {}s",
                    snapshot.pipeline.raw_events_merged,
                    snapshot.pipeline.snapshots_emitted,
                    snapshot.pipeline.gap_minutes_filled,
                    snapshot.uptime_seconds
                );
            }
            Err(e) => warn!("Failed to serialize metrics: {}", e),
        }
    }

    fn collect_snapshot(&self) -> MetricsSnapshot {
        let m = &self.metrics;
        let emitted = m.snapshots_emitted_total.get();

        MetricsSnapshot {
            timestamp: chrono::Utc::now().to_rfc3339(),
            uptime_seconds: self.start_time.elapsed().as_secs(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            pipeline: PipelineSnapshot {
                raw_events_merged: m.raw_events_merged_total.get(),
                out_of_order_events: m.out_of_order_events_total.get(),
                snapshots_assembled: m.snapshots_assembled_total.get(),
                gap_minutes_filled: m.gap_minutes_filled_total.get(),
                future_snapshots_dropped: m.future_snapshots_dropped_total.get(),
                snapshots_emitted: emitted,
                last_snapshot_timestamp: (emitted > 0).then(|| m.last_snapshot_timestamp.get()),
            },
        }
    }
}
