//! End-to-end market data pipeline.
//!
//! Staged processing, each stage running as a pull-driven stream over the previous one:
//!
//! 1. **Merge**: k-way merge of every source into one chronological event stream.
//! 2. **Assemble**: group same-timestamp events into 1-minute snapshots.
//! 3. **Repair** (optional): insert flat fillers for missing minutes.
//! 4. **Synchronize**: aggregate every symbol to the configured timeframe and release a
//!    snapshot only once all of them closed the window.
//! 5. **Guard** (optional): drop snapshots whose window is still open.

use crate::application::market_data::{
    BucketSynchronizer, FutureCandleGuard, GapFiller, SnapshotAssembler, SourceMerge,
};
use crate::application::pipeline::stage::run_stage;
use crate::domain::errors::PipelineError;
use crate::domain::market::{Snapshot, Timeframe};
use crate::domain::ports::{Clock, EventSource, SnapshotSink};
use crate::infrastructure::observability::Metrics;
use anyhow::{Context, Result};
use futures::stream::{BoxStream, StreamExt};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineSettings {
    pub symbols: Vec<String>,
    pub timeframe: Timeframe,
    pub gap_fill_enabled: bool,
    pub future_guard_enabled: bool,
}

impl PipelineSettings {
    /// Settings with gap repair and the future guard both enabled.
    pub fn new<I, S>(symbols: I, timeframe: Timeframe) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            symbols: symbols.into_iter().map(Into::into).collect(),
            timeframe,
            gap_fill_enabled: true,
            future_guard_enabled: true,
        }
    }
}

/// Outcome of a completed run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineReport {
    pub snapshots_emitted: usize,
    pub first_timestamp: Option<i64>,
    pub last_timestamp: Option<i64>,
}

impl PipelineReport {
    fn record(&mut self, snapshot: &Snapshot) {
        self.snapshots_emitted += 1;
        if let Some(ts) = snapshot.timestamp() {
            self.first_timestamp.get_or_insert(ts);
            self.last_timestamp = Some(ts);
        }
    }
}

pub struct MarketDataPipeline {
    settings: PipelineSettings,
    clock: Arc<dyn Clock>,
    metrics: Option<Metrics>,
}

impl MarketDataPipeline {
    pub fn new(settings: PipelineSettings, clock: Arc<dyn Clock>) -> Self {
        Self {
            settings,
            clock,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Wires every stage over `sources` and returns the resulting snapshot stream.
    ///
    /// # Errors
    /// `InvalidConfig` when no symbol is tracked.
    pub fn build(
        &self,
        sources: Vec<EventSource>,
    ) -> Result<BoxStream<'static, Result<Snapshot, PipelineError>>, PipelineError> {
        let settings = &self.settings;
        if settings.symbols.is_empty() {
            return Err(PipelineError::InvalidConfig(
                "at least one symbol must be tracked".to_string(),
            ));
        }

        let synchronizer =
            BucketSynchronizer::new(settings.symbols.iter().cloned(), settings.timeframe);

        info!(
            "MarketDataPipeline: {} source(s), symbols {:?}, timeframe {}, gap fill {}, future guard {}",
            sources.len(),
            synchronizer.tracked_symbols(),
            settings.timeframe,
            settings.gap_fill_enabled,
            settings.future_guard_enabled
        );

        let mut merge = SourceMerge::new(sources);
        if let Some(metrics) = &self.metrics {
            merge = merge.with_metrics(metrics.clone());
        }

        let mut stream = run_stage(merge.into_stream(), SnapshotAssembler::new());
        if let Some(metrics) = self.metrics.clone() {
            stream = stream
                .inspect(move |item| {
                    if item.is_ok() {
                        metrics.snapshots_assembled_total.inc();
                    }
                })
                .boxed();
        }

        if settings.gap_fill_enabled {
            let mut filler = GapFiller::new();
            if let Some(metrics) = &self.metrics {
                filler = filler.with_metrics(metrics.clone());
            }
            stream = run_stage(stream, filler);
        }

        stream = run_stage(stream, synchronizer);

        if settings.future_guard_enabled {
            let mut guard = FutureCandleGuard::new(settings.timeframe, self.clock.clone());
            if let Some(metrics) = &self.metrics {
                guard = guard.with_metrics(metrics.clone());
            }
            stream = run_stage(stream, guard);
        }

        Ok(stream)
    }

    /// Drives the pipeline to completion, handing every snapshot to `sink`.
    ///
    /// Stops at the first stage error or sink failure.
    pub async fn run(
        &self,
        sources: Vec<EventSource>,
        sink: &dyn SnapshotSink,
    ) -> Result<PipelineReport> {
        let mut stream = self.build(sources)?;
        let mut report = PipelineReport::default();

        while let Some(item) = stream.next().await {
            let snapshot = match item {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    warn!(
                        "MarketDataPipeline: stopped after {} snapshot(s): {}",
                        report.snapshots_emitted, e
                    );
                    return Err(e.into());
                }
            };

            sink.on_snapshot(&snapshot)
                .await
                .context("Snapshot sink rejected snapshot")?;

            report.record(&snapshot);
            if let Some(metrics) = &self.metrics {
                metrics.snapshots_emitted_total.inc();
                if let Some(ts) = snapshot.timestamp() {
                    metrics.last_snapshot_timestamp.set(ts);
                }
            }
        }

        info!(
            "MarketDataPipeline: finished, {} snapshot(s) emitted",
            report.snapshots_emitted
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::market::{Candle, MINUTE_MS};
    use crate::infrastructure::clock::FixedClock;
    use crate::infrastructure::mock::candle_source;
    use crate::infrastructure::sinks::ChannelSink;
    use rust_decimal_macros::dec;
    use tokio::sync::mpsc;

    // 2024-01-01 00:00:00 UTC
    const T0: i64 = 1704067200000;

    fn minutes(range: std::ops::Range<i64>) -> Vec<Candle> {
        range
            .map(|i| Candle::flat(T0 + i * MINUTE_MS, dec!(100)))
            .collect()
    }

    fn clock() -> Arc<FixedClock> {
        Arc::new(FixedClock::new(T0 + 24 * 60 * MINUTE_MS))
    }

    #[test]
    fn test_build_rejects_empty_symbols() {
        let pipeline =
            MarketDataPipeline::new(PipelineSettings::new(Vec::<String>::new(), Timeframe::FiveMin), clock());

        assert!(matches!(
            pipeline.build(vec![]),
            Err(PipelineError::InvalidConfig(_))
        ));
    }

    #[tokio::test]
    async fn test_one_minute_pass_through() {
        let pipeline = MarketDataPipeline::new(PipelineSettings::new(["A"], Timeframe::OneMin), clock());
        let (tx, mut rx) = mpsc::channel(16);

        let report = pipeline
            .run(vec![candle_source("A", minutes(0..3))], &ChannelSink::new(tx))
            .await
            .unwrap();

        assert_eq!(report.snapshots_emitted, 3);
        assert_eq!(report.first_timestamp, Some(T0));
        assert_eq!(report.last_timestamp, Some(T0 + 2 * MINUTE_MS));
        assert_eq!(rx.recv().await.unwrap().timestamp(), Some(T0));
    }

    #[tokio::test]
    async fn test_future_guard_drops_open_window() {
        let clock = Arc::new(FixedClock::new(T0 + 5 * MINUTE_MS - 1));
        let metrics = Metrics::new().unwrap();
        let pipeline = MarketDataPipeline::new(PipelineSettings::new(["A"], Timeframe::FiveMin), clock)
            .with_metrics(metrics.clone());
        let (tx, _rx) = mpsc::channel(16);

        let report = pipeline
            .run(vec![candle_source("A", minutes(0..5))], &ChannelSink::new(tx))
            .await
            .unwrap();

        assert_eq!(report.snapshots_emitted, 0);
        assert_eq!(metrics.future_snapshots_dropped_total.get(), 1);
    }

    #[tokio::test]
    async fn test_guard_disabled_forwards_open_window() {
        let mut settings = PipelineSettings::new(["A"], Timeframe::FiveMin);
        settings.future_guard_enabled = false;
        let pipeline = MarketDataPipeline::new(settings, Arc::new(FixedClock::new(0)));
        let (tx, _rx) = mpsc::channel(16);

        let report = pipeline
            .run(vec![candle_source("A", minutes(0..5))], &ChannelSink::new(tx))
            .await
            .unwrap();

        assert_eq!(report.snapshots_emitted, 1);
    }

    #[tokio::test]
    async fn test_missing_symbol_stops_run() {
        let pipeline = MarketDataPipeline::new(PipelineSettings::new(["A", "B"], Timeframe::OneMin), clock());
        let (tx, _rx) = mpsc::channel(16);

        let err = pipeline
            .run(vec![candle_source("A", minutes(0..2))], &ChannelSink::new(tx))
            .await
            .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::MissingSymbols { .. })
        ));
    }
}
