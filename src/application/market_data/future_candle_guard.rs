use crate::domain::market::{Snapshot, Timeframe};
use crate::domain::ports::Clock;
use crate::infrastructure::observability::Metrics;
use std::sync::Arc;
use tracing::warn;

/// Drops snapshots whose window has not closed yet according to the wall clock.
///
/// Protects the consumer from clock skew between sources and from upstreams that emit a
/// window before it is over. Keeps no state between snapshots.
pub struct FutureCandleGuard {
    timeframe: Timeframe,
    clock: Arc<dyn Clock>,
    metrics: Option<Metrics>,
}

impl FutureCandleGuard {
    pub fn new(timeframe: Timeframe, clock: Arc<dyn Clock>) -> Self {
        Self {
            timeframe,
            clock,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Returns the snapshot if its window is closed, `None` if it was dropped.
    pub fn check(&self, snapshot: Snapshot) -> Option<Snapshot> {
        let Some((symbol, candle)) = snapshot.representative() else {
            return Some(snapshot);
        };

        let Some(closes_at) = self.timeframe.window_end_ms(candle.timestamp) else {
            warn!(
                "FutureCandleGuard: dropping {} snapshot at {} ({}), window end is not a valid UTC time",
                self.timeframe, candle.timestamp, symbol
            );
            self.count_drop();
            return None;
        };

        let now = self.clock.now_millis();
        if closes_at > now {
            warn!(
                "FutureCandleGuard: dropping {} snapshot at {} ({}), window closes at {} but now is {}",
                self.timeframe,
                candle.timestamp,
                symbol,
                closes_at,
                now
            );
            self.count_drop();
            return None;
        }

        Some(snapshot)
    }

    fn count_drop(&self) {
        if let Some(metrics) = &self.metrics {
            metrics.future_snapshots_dropped_total.inc();
        }
    }
}
