use crate::domain::errors::PipelineError;
use crate::domain::market::{Candle, MINUTE_MS, Snapshot};
use crate::domain::validation::StrictCandleValidator;
use crate::infrastructure::observability::Metrics;
use tracing::{debug, warn};

/// Keeps a 1-minute snapshot stream contiguous.
///
/// When one or more minutes are missing between two snapshots, a zero-volume filler is
/// synthesized for each of them from the previous snapshot's closes, so downstream
/// aggregators see every minute of every window. Fillers are produced one at a time by
/// [`GapFiller::next_ready`], so a long outage never materializes in memory.
pub struct GapFiller {
    last_seen: Option<Snapshot>,
    pending: Option<Pending>,
    metrics: Option<Metrics>,
}

/// Output owed for the last accepted snapshot.
struct Pending {
    fill: Option<FillRange>,
    real: Snapshot,
}

/// Minutes `next..end` still to synthesize from `template`.
struct FillRange {
    template: Snapshot,
    next: i64,
    end: i64,
}

impl GapFiller {
    pub fn new() -> Self {
        Self {
            last_seen: None,
            pending: None,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn last_seen(&self) -> Option<&Snapshot> {
        self.last_seen.as_ref()
    }

    /// Accepts one snapshot. Its fillers and the snapshot itself are then drained with
    /// [`GapFiller::next_ready`], which must return `None` before the next call.
    ///
    /// # Errors
    /// `MalformedCandle` if any candle of `snapshot` fails validation.
    pub fn accept(&mut self, snapshot: Snapshot) -> Result<(), PipelineError> {
        debug_assert!(self.pending.is_none(), "GapFiller: accept before drain");
        StrictCandleValidator::validate_snapshot(&snapshot)?;

        let Some(start) = snapshot.timestamp() else {
            debug!("GapFiller: forwarding empty snapshot");
            self.pending = Some(Pending { fill: None, real: snapshot });
            return Ok(());
        };

        let mut fill = None;
        if let Some(last) = self.last_seen.as_ref() {
            let last_start = last.timestamp().unwrap_or(start);
            // Validated timestamps are far below i64::MAX
            let expected = last_start + MINUTE_MS;

            if start < expected {
                // Never move last_seen backwards; the merge owns ordering
                warn!(
                    "GapFiller: snapshot at {} does not follow {}, forwarding unchanged",
                    start, last_start
                );
                self.pending = Some(Pending { fill: None, real: snapshot });
                return Ok(());
            }

            if start > expected {
                let missing = (start - expected) / MINUTE_MS;
                warn!(
                    "GapFiller: {} minute(s) missing between {} and {}, filling",
                    missing, last_start, start
                );
                if let Some(metrics) = &self.metrics {
                    metrics.gap_minutes_filled_total.inc_by(missing as u64);
                }
                fill = Some(FillRange {
                    template: last.clone(),
                    next: expected,
                    end: start,
                });
            }
        }

        self.last_seen = Some(snapshot.clone());
        self.pending = Some(Pending { fill, real: snapshot });
        Ok(())
    }

    /// Next snapshot owed for the last accepted one: fillers in increasing time order,
    /// then the snapshot itself.
    pub fn next_ready(&mut self) -> Result<Option<Snapshot>, PipelineError> {
        let Some(pending) = self.pending.as_mut() else {
            return Ok(None);
        };

        if let Some(fill) = pending.fill.as_mut()
            && fill.next < fill.end
        {
            let filler = Self::synthesize(&fill.template, fill.next)?;
            fill.next += MINUTE_MS;
            return Ok(Some(filler));
        }

        Ok(self.pending.take().map(|pending| pending.real))
    }

    /// Accepts `snapshot` and drains everything it produces.
    ///
    /// # Errors
    /// `MalformedCandle` if any candle of `snapshot` fails validation.
    pub fn process(&mut self, snapshot: Snapshot) -> Result<Vec<Snapshot>, PipelineError> {
        self.accept(snapshot)?;

        let mut output = Vec::new();
        while let Some(next) = self.next_ready()? {
            output.push(next);
        }
        Ok(output)
    }

    /// Collapses every candle of `previous` to its close at `timestamp`.
    fn synthesize(previous: &Snapshot, timestamp: i64) -> Result<Snapshot, PipelineError> {
        Snapshot::from_candles(
            previous
                .iter()
                .map(|(symbol, candle)| (symbol.clone(), Candle::flat(timestamp, candle.close))),
        )
    }
}

impl Default for GapFiller {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    // 2024-01-01 00:00:00 UTC
    const T0: i64 = 1704067200000;

    fn snapshot_at(timestamp: i64, btc_close: rust_decimal::Decimal) -> Snapshot {
        Snapshot::from_candles([
            (
                "BTC/USDT",
                Candle::new(timestamp, dec!(68000), dec!(68200), dec!(67900), btc_close, dec!(3.5)),
            ),
            (
                "ETH/USDT",
                Candle::new(timestamp, dec!(3500), dec!(3510), dec!(3490), dec!(3505), dec!(20)),
            ),
        ])
        .unwrap()
    }

    #[test]
    fn test_first_snapshot_passes_through() {
        let mut filler = GapFiller::new();
        let out = filler.process(snapshot_at(T0, dec!(68100))).unwrap();

        assert_eq!(out, vec![snapshot_at(T0, dec!(68100))]);
        assert!(filler.last_seen().is_some());
    }

    #[test]
    fn test_contiguous_snapshots_untouched() {
        let mut filler = GapFiller::new();
        filler.process(snapshot_at(T0, dec!(68100))).unwrap();
        let out = filler.process(snapshot_at(T0 + MINUTE_MS, dec!(68150))).unwrap();

        assert_eq!(out.len(), 1);
    }

    #[test]
    fn test_three_minute_jump_fills_two() {
        let mut filler = GapFiller::new();
        filler.process(snapshot_at(T0, dec!(68100))).unwrap();

        let out = filler.process(snapshot_at(T0 + 3 * MINUTE_MS, dec!(68300))).unwrap();
        assert_eq!(out.len(), 3);

        for (i, filler_snapshot) in out[..2].iter().enumerate() {
            let expected_ts = T0 + (i as i64 + 1) * MINUTE_MS;
            assert_eq!(filler_snapshot.timestamp(), Some(expected_ts));

            let btc = filler_snapshot.get("BTC/USDT").unwrap();
            assert_eq!(*btc, Candle::flat(expected_ts, dec!(68100)));
            let eth = filler_snapshot.get("ETH/USDT").unwrap();
            assert_eq!(*eth, Candle::flat(expected_ts, dec!(3505)));
        }

        assert_eq!(out[2], snapshot_at(T0 + 3 * MINUTE_MS, dec!(68300)));
        assert_eq!(filler.last_seen().unwrap().timestamp(), Some(T0 + 3 * MINUTE_MS));
    }

    #[test]
    fn test_malformed_candle_is_raised() {
        let mut filler = GapFiller::new();
        let bad = Snapshot::from_candles([(
            "BTC/USDT",
            Candle::new(T0, dec!(68000), dec!(67000), dec!(68500), dec!(68100), dec!(1)),
        )])
        .unwrap();

        assert!(matches!(
            filler.process(bad),
            Err(PipelineError::MalformedCandle { .. })
        ));
        assert!(filler.last_seen().is_none());
    }

    #[test]
    fn test_gap_metrics_counted() {
        let metrics = Metrics::new().unwrap();
        let mut filler = GapFiller::new().with_metrics(metrics.clone());

        filler.process(snapshot_at(T0, dec!(68100))).unwrap();
        filler.process(snapshot_at(T0 + 5 * MINUTE_MS, dec!(68100))).unwrap();

        assert_eq!(metrics.gap_minutes_filled_total.get(), 4);
    }

    #[test]
    fn test_day_long_outage_filled_one_at_a_time() {
        let mut filler = GapFiller::new();
        filler.process(snapshot_at(T0, dec!(68100))).unwrap();

        let next_day = T0 + 1_440 * MINUTE_MS;
        filler.accept(snapshot_at(next_day, dec!(68300))).unwrap();
        assert_eq!(filler.last_seen().unwrap().timestamp(), Some(next_day));

        for minute in 1..=3 {
            let filler_snapshot = filler.next_ready().unwrap().unwrap();
            assert_eq!(filler_snapshot.timestamp(), Some(T0 + minute * MINUTE_MS));
        }

        let rest: Vec<Snapshot> = std::iter::from_fn(|| filler.next_ready().unwrap()).collect();
        assert_eq!(rest.len(), 1_437);
        assert_eq!(rest.last(), Some(&snapshot_at(next_day, dec!(68300))));
        assert!(filler.next_ready().unwrap().is_none());
    }

    #[test]
    fn test_timestamp_beyond_calendar_rejected() {
        let mut filler = GapFiller::new();
        let top = i64::MAX - i64::MAX % MINUTE_MS;

        assert!(matches!(
            filler.process(snapshot_at(top, dec!(68100))),
            Err(PipelineError::MalformedCandle { .. })
        ));
        assert!(filler.last_seen().is_none());
    }

    #[test]
    fn test_stale_snapshot_does_not_rewind() {
        let mut filler = GapFiller::new();
        filler.process(snapshot_at(T0 + MINUTE_MS, dec!(68100))).unwrap();

        let out = filler.process(snapshot_at(T0, dec!(68000))).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(filler.last_seen().unwrap().timestamp(), Some(T0 + MINUTE_MS));
    }
}
