use crate::application::market_data::candle_aggregator::PairAggregator;
use crate::domain::errors::PipelineError;
use crate::domain::market::{Candle, Snapshot, Timeframe};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, error, info};

/// Barrier over per-symbol aggregators.
///
/// Emits a higher-timeframe snapshot only once every tracked symbol has completed its
/// window. A symbol that completes early keeps its result buffered until its siblings
/// catch up, so the consumer never observes a partial cross-pair snapshot.
#[derive(Debug)]
pub struct BucketSynchronizer {
    aggregators: BTreeMap<String, PairAggregator>,
    pending: BTreeMap<String, Candle>,
}

impl BucketSynchronizer {
    pub fn new<I, S>(symbols: I, timeframe: Timeframe) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let aggregators: BTreeMap<String, PairAggregator> = symbols
            .into_iter()
            .map(|s| (s.into(), PairAggregator::new(timeframe)))
            .collect();

        info!(
            "BucketSynchronizer: tracking {} symbol(s) on {}",
            aggregators.len(),
            timeframe
        );

        Self {
            aggregators,
            pending: BTreeMap::new(),
        }
    }

    pub fn tracked_symbols(&self) -> BTreeSet<&str> {
        self.aggregators.keys().map(String::as_str).collect()
    }

    /// Number of completed per-symbol results waiting for their siblings
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Feeds one 1-minute snapshot into every tracked symbol's aggregator.
    ///
    /// # Errors
    /// `MissingSymbols` if any tracked symbol is absent from `snapshot`. This is an
    /// upstream contract violation and leaves the synchronizer untouched.
    pub fn add_snapshot(&mut self, snapshot: &Snapshot) -> Result<Option<Snapshot>, PipelineError> {
        self.add_candles(snapshot.iter().map(|(symbol, candle)| (symbol.as_str(), candle)))
    }

    /// Same as [`BucketSynchronizer::add_snapshot`] for loose `(symbol, candle)` pairs.
    ///
    /// The candles need not share a timestamp, which lets a source that lags its siblings
    /// by a tick still meet them at the barrier.
    pub fn add_candles<'a, I>(&mut self, candles: I) -> Result<Option<Snapshot>, PipelineError>
    where
        I: IntoIterator<Item = (&'a str, &'a Candle)>,
    {
        let candles: Vec<(&str, &Candle)> = candles.into_iter().collect();

        let missing: Vec<String> = self
            .aggregators
            .keys()
            .filter(|symbol| !candles.iter().any(|(s, _)| s == symbol))
            .cloned()
            .collect();
        if !missing.is_empty() {
            error!(
                "BucketSynchronizer: input at {:?} is missing {:?}",
                candles.first().map(|(_, c)| c.timestamp),
                missing
            );
            return Err(PipelineError::MissingSymbols { missing });
        }

        for (symbol, candle) in candles {
            let Some(aggregator) = self.aggregators.get_mut(symbol) else {
                continue;
            };
            if let Some(completed) = aggregator.add_candle(candle) {
                if self.pending.insert(symbol.to_string(), completed).is_some() {
                    debug!(
                        "BucketSynchronizer: {} completed again before its siblings, keeping latest",
                        symbol
                    );
                }
            }
        }

        if self.pending.len() < self.aggregators.len() {
            if !self.pending.is_empty() {
                debug!(
                    "BucketSynchronizer: {}/{} symbol(s) completed, waiting",
                    self.pending.len(),
                    self.aggregators.len()
                );
            }
            return Ok(None);
        }

        let completed = std::mem::take(&mut self.pending);
        Snapshot::from_candles(completed).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    // 2024-01-01 00:00:00 UTC
    const BASE: i64 = 1704067200000;

    fn minute_snapshot(minute: i64, symbols: &[&str]) -> Snapshot {
        Snapshot::from_candles(
            symbols
                .iter()
                .map(|s| (s.to_string(), Candle::flat(BASE + minute * 60_000, dec!(100)))),
        )
        .unwrap()
    }

    #[test]
    fn test_missing_symbol_is_fatal() {
        let mut sync = BucketSynchronizer::new(["A", "B", "C"], Timeframe::FiveMin);

        let err = sync.add_snapshot(&minute_snapshot(0, &["A"])).unwrap_err();
        assert_eq!(
            err,
            PipelineError::MissingSymbols {
                missing: vec!["B".to_string(), "C".to_string()]
            }
        );
    }

    #[test]
    fn test_untracked_symbols_ignored() {
        let mut sync = BucketSynchronizer::new(["A"], Timeframe::OneMin);

        let out = sync
            .add_snapshot(&minute_snapshot(0, &["A", "EXTRA"]))
            .unwrap()
            .unwrap();
        assert_eq!(out.len(), 1);
        assert!(out.contains("A"));
    }

    #[test]
    fn test_lockstep_completion() {
        let mut sync = BucketSynchronizer::new(["A", "B"], Timeframe::FiveMin);

        for minute in 0..4 {
            assert!(sync.add_snapshot(&minute_snapshot(minute, &["A", "B"])).unwrap().is_none());
        }
        let out = sync
            .add_snapshot(&minute_snapshot(4, &["A", "B"]))
            .unwrap()
            .expect("both symbols close at minute 4");

        assert_eq!(out.len(), 2);
        assert_eq!(out.timestamp(), Some(BASE));
        assert_eq!(sync.pending_len(), 0);
    }

    #[test]
    fn test_one_tick_lag_is_buffered() {
        let mut sync = BucketSynchronizer::new(["A", "B"], Timeframe::FiveMin);
        let at = |minute: i64| Candle::flat(BASE + minute * 60_000, dec!(100));

        // B's source stalls for a tick, then trails A by one minute
        let (a, b) = (at(0), at(0));
        assert!(sync.add_candles([("A", &a), ("B", &b)]).unwrap().is_none());
        for minute in 1..4 {
            let (a, b) = (at(minute), at(minute - 1));
            assert!(sync.add_candles([("A", &a), ("B", &b)]).unwrap().is_none());
        }

        // A closes its window, B does not yet
        let (a, b) = (at(4), at(3));
        assert!(sync.add_candles([("A", &a), ("B", &b)]).unwrap().is_none());
        assert_eq!(sync.pending_len(), 1);

        // B closes: both come out together
        let (a, b) = (at(5), at(4));
        let out = sync.add_candles([("A", &a), ("B", &b)]).unwrap().unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out.timestamp(), Some(BASE));
        assert_eq!(sync.pending_len(), 0);
    }

    #[test]
    fn test_windows_from_different_periods_never_merge() {
        let mut sync = BucketSynchronizer::new(["A", "B"], Timeframe::FiveMin);
        let at = |minute: i64| Candle::flat(BASE + minute * 60_000, dec!(100));

        // A runs a full window ahead of B
        for minute in 0..4 {
            let (a, b) = (at(minute + 5), at(minute));
            assert_eq!(sync.add_candles([("A", &a), ("B", &b)]).unwrap(), None);
        }

        let (a, b) = (at(9), at(4));
        match sync.add_candles([("A", &a), ("B", &b)]) {
            Err(PipelineError::MisalignedSnapshot {
                symbol,
                expected,
                actual,
            }) => {
                assert_eq!(symbol, "B");
                assert_eq!(expected, BASE + 300_000);
                assert_eq!(actual, BASE);
            }
            other => panic!("expected misaligned snapshot, got {:?}", other),
        }
    }
}
