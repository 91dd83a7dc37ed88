use crate::domain::market::{Candle, Timeframe};
use tracing::debug;

/// Folds 1-minute candles of a single symbol into candles of one timeframe.
///
/// A single accumulator is mutated in place; it is moved out to the caller when the
/// window closes, leaving the aggregator empty for the next window.
#[derive(Debug)]
pub struct PairAggregator {
    timeframe: Timeframe,
    accumulator: Option<Candle>,
    candle_count: usize,
}

impl PairAggregator {
    pub fn new(timeframe: Timeframe) -> Self {
        Self {
            timeframe,
            accumulator: None,
            candle_count: 0,
        }
    }

    /// Adds a 1-minute candle. Returns the completed window candle if `candle` is the
    /// last minute of the window.
    ///
    /// - Open stays the first candle's open
    /// - High/low track the extremes
    /// - Close becomes the latest close
    /// - Volume is summed with decimal arithmetic
    pub fn add_candle(&mut self, candle: &Candle) -> Option<Candle> {
        match self.accumulator.as_mut() {
            Some(acc) => {
                if candle.high > acc.high {
                    acc.high = candle.high;
                }
                if candle.low < acc.low {
                    acc.low = candle.low;
                }
                acc.close = candle.close;
                acc.volume += candle.volume;
            }
            None => self.accumulator = Some(candle.clone()),
        }
        self.candle_count += 1;

        if !self.timeframe.closes_window(candle.timestamp) {
            return None;
        }

        debug!(
            "PairAggregator [{}]: window closed after {} candle(s) at {}",
            self.timeframe, self.candle_count, candle.timestamp
        );
        self.candle_count = 0;
        self.accumulator.take()
    }

    /// The in-progress window candle, if any
    pub fn pending(&self) -> Option<&Candle> {
        self.accumulator.as_ref()
    }

    /// Number of 1-minute candles folded into the current window
    pub fn candle_count(&self) -> usize {
        self.candle_count
    }

    /// Drops the in-progress window
    pub fn reset(&mut self) {
        self.accumulator = None;
        self.candle_count = 0;
    }
}
