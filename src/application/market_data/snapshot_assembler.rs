use crate::domain::errors::PipelineError;
use crate::domain::market::{RawEvent, Snapshot};
use tracing::debug;

/// Groups a time-ordered stream of raw events into one snapshot per timestamp.
///
/// A snapshot is released when an event with a later timestamp arrives, or when the
/// input ends and [`SnapshotAssembler::flush`] is called.
#[derive(Debug, Default)]
pub struct SnapshotAssembler {
    current: Snapshot,
}

impl SnapshotAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an event; returns the previous timestamp's snapshot once it is complete.
    pub fn push(&mut self, event: RawEvent) -> Result<Option<Snapshot>, PipelineError> {
        let RawEvent { symbol, candle } = event;
        let Some(candle) = candle else {
            debug!("SnapshotAssembler: {} has no data for this tick", symbol);
            return Ok(None);
        };

        let completed = match self.current.timestamp() {
            Some(ts) if ts != candle.timestamp => Some(std::mem::take(&mut self.current)),
            _ => None,
        };

        if self.current.insert(symbol.as_str(), candle)?.is_some() {
            debug!(
                "SnapshotAssembler: duplicate candle for {} at {:?}, keeping the latest",
                symbol,
                self.current.timestamp()
            );
        }

        Ok(completed)
    }

    /// Releases whatever is buffered at end of input.
    pub fn flush(&mut self) -> Option<Snapshot> {
        if self.current.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.current))
        }
    }
}
