use crate::domain::errors::PipelineError;
use crate::domain::market::candle::Candle;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Candles of several symbols sharing one window start.
///
/// Entries are kept sorted by symbol so iteration, and therefore the representative
/// candle, is deterministic. `insert` rejects a candle whose timestamp differs from the
/// ones already present.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    candles: BTreeMap<String, Candle>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a snapshot from `(symbol, candle)` pairs, enforcing alignment.
    pub fn from_candles<I, S>(candles: I) -> Result<Self, PipelineError>
    where
        I: IntoIterator<Item = (S, Candle)>,
        S: Into<String>,
    {
        let mut snapshot = Self::new();
        for (symbol, candle) in candles {
            snapshot.insert(symbol, candle)?;
        }
        Ok(snapshot)
    }

    /// Inserts or replaces the candle for `symbol`. Returns the replaced candle, if any.
    pub fn insert(
        &mut self,
        symbol: impl Into<String>,
        candle: Candle,
    ) -> Result<Option<Candle>, PipelineError> {
        let symbol = symbol.into();
        if let Some(expected) = self.timestamp()
            && expected != candle.timestamp
        {
            return Err(PipelineError::MisalignedSnapshot {
                symbol,
                expected,
                actual: candle.timestamp,
            });
        }
        Ok(self.candles.insert(symbol, candle))
    }

    /// First entry in symbol order.
    pub fn representative(&self) -> Option<(&str, &Candle)> {
        self.candles
            .iter()
            .next()
            .map(|(symbol, candle)| (symbol.as_str(), candle))
    }

    /// Shared window start of every candle, `None` for an empty snapshot.
    pub fn timestamp(&self) -> Option<i64> {
        self.representative().map(|(_, candle)| candle.timestamp)
    }

    pub fn get(&self, symbol: &str) -> Option<&Candle> {
        self.candles.get(symbol)
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.candles.contains_key(symbol)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Candle)> {
        self.candles.iter()
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }
}

impl IntoIterator for Snapshot {
    type Item = (String, Candle);
    type IntoIter = std::collections::btree_map::IntoIter<String, Candle>;

    fn into_iter(self) -> Self::IntoIter {
        self.candles.into_iter()
    }
}
