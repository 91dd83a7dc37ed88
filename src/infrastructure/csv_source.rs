//! CSV replay source.
//!
//! Rows are `symbol,timestamp,open,high,low,close,volume` with a header line; `timestamp`
//! is the candle start in epoch milliseconds. A row with all five price/volume fields
//! empty replays as a tick without data.

use crate::domain::errors::PipelineError;
use crate::domain::market::{Candle, RawEvent};
use crate::domain::ports::EventSource;
use anyhow::{Context, Result};
use csv::ReaderBuilder;
use futures::stream::{self, StreamExt};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;
use tracing::info;

#[derive(Debug, Deserialize)]
struct CsvRow {
    symbol: String,
    timestamp: i64,
    open: Option<String>,
    high: Option<String>,
    low: Option<String>,
    close: Option<String>,
    volume: Option<String>,
}

impl CsvRow {
    fn into_event(self) -> Result<RawEvent, PipelineError> {
        let Self {
            symbol,
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        } = self;

        let fields = [open, high, low, close, volume];
        if fields.iter().all(Option::is_none) {
            return Ok(RawEvent::empty(symbol));
        }

        // Parsed from text, never through f64
        let mut values = [Decimal::ZERO; 5];
        for (value, field) in values.iter_mut().zip(fields) {
            let parsed = field.as_deref().map(Decimal::from_str);
            *value = match parsed {
                Some(Ok(v)) => v,
                Some(Err(e)) => {
                    return Err(PipelineError::MalformedCandle {
                        symbol,
                        reason: format!("unparsable value at {}: {}", timestamp, e),
                    });
                }
                None => {
                    return Err(PipelineError::MalformedCandle {
                        symbol,
                        reason: format!("incomplete CSV row at {}", timestamp),
                    });
                }
            };
        }

        let [open, high, low, close, volume] = values;
        Ok(RawEvent::new(
            symbol,
            Candle::new(timestamp, open, high, low, close, volume),
        ))
    }
}

/// Opens `path` and replays its rows lazily as an [`EventSource`].
pub fn csv_source(path: impl AsRef<Path>) -> Result<EventSource> {
    let path = path.as_ref();
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open CSV source {}", path.display()))?;
    info!("csv_source: replaying {}", path.display());
    Ok(csv_reader_source(file))
}

/// Replays CSV rows from any reader. Parse failures end the source with a `Source` error.
pub fn csv_reader_source<R: Read + Send + 'static>(reader: R) -> EventSource {
    let rows = ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader)
        .into_deserialize::<CsvRow>();

    stream::iter(rows.map(|row| {
        row.map_err(|e| PipelineError::source(format!("CSV parse error: {e}")))
            .and_then(CsvRow::into_event)
    }))
    .boxed()
}
