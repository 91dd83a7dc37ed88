use crate::domain::errors::PipelineError;
use crate::domain::market::{Candle, MINUTE_MS, Snapshot};
use rust_decimal::Decimal;
use tracing::warn;

/// Centralized validator for candle integrity.
///
/// Rejects data that is physically impossible. Unlike gaps or late candles these are not
/// recoverable: the caller surfaces them as a terminal stream error.
pub struct StrictCandleValidator;

impl StrictCandleValidator {
    /// Validates every candle of a snapshot, failing on the first bad one.
    pub fn validate_snapshot(snapshot: &Snapshot) -> Result<(), PipelineError> {
        for (symbol, candle) in snapshot.iter() {
            Self::validate_candle(symbol, candle)?;
        }
        Ok(())
    }

    /// Validates a Candle.
    pub fn validate_candle(symbol: &str, candle: &Candle) -> Result<(), PipelineError> {
        let reason = if candle.open <= Decimal::ZERO
            || candle.high <= Decimal::ZERO
            || candle.low <= Decimal::ZERO
            || candle.close <= Decimal::ZERO
        {
            Some("non-positive price component(s)".to_string())
        } else if candle.low > candle.high {
            Some(format!("low {} > high {}", candle.low, candle.high))
        } else if candle.volume < Decimal::ZERO {
            Some(format!("negative volume: {}", candle.volume))
        } else if candle.timestamp % MINUTE_MS != 0 {
            Some(format!("timestamp {} is not minute aligned", candle.timestamp))
        } else if candle.start_time().is_none() {
            Some(format!("timestamp {} is outside the UTC calendar", candle.timestamp))
        } else {
            None
        };

        match reason {
            Some(reason) => {
                warn!("Validation FAILED: Candle for {} has {}", symbol, reason);
                Err(PipelineError::MalformedCandle {
                    symbol: symbol.to_string(),
                    reason,
                })
            }
            None => Ok(()),
        }
    }
}
