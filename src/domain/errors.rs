use thiserror::Error;

/// Errors raised by the market data pipeline.
///
/// Every variant is terminal for the pipeline instance that produced it: the stream ends
/// after yielding the error and the supervisor has to rebuild the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineError {
    /// Upstream handed the synchronizer a snapshot without every tracked symbol.
    #[error("Snapshot is missing tracked symbol(s): {}", missing.join(", "))]
    MissingSymbols { missing: Vec<String> },

    #[error("Candle for {symbol} starts at {actual}, snapshot is aligned on {expected}")]
    MisalignedSnapshot {
        symbol: String,
        expected: i64,
        actual: i64,
    },

    #[error("Event for {symbol} carries no candle, cannot order it")]
    MissingTimestamp { symbol: String },

    #[error("Malformed candle for {symbol}: {reason}")]
    MalformedCandle { symbol: String, reason: String },

    #[error("Source failed: {reason}")]
    Source { reason: String },

    #[error("Unsupported timeframe: '{0}'")]
    UnsupportedTimeframe(String),

    #[error("Invalid pipeline configuration: {0}")]
    InvalidConfig(String),
}

impl PipelineError {
    pub fn source(reason: impl Into<String>) -> Self {
        PipelineError::Source {
            reason: reason.into(),
        }
    }

    /// Contract violations point at a producer bug rather than bad market data.
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            PipelineError::MissingSymbols { .. }
                | PipelineError::MisalignedSnapshot { .. }
                | PipelineError::MissingTimestamp { .. }
        )
    }
}
