use crate::domain::errors::PipelineError;
use crate::domain::market::{RawEvent, Snapshot};
use anyhow::Result;
use async_trait::async_trait;
use futures::stream::BoxStream;

/// An independently paced source of raw per-symbol events.
///
/// Each source is expected to yield its own events in non-decreasing timestamp order;
/// ending the stream marks the source as exhausted.
pub type EventSource = BoxStream<'static, Result<RawEvent, PipelineError>>;

/// Wall-clock access, injected so the future-candle guard stays testable.
pub trait Clock: Send + Sync {
    /// Current time in epoch milliseconds
    fn now_millis(&self) -> i64;
}

/// Downstream consumer of completed snapshots (strategy engine, persistence, ...).
#[async_trait]
pub trait SnapshotSink: Send + Sync {
    async fn on_snapshot(&self, snapshot: &Snapshot) -> Result<()>;
}
