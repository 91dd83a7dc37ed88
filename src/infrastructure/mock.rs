use crate::domain::errors::PipelineError;
use crate::domain::market::{Candle, RawEvent};
use crate::domain::ports::EventSource;
use futures::stream::{self, StreamExt};
use tokio::sync::mpsc::{self, Sender};
use tracing::debug;

/// Source replaying a fixed list of events, then ending.
pub fn vec_source(events: Vec<RawEvent>) -> EventSource {
    stream::iter(events.into_iter().map(Ok)).boxed()
}

/// Source replaying `candles` for a single symbol.
pub fn candle_source(symbol: impl Into<String>, candles: Vec<Candle>) -> EventSource {
    let symbol = symbol.into();
    vec_source(
        candles
            .into_iter()
            .map(|candle| RawEvent::new(symbol.clone(), candle))
            .collect(),
    )
}

/// Source fed through a bounded channel, for producers that push events at their own pace.
///
/// The source ends once every sender is dropped.
pub fn channel_source(capacity: usize) -> (Sender<Result<RawEvent, PipelineError>>, EventSource) {
    let (tx, rx) = mpsc::channel(capacity);

    let source = stream::unfold(rx, |mut rx| async move {
        match rx.recv().await {
            Some(item) => Some((item, rx)),
            None => {
                debug!("channel_source: all senders dropped");
                None
            }
        }
    })
    .boxed();

    (tx, source)
}
