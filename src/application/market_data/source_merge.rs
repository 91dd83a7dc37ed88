//! K-way merge of independently paced raw event sources.
//!
//! Each active source owns a one-event look-ahead slot. Every round, the empty slots of
//! all still-active sources are refilled concurrently, then every slot holding the
//! smallest timestamp is emitted. Ties at the same timestamp are emitted in source
//! registration order.

use crate::domain::errors::PipelineError;
use crate::domain::market::RawEvent;
use crate::domain::ports::EventSource;
use crate::infrastructure::observability::Metrics;
use futures::future::join_all;
use futures::stream::{self, BoxStream, StreamExt};
use std::collections::VecDeque;
use tracing::{debug, info, warn};

pub struct SourceMerge {
    sources: Vec<Option<EventSource>>,
    slots: Vec<Option<(i64, RawEvent)>>,
    ready: VecDeque<RawEvent>,
    last_emitted: Option<i64>,
    finished: bool,
    metrics: Option<Metrics>,
}

impl SourceMerge {
    pub fn new(sources: Vec<EventSource>) -> Self {
        let count = sources.len();
        info!("SourceMerge: merging {} source(s)", count);

        Self {
            sources: sources.into_iter().map(Some).collect(),
            slots: (0..count).map(|_| None).collect(),
            ready: VecDeque::new(),
            last_emitted: None,
            finished: false,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Number of sources that have not signalled completion yet
    pub fn active_sources(&self) -> usize {
        self.sources.iter().filter(|s| s.is_some()).count()
    }

    /// Turns the merge into a stream of chronologically ordered events.
    ///
    /// The stream ends once every source is exhausted, or right after yielding the first
    /// error. Dropping it drops every source still held.
    pub fn into_stream(self) -> BoxStream<'static, Result<RawEvent, PipelineError>> {
        stream::unfold(self, |mut merge| async move {
            loop {
                if let Some(event) = merge.ready.pop_front() {
                    return Some((Ok(event), merge));
                }
                if merge.finished {
                    return None;
                }
                match merge.next_round().await {
                    Ok(true) => continue,
                    Ok(false) => {
                        info!("SourceMerge: all sources exhausted");
                        merge.finished = true;
                        return None;
                    }
                    Err(e) => {
                        warn!("SourceMerge: stopping on error: {}", e);
                        merge.release();
                        return Some((Err(e), merge));
                    }
                }
            }
        })
        .boxed()
    }

    /// Runs one fetch-and-emit round. Returns `Ok(false)` when nothing is left.
    async fn next_round(&mut self) -> Result<bool, PipelineError> {
        self.refill().await?;

        let Some(min_ts) = self.slots.iter().flatten().map(|(ts, _)| *ts).min() else {
            return Ok(false);
        };

        for slot in self.slots.iter_mut() {
            if !matches!(slot, Some((ts, _)) if *ts == min_ts) {
                continue;
            }
            let Some((ts, event)) = slot.take() else {
                continue;
            };

            if let Some(last) = self.last_emitted
                && ts < last
            {
                warn!(
                    "SourceMerge: {} event at {} arrived after {}, dropping",
                    event.symbol, ts, last
                );
                if let Some(metrics) = &self.metrics {
                    metrics.out_of_order_events_total.inc();
                }
                continue;
            }

            self.last_emitted = Some(ts);
            if let Some(metrics) = &self.metrics {
                metrics.raw_events_merged_total.inc();
            }
            self.ready.push_back(event);
        }

        Ok(true)
    }

    /// Fetches the next event of every active source with an empty slot, concurrently.
    async fn refill(&mut self) -> Result<(), PipelineError> {
        let Self { sources, slots, .. } = self;

        let fetches = sources
            .iter_mut()
            .zip(slots.iter())
            .enumerate()
            .filter(|(_, (_, slot))| slot.is_none())
            .filter_map(|(index, (source, _))| {
                source
                    .as_mut()
                    .map(|source| async move { (index, source.next().await) })
            });
        let results = join_all(fetches).await;

        for (index, result) in results {
            match result {
                Some(Ok(event)) => {
                    let Some(ts) = event.timestamp() else {
                        return Err(PipelineError::MissingTimestamp {
                            symbol: event.symbol,
                        });
                    };
                    slots[index] = Some((ts, event));
                }
                Some(Err(e)) => return Err(e),
                None => {
                    debug!("SourceMerge: source #{} exhausted", index);
                    sources[index] = None;
                }
            }
        }

        Ok(())
    }

    /// Drops every source reader and buffered event.
    fn release(&mut self) {
        self.sources.iter_mut().for_each(|s| *s = None);
        self.slots.iter_mut().for_each(|s| *s = None);
        self.ready.clear();
        self.finished = true;
    }
}
