use crate::application::market_data::bucket_synchronizer::BucketSynchronizer;
use crate::application::market_data::future_candle_guard::FutureCandleGuard;
use crate::application::market_data::gap_filler::GapFiller;
use crate::application::market_data::snapshot_assembler::SnapshotAssembler;
use crate::domain::errors::PipelineError;
use crate::domain::market::{RawEvent, Snapshot};
use futures::stream::{self, BoxStream, StreamExt};
use std::collections::VecDeque;
use tracing::{debug, warn};

/// A synchronous step of the pipeline.
///
/// `push` may emit zero or more outputs per input; `finish` is called once when the
/// upstream ends. A stage that produces a long run of outputs from one input hands them
/// out through `pull` instead, which is drained before upstream is polled again. Any
/// error is terminal for the stream running the stage.
pub trait Stage: Send + 'static {
    type Input: Send + 'static;
    type Output: Send + 'static;

    fn name(&self) -> &'static str;

    fn push(
        &mut self,
        input: Self::Input,
        out: &mut Vec<Self::Output>,
    ) -> Result<(), PipelineError>;

    fn finish(&mut self, _out: &mut Vec<Self::Output>) -> Result<(), PipelineError> {
        Ok(())
    }

    fn pull(&mut self) -> Result<Option<Self::Output>, PipelineError> {
        Ok(None)
    }
}

struct StageState<St: Stage> {
    upstream: Option<BoxStream<'static, Result<St::Input, PipelineError>>>,
    stage: St,
    buffer: VecDeque<St::Output>,
    failed: bool,
}

impl<St: Stage> StageState<St> {
    fn fail(mut self, e: PipelineError) -> (Result<St::Output, PipelineError>, Self) {
        warn!("{}: terminating on error: {}", self.stage.name(), e);
        self.upstream = None;
        self.buffer.clear();
        self.failed = true;
        (Err(e), self)
    }
}

/// Runs `stage` over `upstream` as a pull-driven stream.
///
/// Upstream is polled only when the stage's output buffer is empty and `pull` has
/// nothing left, so a slow consumer pauses every stage above it. The stream ends after
/// the first error, and dropping it drops the upstream.
pub fn run_stage<St: Stage>(
    upstream: BoxStream<'static, Result<St::Input, PipelineError>>,
    stage: St,
) -> BoxStream<'static, Result<St::Output, PipelineError>> {
    let state = StageState {
        upstream: Some(upstream),
        stage,
        buffer: VecDeque::new(),
        failed: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(item) = state.buffer.pop_front() {
                return Some((Ok(item), state));
            }
            if state.failed {
                return None;
            }
            match state.stage.pull() {
                Ok(Some(item)) => return Some((Ok(item), state)),
                Ok(None) => {}
                Err(e) => return Some(state.fail(e)),
            }
            let upstream = state.upstream.as_mut()?;

            let mut out = Vec::new();
            let step = match upstream.next().await {
                Some(Ok(input)) => state.stage.push(input, &mut out),
                Some(Err(e)) => Err(e),
                None => {
                    debug!("{}: upstream ended", state.stage.name());
                    state.upstream = None;
                    state.stage.finish(&mut out)
                }
            };

            match step {
                Ok(()) => state.buffer.extend(out),
                Err(e) => return Some(state.fail(e)),
            }
        }
    })
    .boxed()
}

impl Stage for SnapshotAssembler {
    type Input = RawEvent;
    type Output = Snapshot;

    fn name(&self) -> &'static str {
        "SnapshotAssembler"
    }

    fn push(&mut self, input: RawEvent, out: &mut Vec<Snapshot>) -> Result<(), PipelineError> {
        out.extend(SnapshotAssembler::push(self, input)?);
        Ok(())
    }

    fn finish(&mut self, out: &mut Vec<Snapshot>) -> Result<(), PipelineError> {
        out.extend(self.flush());
        Ok(())
    }
}

impl Stage for GapFiller {
    type Input = Snapshot;
    type Output = Snapshot;

    fn name(&self) -> &'static str {
        "GapFiller"
    }

    fn push(&mut self, input: Snapshot, _out: &mut Vec<Snapshot>) -> Result<(), PipelineError> {
        self.accept(input)
    }

    fn pull(&mut self) -> Result<Option<Snapshot>, PipelineError> {
        self.next_ready()
    }
}

impl Stage for BucketSynchronizer {
    type Input = Snapshot;
    type Output = Snapshot;

    fn name(&self) -> &'static str {
        "BucketSynchronizer"
    }

    fn push(&mut self, input: Snapshot, out: &mut Vec<Snapshot>) -> Result<(), PipelineError> {
        out.extend(self.add_snapshot(&input)?);
        Ok(())
    }
}

impl Stage for FutureCandleGuard {
    type Input = Snapshot;
    type Output = Snapshot;

    fn name(&self) -> &'static str {
        "FutureCandleGuard"
    }

    fn push(&mut self, input: Snapshot, out: &mut Vec<Snapshot>) -> Result<(), PipelineError> {
        out.extend(self.check(input));
        Ok(())
    }
}
