// Market data processing modules
pub mod bucket_synchronizer;
pub mod candle_aggregator;
pub mod future_candle_guard;
pub mod gap_filler;
pub mod snapshot_assembler;
pub mod source_merge;

pub use bucket_synchronizer::BucketSynchronizer;
pub use candle_aggregator::PairAggregator;
pub use future_candle_guard::FutureCandleGuard;
pub use gap_filler::GapFiller;
pub use snapshot_assembler::SnapshotAssembler;
pub use source_merge::SourceMerge;
