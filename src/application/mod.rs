// Market data processing: merge, aggregation, synchronization, repair
pub mod market_data;

// Stage plumbing and the assembled pipeline
pub mod pipeline;
