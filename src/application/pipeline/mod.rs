pub mod market_data_pipeline;
pub mod stage;

pub use market_data_pipeline::{MarketDataPipeline, PipelineReport, PipelineSettings};
pub use stage::{Stage, run_stage};
