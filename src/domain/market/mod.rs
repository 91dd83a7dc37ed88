// Market data domain
pub mod candle;
pub mod snapshot;
pub mod timeframe;

pub use candle::{Candle, RawEvent};
pub use snapshot::Snapshot;
pub use timeframe::{MINUTE_MS, Timeframe};
