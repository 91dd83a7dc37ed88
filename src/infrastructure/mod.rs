pub mod clock;
pub mod csv_source;
pub mod mock;
pub mod observability;
pub mod sinks;

pub use clock::{FixedClock, SystemClock};
pub use sinks::{ChannelSink, LoggingSink};
