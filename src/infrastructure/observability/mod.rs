//! Push-based observability for candlesync
//!
//! Metrics are only ever pushed out, as periodic JSON lines on stdout. There is no HTTP
//! server and no incoming request path.

pub mod metrics;
pub mod reporter;

pub use metrics::Metrics;
pub use reporter::MetricsReporter;
