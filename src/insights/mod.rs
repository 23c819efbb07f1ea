pub mod filter;
pub mod metrics;
pub mod preview;

pub use filter::{FilterOptions, FilterSelection};
pub use metrics::UsageMetrics;
