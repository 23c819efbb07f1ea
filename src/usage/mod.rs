pub mod cache;
pub mod fetcher;
pub mod types;

pub use cache::UsageCache;
pub use types::UsageRecord;
