pub mod client;
pub mod session;

pub use client::{FetchError, QueryExecutor, ResultSet, SqlApiClient};
pub use session::{SessionError, WarehouseSession};
