pub mod dto;
pub mod handlers;
pub mod router;
pub mod static_files;

pub use handlers::AppState;
pub use router::create_router;
