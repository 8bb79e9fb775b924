pub use crate::api::handlers::{ApiError, AppState};
pub use crate::api::server::{build_router, NexusServer};

pub mod handlers;
pub mod server;
