//! HTTP surface: routers, handlers, and the unified error taxonomy.

pub mod admin;
pub mod error;
pub mod faculty;
pub mod routes;
pub mod student;

pub use error::ApiError;
pub use routes::{build_router, AppState};
