//! Authentication: JWT issuance/validation, bearer middleware, RBAC helpers.

pub mod api;
pub mod jwt;
pub mod middleware;
pub mod models;

pub use jwt::JwtHandler;
pub use middleware::auth_middleware;
pub use models::{Claims, Role};
