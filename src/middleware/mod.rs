pub mod auth;
pub mod security;

pub use auth::{auth_middleware, AuthUser, Viewer};
pub use security::security_headers_middleware;
