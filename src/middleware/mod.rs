//! Middleware for the wallet auth API
//!
//! Request tracing, security headers, and bearer-token extraction.

pub mod auth;
mod security;
mod tracing;

pub use auth::AuthenticatedWallet;
pub use security::{hsts_header, security_headers};
pub use tracing::request_tracing;
