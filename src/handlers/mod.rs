//! API handlers for the wallet auth server

pub mod auth;
pub mod health;

pub use auth::*;
pub use health::*;

pub use crate::middleware::auth::AuthenticatedWallet;
