//! Wallet Auth Server Library
//!
//! Nonce challenge/response login for secp256k1 wallets, issuing JWT
//! session tokens.

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod state;
pub mod store;
