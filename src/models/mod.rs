//! Data models for the wallet auth server

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::auth::{Nonce, WalletAddress};

pub mod auth;
pub use auth::*;

/// Authentication state of one wallet
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub address: WalletAddress,
    pub nonce: Nonce,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
