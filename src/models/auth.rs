//! Authentication request/response DTOs

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::UserRecord;
use crate::auth::{Nonce, SessionCredential, WalletAddress};

/// Public view of a user record
#[derive(Debug, Serialize, Clone)]
pub struct UserResponse {
    pub address: WalletAddress,
    pub nonce: Nonce,
}

impl From<UserRecord> for UserResponse {
    fn from(user: UserRecord) -> Self {
        Self {
            address: user.address,
            nonce: user.nonce,
        }
    }
}

/// Response for a successful signature check
#[derive(Debug, Serialize)]
pub struct AuthTokenResponse {
    /// `Bearer <jwt>`
    pub token: String,
    pub user: UserResponse,
}

impl AuthTokenResponse {
    pub fn new(credential: &SessionCredential, user: UserRecord) -> Self {
        Self {
            token: credential.bearer(),
            user: user.into(),
        }
    }
}

/// Current session, as seen by the bearer of a token
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub address: WalletAddress,
    pub expires_at: DateTime<Utc>,
}
