//! JWT session credentials
//!
//! Handles creation and verification of the bearer tokens handed out after a
//! successful signature check.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::address::WalletAddress;

/// Longest session lifetime a signer accepts
pub const MAX_SESSION_TTL_DAYS: i64 = 30;

/// JWT-related errors
#[derive(Error, Debug)]
pub enum JwtError {
    #[error("Signing secret is empty")]
    MissingSecret,

    #[error("Token encoding failed: {0}")]
    EncodingFailed(String),

    #[error("Token decoding failed: {0}")]
    DecodingFailed(String),

    #[error("Token expired")]
    TokenExpired,

    #[error("Session lifetime out of range: {0} seconds")]
    InvalidTtl(i64),
}

/// JWT claims carried by a session token
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Claims {
    /// Authenticated wallet address (checksum form)
    pub address: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration (Unix timestamp)
    pub exp: i64,
}

/// A signed, time-bounded session credential
#[derive(Debug, Clone)]
pub struct SessionCredential {
    pub token: String,
    pub address: WalletAddress,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl SessionCredential {
    /// Value for an `Authorization` header
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.token)
    }
}

/// Signs and checks session tokens with the server-held secret
#[derive(Clone)]
pub struct SessionSigner {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: Duration,
}

impl SessionSigner {
    /// # Arguments
    /// * `secret` - HMAC signing secret, must be non-empty
    /// * `ttl_seconds` - Lifetime of issued tokens
    pub fn new(secret: &str, ttl_seconds: i64) -> Result<Self, JwtError> {
        if secret.is_empty() {
            return Err(JwtError::MissingSecret);
        }

        let ttl = Duration::try_seconds(ttl_seconds)
            .filter(|ttl| *ttl > Duration::zero() && *ttl <= Duration::days(MAX_SESSION_TTL_DAYS))
            .ok_or(JwtError::InvalidTtl(ttl_seconds))?;

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
        })
    }

    /// Issue a credential for an authenticated address
    pub fn issue(&self, address: &WalletAddress) -> Result<SessionCredential, JwtError> {
        let issued_at = Utc::now();
        let expires_at = issued_at
            .checked_add_signed(self.ttl)
            .ok_or_else(|| JwtError::EncodingFailed("expiry out of range".to_string()))?;

        let claims = Claims {
            address: address.to_string(),
            iat: issued_at.timestamp(),
            exp: expires_at.timestamp(),
        };

        let token = encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| JwtError::EncodingFailed(e.to_string()))?;

        Ok(SessionCredential {
            token,
            address: address.clone(),
            issued_at,
            expires_at,
        })
    }

    /// Verify and decode a token
    ///
    /// # Returns
    /// * `Ok(Claims)` if the signature is valid and the token has not expired
    /// * `Err(JwtError)` otherwise
    pub fn verify(&self, token: &str) -> Result<Claims, JwtError> {
        let mut validation = Validation::default();
        validation.validate_exp = true;

        let token_data =
            decode::<Claims>(token, &self.decoding_key, &validation).map_err(|e| {
                match e.kind() {
                    ErrorKind::ExpiredSignature => JwtError::TokenExpired,
                    _ => JwtError::DecodingFailed(e.to_string()),
                }
            })?;

        Ok(token_data.claims)
    }
}
