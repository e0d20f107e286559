//! Authentication middleware
//!
//! Extracts the wallet behind a session token.

use std::sync::Arc;

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use chrono::{DateTime, Utc};

use crate::auth::{AuthService, JwtError, WalletAddress};
use crate::error::ApiError;

/// Wallet extracted from a valid `Authorization: Bearer <jwt>` header
#[derive(Debug, Clone)]
pub struct AuthenticatedWallet {
    pub address: WalletAddress,
    pub expires_at: DateTime<Utc>,
}

/// Extractor for authenticated wallets
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(wallet: AuthenticatedWallet) -> impl IntoResponse {
///     format!("Hello, {}", wallet.address)
/// }
/// ```
#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedWallet
where
    Arc<AuthService>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| ApiError::Unauthorized("Missing bearer token".to_string()))?;

        let auth_service = Arc::<AuthService>::from_ref(state);

        let claims = auth_service
            .verify_session_token(bearer.token())
            .map_err(|e| match e {
                JwtError::TokenExpired => ApiError::Unauthorized("Token expired".to_string()),
                other => {
                    tracing::debug!(error = %other, "Rejected session token");
                    ApiError::Unauthorized("Invalid token".to_string())
                }
            })?;

        // Tokens are only ever issued for checksum-form addresses
        let address = claims
            .address
            .parse::<WalletAddress>()
            .map_err(|_| ApiError::Unauthorized("Invalid token".to_string()))?;

        let expires_at = DateTime::from_timestamp(claims.exp, 0)
            .ok_or_else(|| ApiError::Unauthorized("Invalid token".to_string()))?;

        Ok(AuthenticatedWallet {
            address,
            expires_at,
        })
    }
}
