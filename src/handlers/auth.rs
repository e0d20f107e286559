//! Authentication HTTP handlers
//!
//! Endpoints for the wallet challenge/response flow.

use axum::{
    extract::{Path, State},
    Json,
};

use super::AuthenticatedWallet;
use crate::auth::{AuthError, SignatureParams};
use crate::error::ApiResult;
use crate::models::{AuthTokenResponse, SessionResponse, UserResponse};
use crate::state::AppState;

/// GET /auth/:address/nonce - Fetch (or create) the challenge for a wallet
pub async fn get_nonce(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> ApiResult<Json<UserResponse>> {
    let address = state.auth_service.parse_address(&address)?;

    let user = state.auth_service.issue_challenge(&address).await?;

    Ok(Json(user.into()))
}

/// GET /auth/:address/signature/:signature - Verify a signed challenge and
/// issue a session token
pub async fn verify_signature(
    State(state): State<AppState>,
    Path((address, signature)): Path<(String, String)>,
) -> ApiResult<Json<AuthTokenResponse>> {
    let address = state.auth_service.parse_address(&address)?;

    let signature = signature
        .parse::<SignatureParams>()
        .map_err(AuthError::from)?;

    let (credential, user) = state
        .auth_service
        .authenticate(&address, &signature)
        .await?;

    Ok(Json(AuthTokenResponse::new(&credential, user)))
}

/// GET /auth/me - Describe the session behind the bearer token
pub async fn get_current_session(wallet: AuthenticatedWallet) -> Json<SessionResponse> {
    Json(SessionResponse {
        address: wallet.address,
        expires_at: wallet.expires_at,
    })
}
