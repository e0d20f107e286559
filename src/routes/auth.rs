//! Authentication routes

use axum::{routing::get, Router};

use crate::handlers::auth;
use crate::state::AppState;

/// Create authentication routes
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/me", get(auth::get_current_session))
        .route("/auth/:address/nonce", get(auth::get_nonce))
        .route(
            "/auth/:address/signature/:signature",
            get(auth::verify_signature),
        )
}
