//! Shared helpers for HTTP-level tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, Response, StatusCode};
use axum::Router;
use k256::ecdsa::SigningKey;
use tower::ServiceExt;

use wallet_auth_server::auth::{
    address_from_verifying_key, challenge_message, hash_personal_message, AuthService,
    ChecksumPolicy, Nonce, SessionSigner, WalletAddress,
};
use wallet_auth_server::models::UserRecord;
use wallet_auth_server::routes::build_router;
use wallet_auth_server::state::AppState;
use wallet_auth_server::store::{InMemoryUserStore, StoreError, UserStore};

pub const JWT_SECRET: &str = "integration-test-secret";
pub const SESSION_TTL_SECONDS: i64 = 6 * 60 * 60;

/// A deterministic test wallet
pub struct TestWallet {
    pub key: SigningKey,
    pub address: WalletAddress,
}

impl TestWallet {
    pub fn from_seed(seed: u8) -> Self {
        let key = SigningKey::from_slice(&[seed; 32]).unwrap();
        let address = address_from_verifying_key(key.verifying_key());
        Self { key, address }
    }

    /// personal_sign over `Nonce: <nonce>`, encoded as 0x-hex with v in 27/28
    pub fn sign_nonce(&self, nonce: u32) -> String {
        let nonce = Nonce::try_from(i64::from(nonce)).unwrap();
        let hash = hash_personal_message(challenge_message(nonce).as_bytes());
        let (signature, recovery_id) = self.key.sign_prehash_recoverable(&hash).unwrap();

        let mut bytes = signature.to_bytes().to_vec();
        bytes.push(27 + recovery_id.to_byte());
        format!("0x{}", hex::encode(bytes))
    }
}

pub fn app_with_store(store: Arc<dyn UserStore>) -> Router {
    let signer = SessionSigner::new(JWT_SECRET, SESSION_TTL_SECONDS).unwrap();
    let auth_service = Arc::new(AuthService::new(store, signer, ChecksumPolicy::Strict));
    build_router(AppState::new(auth_service))
}

pub fn app() -> (Router, Arc<InMemoryUserStore>) {
    let store = Arc::new(InMemoryUserStore::new());
    (app_with_store(store.clone()), store)
}

pub async fn get(app: &Router, uri: &str) -> Response<Body> {
    app.clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

pub async fn get_with_bearer(app: &Router, uri: &str, token: &str) -> Response<Body> {
    app.clone()
        .oneshot(
            Request::builder()
                .uri(uri)
                .header("authorization", format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap()
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let text = body_text(response).await;
    serde_json::from_str(&text).unwrap()
}

/// Request a challenge and return its nonce
pub async fn fetch_nonce(app: &Router, address: &WalletAddress) -> u32 {
    let response = get(app, &format!("/auth/{}/nonce", address)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    json["nonce"].as_u64().unwrap() as u32
}

/// Store that counts calls and can be switched into a failing mode
#[derive(Default)]
pub struct ProbeStore {
    inner: InMemoryUserStore,
    pub calls: AtomicUsize,
    pub failing: bool,
}

impl ProbeStore {
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn record(&self) -> Result<(), StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing {
            return Err(StoreError::Unavailable("connection refused".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl UserStore for ProbeStore {
    async fn get_user(&self, address: &WalletAddress) -> Result<Option<UserRecord>, StoreError> {
        self.record()?;
        self.inner.get_user(address).await
    }

    async fn create_user(
        &self,
        address: &WalletAddress,
        nonce: Nonce,
    ) -> Result<UserRecord, StoreError> {
        self.record()?;
        self.inner.create_user(address, nonce).await
    }

    async fn update_nonce(
        &self,
        address: &WalletAddress,
        expected: Nonce,
        next: Nonce,
    ) -> Result<bool, StoreError> {
        self.record()?;
        self.inner.update_nonce(address, expected, next).await
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        self.record()
    }

    fn backend_name(&self) -> &'static str {
        "probe"
    }
}
