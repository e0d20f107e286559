//! Authentication service
//!
//! Core business logic for wallet-based authentication.

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;

use crate::models::UserRecord;
use crate::store::{StoreError, UserStore};

use super::address::{ChecksumPolicy, InvalidAddress, WalletAddress};
use super::crypto::{verify_signature, SignatureParams, VerificationFailure};
use super::jwt::{Claims, JwtError, SessionCredential, SessionSigner};
use super::nonce::Nonce;

/// Auth service errors
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Invalid wallet address: {0}")]
    InvalidAddress(#[from] InvalidAddress),

    #[error("Malformed signature: {0}")]
    MalformedSignature(String),

    #[error("Recovered address does not match")]
    AddressMismatch,

    #[error("No outstanding challenge for address")]
    NoOutstandingChallenge,

    #[error("Challenge already consumed")]
    ChallengeConsumed,

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Token error: {0}")]
    TokenError(String),
}

impl From<VerificationFailure> for AuthError {
    fn from(e: VerificationFailure) -> Self {
        match e {
            VerificationFailure::MalformedSignature(reason) => AuthError::MalformedSignature(reason),
            VerificationFailure::AddressMismatch => AuthError::AddressMismatch,
        }
    }
}

impl From<StoreError> for AuthError {
    fn from(e: StoreError) -> Self {
        AuthError::StoreUnavailable(e.to_string())
    }
}

impl From<JwtError> for AuthError {
    fn from(e: JwtError) -> Self {
        AuthError::TokenError(e.to_string())
    }
}

/// Authentication service
#[derive(Clone)]
pub struct AuthService {
    store: Arc<dyn UserStore>,
    signer: SessionSigner,
    checksum_policy: ChecksumPolicy,
}

impl AuthService {
    /// Create a new AuthService
    pub fn new(
        store: Arc<dyn UserStore>,
        signer: SessionSigner,
        checksum_policy: ChecksumPolicy,
    ) -> Self {
        Self {
            store,
            signer,
            checksum_policy,
        }
    }

    /// Validate a claimed address under the configured checksum policy
    pub fn parse_address(&self, raw: &str) -> Result<WalletAddress, AuthError> {
        Ok(WalletAddress::validate(raw, self.checksum_policy)?)
    }

    /// Return the outstanding challenge for an address, creating the record
    /// on first contact.
    ///
    /// An existing nonce is returned unchanged; nonces rotate only after a
    /// successful verification.
    #[tracing::instrument(skip_all, fields(address = %address))]
    pub async fn issue_challenge(&self, address: &WalletAddress) -> Result<UserRecord, AuthError> {
        if let Some(user) = self.store.get_user(address).await? {
            tracing::debug!("Returning outstanding challenge");
            return Ok(user);
        }

        match self.store.create_user(address, Nonce::generate()).await {
            Ok(user) => {
                tracing::info!("Created record for new wallet");
                Ok(user)
            }
            Err(StoreError::AlreadyExists(_)) => {
                // A concurrent request created the record first
                self.store.get_user(address).await?.ok_or_else(|| {
                    AuthError::StoreUnavailable("record missing after insert conflict".to_string())
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Verify a signed challenge and, on success, rotate the nonce and issue a
    /// session credential
    #[tracing::instrument(skip_all, fields(address = %address))]
    pub async fn authenticate(
        &self,
        address: &WalletAddress,
        signature: &SignatureParams,
    ) -> Result<(SessionCredential, UserRecord), AuthError> {
        let user = self
            .store
            .get_user(address)
            .await?
            .ok_or(AuthError::NoOutstandingChallenge)?;

        // Rejections are logged once, where they become HTTP errors
        verify_signature(address, user.nonce, signature)?;

        self.issue_session(&user).await
    }

    /// Consume `user.nonce` and sign a session credential.
    ///
    /// Must only be called after the signature over `user.nonce` verified.
    #[tracing::instrument(skip_all, fields(address = %user.address))]
    pub async fn issue_session(
        &self,
        user: &UserRecord,
    ) -> Result<(SessionCredential, UserRecord), AuthError> {
        let next = Nonce::rotate_from(user.nonce);

        let swapped = self
            .store
            .update_nonce(&user.address, user.nonce, next)
            .await?;

        if !swapped {
            tracing::debug!("Nonce changed before it could be consumed");
            return Err(AuthError::ChallengeConsumed);
        }

        let credential = self.signer.issue(&user.address)?;

        tracing::info!(expires_at = %credential.expires_at, "Session issued");

        let rotated = UserRecord {
            nonce: next,
            updated_at: Utc::now(),
            ..user.clone()
        };

        Ok((credential, rotated))
    }

    /// Decode and validate a session token
    pub fn verify_session_token(&self, token: &str) -> Result<Claims, JwtError> {
        self.signer.verify(token)
    }

    /// Get the store (for health checks)
    pub fn store(&self) -> &Arc<dyn UserStore> {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{challenge_message, hash_personal_message};
    use crate::store::InMemoryUserStore;
    use k256::ecdsa::SigningKey;

    fn service(store: Arc<InMemoryUserStore>) -> AuthService {
        let signer = SessionSigner::new("test-secret", 6 * 60 * 60).unwrap();
        AuthService::new(store, signer, ChecksumPolicy::Strict)
    }

    fn wallet(seed: u8) -> (SigningKey, WalletAddress) {
        let key = SigningKey::from_slice(&[seed; 32]).unwrap();
        let address = crate::auth::address_from_verifying_key(key.verifying_key());
        (key, address)
    }

    fn sign_challenge(key: &SigningKey, nonce: Nonce) -> SignatureParams {
        let hash = hash_personal_message(challenge_message(nonce).as_bytes());
        let (signature, recovery_id) = key.sign_prehash_recoverable(&hash).unwrap();
        let mut bytes = [0u8; 65];
        bytes[..64].copy_from_slice(&signature.to_bytes());
        bytes[64] = 27 + recovery_id.to_byte();
        SignatureParams::from_bytes(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_issue_challenge_is_stable_until_verified() {
        let store = Arc::new(InMemoryUserStore::new());
        let auth = service(store.clone());
        let (_, address) = wallet(1);

        let first = auth.issue_challenge(&address).await.unwrap();
        let second = auth.issue_challenge(&address).await.unwrap();

        assert_eq!(first.nonce, second.nonce);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_authenticate_rotates_nonce() {
        let store = Arc::new(InMemoryUserStore::new());
        let auth = service(store.clone());
        let (key, address) = wallet(2);

        let challenge = auth.issue_challenge(&address).await.unwrap();
        let signature = sign_challenge(&key, challenge.nonce);

        let (credential, user) = auth.authenticate(&address, &signature).await.unwrap();

        assert_eq!(credential.address, address);
        assert_ne!(user.nonce, challenge.nonce);

        let stored = store.get_user(&address).await.unwrap().unwrap();
        assert_eq!(stored.nonce, user.nonce);

        let claims = auth.verify_session_token(&credential.token).unwrap();
        assert_eq!(claims.address, address.to_string());
    }

    #[tokio::test]
    async fn test_failed_verification_keeps_nonce() {
        let store = Arc::new(InMemoryUserStore::new());
        let auth = service(store.clone());
        let (key, address) = wallet(3);
        let (intruder, _) = wallet(4);

        let challenge = auth.issue_challenge(&address).await.unwrap();

        let forged = sign_challenge(&intruder, challenge.nonce);
        assert!(matches!(
            auth.authenticate(&address, &forged).await,
            Err(AuthError::AddressMismatch)
        ));

        let stored = store.get_user(&address).await.unwrap().unwrap();
        assert_eq!(stored.nonce, challenge.nonce);

        let genuine = sign_challenge(&key, challenge.nonce);
        assert!(auth.authenticate(&address, &genuine).await.is_ok());
    }

    #[derive(Clone, Default)]
    struct WarnCounter(Arc<std::sync::atomic::AtomicUsize>);

    impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for WarnCounter {
        fn on_event(
            &self,
            event: &tracing::Event<'_>,
            _ctx: tracing_subscriber::layer::Context<'_, S>,
        ) {
            if *event.metadata().level() == tracing::Level::WARN {
                self.0.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            }
        }
    }

    #[tokio::test]
    async fn test_rejected_login_warns_once() {
        use tracing_subscriber::layer::SubscriberExt;

        let counter = WarnCounter::default();
        let subscriber = tracing_subscriber::registry().with(counter.clone());
        let _guard = tracing::subscriber::set_default(subscriber);

        let store = Arc::new(InMemoryUserStore::new());
        let auth = service(store);
        let (_, address) = wallet(9);
        let (intruder, _) = wallet(10);

        let challenge = auth.issue_challenge(&address).await.unwrap();
        let forged = sign_challenge(&intruder, challenge.nonce);

        let err = auth.authenticate(&address, &forged).await.unwrap_err();
        let _ = crate::error::ApiError::from(err);

        assert_eq!(counter.0.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_replay_is_rejected() {
        let store = Arc::new(InMemoryUserStore::new());
        let auth = service(store);
        let (key, address) = wallet(5);

        let challenge = auth.issue_challenge(&address).await.unwrap();
        let signature = sign_challenge(&key, challenge.nonce);

        assert!(auth.authenticate(&address, &signature).await.is_ok());
        assert!(matches!(
            auth.authenticate(&address, &signature).await,
            Err(AuthError::AddressMismatch)
        ));
    }

    #[tokio::test]
    async fn test_unknown_address_has_no_challenge() {
        let auth = service(Arc::new(InMemoryUserStore::new()));
        let (key, address) = wallet(6);
        let signature = sign_challenge(&key, Nonce::try_from(1).unwrap());

        assert!(matches!(
            auth.authenticate(&address, &signature).await,
            Err(AuthError::NoOutstandingChallenge)
        ));
    }

    #[tokio::test]
    async fn test_stale_record_cannot_issue_session() {
        let store = Arc::new(InMemoryUserStore::new());
        let auth = service(store.clone());
        let (_, address) = wallet(7);

        let stale = auth.issue_challenge(&address).await.unwrap();
        auth.issue_session(&stale).await.unwrap();

        assert!(matches!(
            auth.issue_session(&stale).await,
            Err(AuthError::ChallengeConsumed)
        ));
    }

    #[tokio::test]
    async fn test_concurrent_use_of_one_signature() {
        let store = Arc::new(InMemoryUserStore::new());
        let auth = service(store);
        let (key, address) = wallet(8);

        let challenge = auth.issue_challenge(&address).await.unwrap();
        let signature = sign_challenge(&key, challenge.nonce);

        let (a, b) = tokio::join!(
            auth.authenticate(&address, &signature),
            auth.authenticate(&address, &signature)
        );

        assert_eq!(a.is_ok() as u8 + b.is_ok() as u8, 1);
    }

    #[test]
    fn test_parse_address_uses_policy() {
        let lower = "0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed";
        let store = Arc::new(InMemoryUserStore::new());
        let signer = SessionSigner::new("s", 60).unwrap();

        let strict = AuthService::new(store.clone(), signer.clone(), ChecksumPolicy::Strict);
        assert!(matches!(
            strict.parse_address(lower),
            Err(AuthError::InvalidAddress(InvalidAddress::ChecksumMismatch))
        ));

        let lenient = AuthService::new(store, signer, ChecksumPolicy::AllowUniformCase);
        assert_eq!(
            lenient.parse_address(lower).unwrap().as_str(),
            "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed"
        );
    }
}
