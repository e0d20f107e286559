//! Authentication module
//!
//! Provides wallet-based authentication using Ethereum-style addresses.
//! - Challenge-response authentication with nonces
//! - EIP-55 address validation and secp256k1 signature recovery
//! - JWT session token generation and validation

mod address;
mod crypto;
mod jwt;
mod nonce;
mod service;

pub use address::{ChecksumPolicy, InvalidAddress, WalletAddress};
pub use crypto::{
    address_from_verifying_key, challenge_message, hash_personal_message, keccak256,
    recover_address, verify_signature, SignatureParams, VerificationFailure,
};
pub use jwt::{Claims, JwtError, SessionCredential, SessionSigner, MAX_SESSION_TTL_DAYS};
pub use nonce::{InvalidNonce, Nonce, NONCE_UPPER_BOUND};
pub use service::{AuthError, AuthService};
