//! Ethereum personal-message signature verification
//!
//! Rebuilds the challenge message for a nonce, hashes it with the
//! `personal_sign` prefix and recovers the signer's address from a
//! secp256k1 ECDSA signature.

use std::fmt;
use std::str::FromStr;

use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};
use thiserror::Error;
use tiny_keccak::{Hasher, Keccak};

use super::address::WalletAddress;
use super::nonce::Nonce;

/// Preamble prepended to every personal message before hashing
const PERSONAL_MESSAGE_PREFIX: &str = "\x19Ethereum Signed Message:\n";

/// Errors that can occur during signature verification
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VerificationFailure {
    #[error("Malformed signature: {0}")]
    MalformedSignature(String),

    #[error("Recovered address does not match the claimed address")]
    AddressMismatch,
}

/// Decoded `(r, s, v)` signature components
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureParams {
    r: [u8; 32],
    s: [u8; 32],
    v: u8,
}

impl SignatureParams {
    pub fn new(r: [u8; 32], s: [u8; 32], v: u8) -> Self {
        Self { r, s, v }
    }

    /// Decode a 65-byte `r || s || v` signature
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, VerificationFailure> {
        if bytes.len() != 65 {
            return Err(VerificationFailure::MalformedSignature(format!(
                "expected 65 bytes, got {}",
                bytes.len()
            )));
        }

        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&bytes[..32]);
        s.copy_from_slice(&bytes[32..64]);

        Ok(Self::new(r, s, bytes[64]))
    }

    pub fn to_bytes(&self) -> [u8; 65] {
        let mut bytes = [0u8; 65];
        bytes[..32].copy_from_slice(&self.r);
        bytes[32..64].copy_from_slice(&self.s);
        bytes[64] = self.v;
        bytes
    }

    /// Normalize `v` to a recovery id.
    ///
    /// Wallets emit either the raw parity bit (0/1) or the legacy 27/28 form.
    fn recovery_id(&self) -> Result<RecoveryId, VerificationFailure> {
        let parity = match self.v {
            0 | 27 => 0,
            1 | 28 => 1,
            v => {
                return Err(VerificationFailure::MalformedSignature(format!(
                    "invalid recovery id: {}",
                    v
                )))
            }
        };

        RecoveryId::from_byte(parity).ok_or_else(|| {
            VerificationFailure::MalformedSignature(format!("invalid recovery id: {}", self.v))
        })
    }
}

impl FromStr for SignatureParams {
    type Err = VerificationFailure;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let body = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(body)
            .map_err(|e| VerificationFailure::MalformedSignature(e.to_string()))?;

        Self::from_bytes(&bytes)
    }
}

impl fmt::Display for SignatureParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.to_bytes()))
    }
}

/// Keccak-256 digest
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak::v256();
    let mut output = [0u8; 32];
    hasher.update(data);
    hasher.finalize(&mut output);
    output
}

/// The exact text a wallet is asked to sign for a nonce
pub fn challenge_message(nonce: Nonce) -> String {
    format!("Nonce: {}", nonce)
}

/// Hash a message using the `personal_sign` convention
///
/// `keccak256("\x19Ethereum Signed Message:\n" + len(message) + message)`,
/// where `len` is the decimal byte length.
pub fn hash_personal_message(message: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak::v256();
    let mut output = [0u8; 32];
    hasher.update(PERSONAL_MESSAGE_PREFIX.as_bytes());
    hasher.update(message.len().to_string().as_bytes());
    hasher.update(message);
    hasher.finalize(&mut output);
    output
}

/// Derive the address owning a public key
///
/// The address is the last 20 bytes of the keccak-256 hash of the
/// uncompressed key without its SEC1 tag byte.
pub fn address_from_verifying_key(key: &VerifyingKey) -> WalletAddress {
    let point = key.to_encoded_point(false);
    let hash = keccak256(&point.as_bytes()[1..]);

    let mut bytes = [0u8; 20];
    bytes.copy_from_slice(&hash[12..]);

    WalletAddress::from_bytes(bytes)
}

/// Recover the signer address from a 32-byte message hash
pub fn recover_address(
    message_hash: &[u8; 32],
    signature: &SignatureParams,
) -> Result<WalletAddress, VerificationFailure> {
    let recovery_id = signature.recovery_id()?;

    let mut rs = [0u8; 64];
    rs[..32].copy_from_slice(&signature.r);
    rs[32..].copy_from_slice(&signature.s);

    // Rejects zero or out-of-range r/s
    let ecdsa_signature = Signature::from_slice(&rs)
        .map_err(|e| VerificationFailure::MalformedSignature(e.to_string()))?;

    let verifying_key =
        VerifyingKey::recover_from_prehash(message_hash, &ecdsa_signature, recovery_id)
            .map_err(|e| VerificationFailure::MalformedSignature(e.to_string()))?;

    Ok(address_from_verifying_key(&verifying_key))
}

/// Verify that `signature` signs the challenge for `nonce` and was produced by
/// the key behind `claimed`
///
/// # Returns
/// * `Ok(address)` with the recovered address when it matches the claim
/// * `Err(VerificationFailure::AddressMismatch)` for a valid signature by
///   another key
/// * `Err(VerificationFailure::MalformedSignature)` if recovery fails
pub fn verify_signature(
    claimed: &WalletAddress,
    nonce: Nonce,
    signature: &SignatureParams,
) -> Result<WalletAddress, VerificationFailure> {
    let message = challenge_message(nonce);
    let message_hash = hash_personal_message(message.as_bytes());

    let recovered = recover_address(&message_hash, signature)?;

    if recovered.eq_ignore_case(claimed) {
        Ok(recovered)
    } else {
        Err(VerificationFailure::AddressMismatch)
    }
}
