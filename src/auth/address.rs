//! Wallet address validation
//!
//! Parses `0x`-prefixed 20-byte addresses and enforces the EIP-55 mixed-case
//! checksum.

use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};
use thiserror::Error;

use super::crypto::keccak256;

/// Errors that can occur during address validation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvalidAddress {
    #[error("Expected 40 hex characters, got {0}")]
    Length(usize),

    #[error("Address contains non-hex characters")]
    NotHex,

    #[error("Address checksum mismatch")]
    ChecksumMismatch,
}

/// How strictly letter casing is checked on a claimed address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChecksumPolicy {
    /// Casing must match the EIP-55 checksum exactly
    #[default]
    Strict,
    /// All-lowercase and all-uppercase inputs are accepted without a checksum
    AllowUniformCase,
}

impl FromStr for ChecksumPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "strict" => Ok(ChecksumPolicy::Strict),
            "lenient" | "allow-uniform-case" => Ok(ChecksumPolicy::AllowUniformCase),
            _ => Err(format!(
                "Invalid checksum policy: '{}'. Expected: strict or lenient",
                s
            )),
        }
    }
}

/// A validated wallet address, always held in checksum form
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WalletAddress(String);

impl WalletAddress {
    /// Validate an address string under the given checksum policy
    pub fn validate(input: &str, policy: ChecksumPolicy) -> Result<Self, InvalidAddress> {
        let body = input.strip_prefix("0x").unwrap_or(input);

        if body.len() != 40 {
            return Err(InvalidAddress::Length(body.len()));
        }

        if !body.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(InvalidAddress::NotHex);
        }

        let checksummed = to_checksum(&body.to_ascii_lowercase());

        if checksummed[2..] == *body {
            return Ok(WalletAddress(checksummed));
        }

        let uniform_case = !body.bytes().any(|b| b.is_ascii_uppercase())
            || !body.bytes().any(|b| b.is_ascii_lowercase());

        match policy {
            ChecksumPolicy::AllowUniformCase if uniform_case => Ok(WalletAddress(checksummed)),
            _ => Err(InvalidAddress::ChecksumMismatch),
        }
    }

    /// Build an address from raw bytes, deriving the checksum
    pub fn from_bytes(bytes: [u8; 20]) -> Self {
        WalletAddress(to_checksum(&hex::encode(bytes)))
    }

    /// The checksummed `0x`-prefixed representation
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Compare two addresses ignoring letter casing
    pub fn eq_ignore_case(&self, other: &WalletAddress) -> bool {
        self.0.eq_ignore_ascii_case(&other.0)
    }
}

impl FromStr for WalletAddress {
    type Err = InvalidAddress;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        WalletAddress::validate(s, ChecksumPolicy::Strict)
    }
}

impl fmt::Display for WalletAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for WalletAddress {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Serialize for WalletAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

/// Apply EIP-55 casing to a lowercase 40-char hex string
///
/// A letter is uppercased when the matching nibble of
/// `keccak256(lowercase_hex)` is 8 or more.
fn to_checksum(lower_hex: &str) -> String {
    let hash = keccak256(lower_hex.as_bytes());

    let mut out = String::with_capacity(42);
    out.push_str("0x");

    for (i, ch) in lower_hex.chars().enumerate() {
        let byte = hash[i / 2];
        let nibble = if i % 2 == 0 { byte >> 4 } else { byte & 0x0f };

        if ch.is_ascii_alphabetic() && nibble >= 8 {
            out.push(ch.to_ascii_uppercase());
        } else {
            out.push(ch);
        }
    }

    out
}
