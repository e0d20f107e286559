//! Authentication nonces

use std::fmt;

use rand::Rng;
use serde::Serialize;
use thiserror::Error;

/// Nonces are drawn uniformly from `[0, NONCE_UPPER_BOUND)`
pub const NONCE_UPPER_BOUND: u32 = 1_000_000;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Nonce out of range: {0}")]
pub struct InvalidNonce(pub i64);

/// Single-use challenge value bound to one wallet address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Nonce(u32);

impl Nonce {
    /// Generate a fresh random nonce
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        Nonce(rng.gen_range(0..NONCE_UPPER_BOUND))
    }

    /// Generate a nonce guaranteed to differ from `previous`.
    ///
    /// A rotation that produced the same value would leave the old signature
    /// valid.
    pub fn rotate_from(previous: Nonce) -> Self {
        loop {
            let next = Self::generate();
            if next != previous {
                return next;
            }
        }
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl TryFrom<i64> for Nonce {
    type Error = InvalidNonce;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        if (0..NONCE_UPPER_BOUND as i64).contains(&value) {
            Ok(Nonce(value as u32))
        } else {
            Err(InvalidNonce(value))
        }
    }
}

impl From<Nonce> for i64 {
    fn from(nonce: Nonce) -> Self {
        nonce.0 as i64
    }
}

impl fmt::Display for Nonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
