//! Per-request CSP nonce.
//!
//! A nonce is drawn from OS entropy once per request, handed by reference to
//! the rewriter and the header builder, and dropped with the response. It is
//! never cached, stored or logged.

use std::fmt;

use base64::{engine::general_purpose::STANDARD, Engine};
use rand::{rngs::OsRng, RngCore};
use thiserror::Error;

/// Bytes of entropy per nonce.
pub const NONCE_ENTROPY_BYTES: usize = 12;

/// Entropy bytes rendered into the first segment.
const HEAD_BYTES: usize = 5;

/// Length the first segment is cut to.
const HEAD_LEN: usize = 14;

const SEPARATOR: char = '/';

/// The entropy source could not produce bytes. There is no fallback nonce.
#[derive(Debug, Error)]
#[error("entropy source unavailable: {0}")]
pub struct EntropyUnavailable(#[from] rand::Error);

/// A CSP nonce value.
///
/// Two base64 segments over the hex rendering of 12 random bytes, joined by
/// `/`. The alphabet is `[A-Za-z0-9+/=]`, safe inside attributes, header
/// values and `'nonce-…'` sources.
#[derive(Clone, PartialEq, Eq)]
pub struct Nonce(String);

impl Nonce {
    /// Generate a nonce from the operating system RNG.
    pub fn generate() -> Result<Self, EntropyUnavailable> {
        Self::generate_from(&mut OsRng)
    }

    /// Generate a nonce from the given entropy source.
    pub fn generate_from<R: RngCore + ?Sized>(rng: &mut R) -> Result<Self, EntropyUnavailable> {
        let mut bytes = [0u8; NONCE_ENTROPY_BYTES];
        rng.try_fill_bytes(&mut bytes)?;
        Ok(Self::from_entropy(&bytes))
    }

    fn from_entropy(bytes: &[u8; NONCE_ENTROPY_BYTES]) -> Self {
        let (head, tail) = bytes.split_at(HEAD_BYTES);

        let mut head = STANDARD.encode(to_hex(head));
        head.truncate(HEAD_LEN);
        let tail = STANDARD.encode(to_hex(tail));

        Self(format!("{head}{SEPARATOR}{tail}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

impl AsRef<str> for Nonce {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Nonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// Keeps nonces out of debug logs.
impl fmt::Debug for Nonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Nonce(..)")
    }
}
