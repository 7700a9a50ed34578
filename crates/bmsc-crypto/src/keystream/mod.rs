//! Keystream engines: the two interchangeable sealing backends.
//!
//! [`AuthenticationCore`](crate::Cipher) owns validation, nonce generation and
//! fail-closed ordering; an engine owns the key schedule, the keystream, and
//! the tag for one backend.
//!
//! ```text
//! Master Key ──┐
//!              ├─ HKDF(salt = nonce) ─▶ subkey(s)
//! Nonce ───────┘                           │
//!                                          ▼
//!                    HmacStream: per-byte HMAC keystream + HMAC tag
//!              XChaCha20Poly1305: library AEAD, Poly1305 tag
//! ```
//!
//! Both produce a ciphertext of the plaintext's length plus a detached
//! 16-byte tag.

use std::{fmt, str::FromStr};

use crate::error::{BmscError, Result};

pub mod hmac_stream;
pub mod xchacha;

pub use hmac_stream::HmacStream;
pub use xchacha::XChaChaStream;

/// Authentication tag width, identical for both backends
pub const TAG_LEN: usize = 16;

/// Master key length
pub const KEY_LEN: usize = 32;

/// Detached authentication tag
pub type Tag = [u8; TAG_LEN];

/// Backend selector.
///
/// This is the configuration value that decides which engine seals and opens.
/// Envelopes do not record the backend, so both sides must agree on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Backend {
    /// Homegrown per-byte HMAC keystream with a truncated HMAC tag
    HmacStream,
    /// XChaCha20-Poly1305 from the `chacha20poly1305` crate
    #[default]
    XChaCha20Poly1305,
}

impl Backend {
    /// All backends, in declaration order.
    pub const ALL: [Self; 2] = [Self::HmacStream, Self::XChaCha20Poly1305];

    /// Fixed nonce length for this backend.
    pub fn nonce_len(self) -> usize {
        match self {
            Self::HmacStream => hmac_stream::NONCE_LEN,
            Self::XChaCha20Poly1305 => xchacha::NONCE_LEN,
        }
    }

    /// The engine implementing this backend.
    pub fn engine(self) -> &'static dyn KeystreamEngine {
        match self {
            Self::HmacStream => &HmacStream,
            Self::XChaCha20Poly1305 => &XChaChaStream,
        }
    }

    /// Stable name used on the command line and in logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::HmacStream => "hmac-stream",
            Self::XChaCha20Poly1305 => "xchacha20poly1305",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown backend name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown backend '{0}' (expected hmac-stream or xchacha20poly1305)")]
pub struct UnknownBackend(pub String);

impl FromStr for Backend {
    type Err = UnknownBackend;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "hmac-stream" | "hmac" | "demo" => Ok(Self::HmacStream),
            "xchacha20poly1305" | "xchacha" | "prod" => Ok(Self::XChaCha20Poly1305),
            _ => Err(UnknownBackend(s.to_string())),
        }
    }
}

/// A sealing backend.
///
/// Implementations are stateless: every call derives its own subkeys from the
/// master key and nonce and drops (zeroizes) them before returning.
///
/// # Contract
///
/// - `seal` encrypts `buffer` in place and returns the detached tag
/// - `open` verifies the tag BEFORE touching `buffer`; on any error `buffer`
///   still holds the ciphertext
/// - A nonce of the wrong length is rejected with `InvalidNonceLength`
///   before any key is derived
pub trait KeystreamEngine: Send + Sync {
    /// Which backend this engine implements.
    fn backend(&self) -> Backend;

    /// Fixed nonce length.
    fn nonce_len(&self) -> usize {
        self.backend().nonce_len()
    }

    /// Encrypt `buffer` in place and compute the tag over the bound header.
    fn seal(
        &self,
        master_key: &[u8; KEY_LEN],
        context: &[u8],
        nonce: &[u8],
        aad: &[u8],
        buffer: &mut [u8],
    ) -> Result<Tag>;

    /// Verify `tag`, then decrypt `buffer` in place.
    fn open(
        &self,
        master_key: &[u8; KEY_LEN],
        context: &[u8],
        nonce: &[u8],
        aad: &[u8],
        buffer: &mut [u8],
        tag: &Tag,
    ) -> Result<()>;
}

/// Reject a nonce that does not match `backend`.
pub(crate) fn check_nonce_len(backend: Backend, nonce: &[u8]) -> Result<()> {
    let expected = backend.nonce_len();
    if nonce.len() != expected {
        return Err(BmscError::InvalidNonceLength { expected, actual: nonce.len() });
    }
    Ok(())
}
