//! BMSC Authenticated Encryption
//!
//! Context-bound authenticated encryption with two interchangeable backends
//! and a versioned envelope for storing the result. Randomness is injected
//! through [`Entropy`] so tests can pin nonces and reproduce fixed vectors.
//!
//! # Key Lifecycle
//!
//! Every call derives fresh subkeys from the caller's 32-byte master key,
//! using the per-message nonce as the HKDF salt. Subkeys live for one call
//! and are zeroized on drop.
//!
//! ```text
//! Master Key + Nonce
//!        │
//!        ▼
//! HKDF-SHA256 (salt = nonce)
//!        │
//!        ├── hmac-stream:  Kstream ("stream"), Kmac ("mac")
//!        │                   │
//!        │                   ▼
//!        │                 per-byte HMAC keystream, truncated HMAC tag
//!        │
//!        └── xchacha:      K_enc ("BMSCv6-prod:" || context)
//!                            │
//!                            ▼
//!                          XChaCha20-Poly1305
//!        │
//!        ▼
//! (nonce, ciphertext, tag) ──▶ Envelope v0 / v1 / v2
//! ```
//!
//! # Security
//!
//! Binding:
//! - The tag covers context, nonce, message length, AAD and ciphertext
//! - Changing any of them, or the key, yields `AuthenticationFailure`
//!
//! Fail Closed:
//! - Tags are compared in constant time
//! - Verification happens before any keystream is applied; a failed open
//!   releases no plaintext bytes
//!
//! Nonces:
//! - Drawn fresh from the OS RNG for every encryption
//! - Reusing a nonce under the same key and context breaks both
//!   confidentiality and the tag binding
//!
//! The `hmac-stream` backend is a teaching construction kept for
//! compatibility with existing envelopes. New data should use the default
//! `xchacha20poly1305` backend.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod cipher;
pub mod derivation;
pub mod entropy;
pub mod envelope;
pub mod error;
pub mod keystream;

pub use cipher::{Cipher, CipherConfig, Opened, Sealed};
pub use derivation::{SubKey, hkdf_sha256};
pub use entropy::{Entropy, SystemEntropy};
pub use envelope::{Envelope, MAGIC, ParamSource, Resolved, Version};
pub use error::{BmscError, Result};
pub use keystream::{Backend, KEY_LEN, KeystreamEngine, TAG_LEN, Tag, UnknownBackend};
