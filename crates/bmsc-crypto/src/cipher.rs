//! Authentication core: validated, fail-closed encrypt and decrypt.
//!
//! [`Cipher`] is the only entry point that touches caller-supplied key and
//! nonce bytes. It checks their lengths, draws fresh nonces from its
//! [`Entropy`] source, and hands the actual work to the configured
//! [`KeystreamEngine`](crate::keystream::KeystreamEngine).
//!
//! # Security
//!
//! - Fail Closed: on decrypt the tag is verified before any keystream is
//!   applied. A failed decrypt returns an error and no bytes.
//! - One Outcome: wrong key, wrong context, wrong AAD and corrupted data all
//!   surface as `AuthenticationFailure`.
//! - No Secrets in Logs: events carry the backend, lengths and envelope
//!   version only.

use tracing::debug;
use zeroize::Zeroizing;

use crate::{
    entropy::{Entropy, SystemEntropy},
    envelope::{Envelope, ParamSource, Version},
    error::{BmscError, Result},
    keystream::{Backend, KEY_LEN, Tag},
};

/// Cipher configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CipherConfig {
    /// Backend used to seal and open
    pub backend: Backend,
}

impl CipherConfig {
    /// Configuration for a specific backend.
    pub fn with_backend(backend: Backend) -> Self {
        Self { backend }
    }
}

/// Output of [`Cipher::encrypt`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sealed {
    /// Fresh nonce, `backend.nonce_len()` bytes
    pub nonce: Vec<u8>,
    /// Ciphertext, same length as the plaintext
    pub ciphertext: Vec<u8>,
    /// Detached tag
    pub tag: Tag,
}

impl Sealed {
    /// Split into `(nonce, ciphertext, tag)`.
    pub fn into_parts(self) -> (Vec<u8>, Vec<u8>, Tag) {
        (self.nonce, self.ciphertext, self.tag)
    }
}

/// Output of [`Cipher::open_envelope`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Opened {
    /// Authenticated plaintext
    pub plaintext: Vec<u8>,
    /// Layout of the envelope that was opened
    pub version: Version,
    /// Context the envelope was authenticated under
    pub context: Vec<u8>,
    /// Whether the context came from the envelope or the caller
    pub context_source: ParamSource,
    /// Whether the AAD came from the envelope or the caller
    pub aad_source: ParamSource,
}

/// Authenticated encryption bound to a context and optional AAD.
///
/// Stateless apart from the entropy handle: every call derives and drops its
/// own subkeys, so one `Cipher` may be shared across threads.
///
/// ```
/// use bmsc_crypto::{Cipher, CipherConfig};
///
/// let cipher = Cipher::system(CipherConfig::default());
/// let key = [7u8; 32];
///
/// let sealed = cipher.encrypt(b"hello", &key, b"ctx", b"").unwrap();
/// let plaintext = cipher
///     .decrypt(&sealed.nonce, &sealed.ciphertext, &sealed.tag, &key, b"ctx", b"")
///     .unwrap();
/// assert_eq!(plaintext, b"hello");
/// ```
#[derive(Debug, Clone)]
pub struct Cipher<E: Entropy = SystemEntropy> {
    config: CipherConfig,
    entropy: E,
}

impl Cipher<SystemEntropy> {
    /// Cipher drawing nonces from the OS RNG.
    pub fn system(config: CipherConfig) -> Self {
        Self::new(config, SystemEntropy::new())
    }
}

impl<E: Entropy> Cipher<E> {
    /// Cipher drawing nonces from `entropy`.
    ///
    /// Production code should use [`Cipher::system`]. A deterministic source
    /// reuses nonces and must only appear in tests.
    pub fn new(config: CipherConfig, entropy: E) -> Self {
        Self { config, entropy }
    }

    /// Configured backend.
    pub fn backend(&self) -> Backend {
        self.config.backend
    }

    /// Nonce length of the configured backend.
    pub fn nonce_len(&self) -> usize {
        self.config.backend.nonce_len()
    }

    /// Encrypt `plaintext` under `key`, bound to `context` and `aad`.
    ///
    /// Pass `&[]` for no AAD.
    ///
    /// # Errors
    ///
    /// - `InvalidKeyLength`: `key` is not 32 bytes
    /// - `FieldTooLong`: the message or context exceeds what the backend
    ///   can bind
    pub fn encrypt(&self, plaintext: &[u8], key: &[u8], context: &[u8], aad: &[u8]) -> Result<Sealed> {
        let master_key = master_key(key)?;

        let mut nonce = vec![0u8; self.nonce_len()];
        self.entropy.random_bytes(&mut nonce);

        let mut ciphertext = plaintext.to_vec();
        let tag = self.config.backend.engine().seal(master_key, context, &nonce, aad, &mut ciphertext)?;

        debug!(
            backend = %self.config.backend,
            plaintext_len = plaintext.len(),
            context_len = context.len(),
            aad_len = aad.len(),
            "sealed"
        );

        Ok(Sealed { nonce, ciphertext, tag })
    }

    /// Verify and decrypt.
    ///
    /// # Errors
    ///
    /// Checked in this order:
    /// - `InvalidNonceLength`: `nonce` does not match the backend
    /// - `InvalidKeyLength`: `key` is not 32 bytes
    /// - `AuthenticationFailure`: the tag does not verify (including a tag
    ///   that is not 16 bytes). No plaintext is produced.
    pub fn decrypt(
        &self,
        nonce: &[u8],
        ciphertext: &[u8],
        tag: &[u8],
        key: &[u8],
        context: &[u8],
        aad: &[u8],
    ) -> Result<Vec<u8>> {
        let expected = self.nonce_len();
        if nonce.len() != expected {
            return Err(BmscError::InvalidNonceLength { expected, actual: nonce.len() });
        }
        let master_key = master_key(key)?;

        let tag: &Tag = tag.try_into().map_err(|_| BmscError::AuthenticationFailure)?;

        let mut buffer = Zeroizing::new(ciphertext.to_vec());
        let outcome =
            self.config.backend.engine().open(master_key, context, nonce, aad, &mut buffer, tag);

        if let Err(err) = outcome {
            debug!(backend = %self.config.backend, ciphertext_len = ciphertext.len(), "open rejected");
            return Err(err);
        }

        debug!(backend = %self.config.backend, ciphertext_len = ciphertext.len(), "opened");
        Ok(std::mem::take(&mut *buffer))
    }

    /// Encrypt and wrap the result in an envelope of `version`.
    ///
    /// Version 2 embeds `context` and `aad`; versions 0 and 1 do not, so the
    /// reader must supply them again.
    pub fn seal_envelope(
        &self,
        version: Version,
        plaintext: &[u8],
        key: &[u8],
        context: &[u8],
        aad: &[u8],
    ) -> Result<Vec<u8>> {
        let (nonce, ciphertext, tag) = self.encrypt(plaintext, key, context, aad)?.into_parts();
        let envelope = Envelope::build(version, context, aad, nonce, tag, ciphertext);

        debug!(%version, encoded_len = envelope.encoded_len(), "envelope sealed");
        envelope.to_bytes()
    }

    /// Decode an envelope and decrypt it.
    ///
    /// Context and AAD are chosen by [`Envelope::resolve`]: an embedded
    /// context wins over `external_context`, an embedded AAD is used unless
    /// `external_aad` is non-empty.
    ///
    /// # Errors
    ///
    /// Container errors from [`Envelope::decode`], then anything
    /// [`decrypt`](Self::decrypt) returns.
    pub fn open_envelope(
        &self,
        blob: &[u8],
        key: &[u8],
        external_context: &[u8],
        external_aad: &[u8],
    ) -> Result<Opened> {
        let envelope = Envelope::decode(blob, self.nonce_len())?;
        self.open_decoded(&envelope, key, external_context, external_aad)
    }

    /// Decrypt an already decoded envelope.
    ///
    /// Same precedence as [`open_envelope`](Self::open_envelope). Callers
    /// that must not trust an embedded context call
    /// [`Envelope::discard_embedded_context`] before opening.
    pub fn open_decoded(
        &self,
        envelope: &Envelope,
        key: &[u8],
        external_context: &[u8],
        external_aad: &[u8],
    ) -> Result<Opened> {
        let resolved = envelope.resolve(external_context, external_aad);

        debug!(
            version = %envelope.version,
            context_source = ?resolved.context_source,
            aad_source = ?resolved.aad_source,
            "envelope decoded"
        );

        let plaintext = self.decrypt(
            &envelope.nonce,
            &envelope.ciphertext,
            &envelope.tag,
            key,
            resolved.context,
            resolved.aad,
        )?;

        Ok(Opened {
            plaintext,
            version: envelope.version,
            context: resolved.context.to_vec(),
            context_source: resolved.context_source,
            aad_source: resolved.aad_source,
        })
    }
}

/// Borrow `key` as a fixed-size master key.
fn master_key(key: &[u8]) -> Result<&[u8; KEY_LEN]> {
    key.try_into().map_err(|_| BmscError::InvalidKeyLength { expected: KEY_LEN, actual: key.len() })
}
