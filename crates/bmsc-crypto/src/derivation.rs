//! Key derivation using HKDF-SHA256
//!
//! Every seal/open derives fresh subkeys from the master key with the nonce as
//! HKDF salt, so subkeys are unique per nonce and never outlive one call.

use std::fmt;

use hkdf::Hkdf;
use sha2::Sha256;
use zeroize::{Zeroize, Zeroizing};

use crate::error::{BmscError, Result};

/// Length of every derived subkey (32 bytes)
pub const SUBKEY_LEN: usize = 32;

/// HKDF-SHA256 output ceiling: 255 blocks of 32 bytes
pub const HKDF_MAX_OUTPUT: usize = 255 * 32;

/// Info label for the homegrown keystream subkey
pub(crate) const STREAM_LABEL: &[u8] = b"stream";

/// Info label for the homegrown tag subkey
pub(crate) const MAC_LABEL: &[u8] = b"mac";

/// Info prefix for the AEAD backend key; the context is appended
pub(crate) const AEAD_LABEL_PREFIX: &[u8] = b"BMSCv6-prod:";

/// HKDF-SHA256 extract-and-expand.
///
/// Extract computes `prk = HMAC(salt, ikm)`, expand chains
/// `t_i = HMAC(prk, t_{i-1} || info || i)` until `length` bytes exist. The
/// output is zeroized when dropped.
///
/// # Errors
///
/// - `InvalidLength`: `length` exceeds [`HKDF_MAX_OUTPUT`]
pub fn hkdf_sha256(
    ikm: &[u8],
    salt: &[u8],
    info: &[u8],
    length: usize,
) -> Result<Zeroizing<Vec<u8>>> {
    if length > HKDF_MAX_OUTPUT {
        return Err(BmscError::InvalidLength { requested: length, max: HKDF_MAX_OUTPUT });
    }

    let hkdf = Hkdf::<Sha256>::new(Some(salt), ikm);
    let mut okm = Zeroizing::new(vec![0u8; length]);
    hkdf.expand(info, okm.as_mut_slice())
        .map_err(|_| BmscError::InvalidLength { requested: length, max: HKDF_MAX_OUTPUT })?;

    Ok(okm)
}

/// A 32-byte subkey derived for a single seal or open.
///
/// Zeroized on drop, including when the owning call returns early with an
/// error.
pub struct SubKey {
    key: [u8; SUBKEY_LEN],
}

impl SubKey {
    /// Derive a subkey from `ikm` with the given salt.
    ///
    /// `info` parts are fed to HKDF-Expand as if concatenated, so callers can
    /// bind a label and a context without building a temporary buffer.
    pub fn derive(ikm: &[u8], salt: &[u8], info: &[&[u8]]) -> Self {
        let hkdf = Hkdf::<Sha256>::new(Some(salt), ikm);

        let mut key = [0u8; SUBKEY_LEN];
        let Ok(()) = hkdf.expand_multi_info(info, &mut key) else {
            unreachable!("32 bytes is a valid HKDF-SHA256 output length");
        };

        Self { key }
    }

    /// Raw key bytes.
    pub fn as_bytes(&self) -> &[u8; SUBKEY_LEN] {
        &self.key
    }
}

impl Drop for SubKey {
    fn drop(&mut self) {
        self.key.zeroize();
    }
}

impl fmt::Debug for SubKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SubKey([REDACTED])")
    }
}
