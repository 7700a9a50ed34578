//! Library AEAD backend using `XChaCha20-Poly1305`
//!
//! - Key: `HKDF(master, salt = nonce, info = "BMSCv6-prod:" || context)`
//! - Associated data: `u16_be(len(context)) || context || aad`
//! - 192-bit random nonces, 16-byte Poly1305 tag
//!
//! Byte-compatible with libsodium's `crypto_aead_xchacha20poly1305_ietf`.

use chacha20poly1305::{
    XChaCha20Poly1305, XNonce,
    aead::{AeadInPlace, KeyInit, generic_array::GenericArray},
};

use super::{Backend, KEY_LEN, KeystreamEngine, TAG_LEN, Tag, check_nonce_len};
use crate::{
    derivation::{AEAD_LABEL_PREFIX, SubKey},
    error::{BmscError, Result},
};

/// Nonce length for the AEAD backend (24 bytes)
pub const NONCE_LEN: usize = 24;

/// Longest context the 2-byte length prefix can describe
pub const MAX_CONTEXT_LEN: usize = u16::MAX as usize;

/// `XChaCha20` block-counter limit: 2^32 blocks of 64 bytes, minus one block
const MAX_MESSAGE_LEN: u64 = (1 << 38) - 64;

/// The `XChaCha20-Poly1305` engine.
#[derive(Debug, Clone, Copy, Default)]
pub struct XChaChaStream;

impl XChaChaStream {
    fn cipher(master_key: &[u8; KEY_LEN], context: &[u8], nonce: &[u8]) -> XChaCha20Poly1305 {
        let key = SubKey::derive(master_key, nonce, &[AEAD_LABEL_PREFIX, context]);
        XChaCha20Poly1305::new(key.as_bytes().into())
    }
}

impl KeystreamEngine for XChaChaStream {
    fn backend(&self) -> Backend {
        Backend::XChaCha20Poly1305
    }

    fn seal(
        &self,
        master_key: &[u8; KEY_LEN],
        context: &[u8],
        nonce: &[u8],
        aad: &[u8],
        buffer: &mut [u8],
    ) -> Result<Tag> {
        check_nonce_len(self.backend(), nonce)?;
        let associated_data = associated_data(context, aad)?;
        let cipher = Self::cipher(master_key, context, nonce);
        let len = buffer.len();

        let tag = cipher
            .encrypt_in_place_detached(XNonce::from_slice(nonce), &associated_data, buffer)
            .map_err(|_| BmscError::FieldTooLong {
                field: "message",
                len,
                max: usize::try_from(MAX_MESSAGE_LEN).unwrap_or(usize::MAX),
            })?;

        let mut out = [0u8; TAG_LEN];
        out.copy_from_slice(&tag);
        Ok(out)
    }

    fn open(
        &self,
        master_key: &[u8; KEY_LEN],
        context: &[u8],
        nonce: &[u8],
        aad: &[u8],
        buffer: &mut [u8],
        tag: &Tag,
    ) -> Result<()> {
        check_nonce_len(self.backend(), nonce)?;
        let associated_data = associated_data(context, aad)?;
        let cipher = Self::cipher(master_key, context, nonce);

        // Poly1305 is verified before the keystream is applied
        cipher
            .decrypt_in_place_detached(
                XNonce::from_slice(nonce),
                &associated_data,
                buffer,
                GenericArray::from_slice(tag),
            )
            .map_err(|_| BmscError::AuthenticationFailure)
    }
}

/// Build `u16_be(len(context)) || context || aad`.
///
/// The length prefix keeps `(context, aad)` pairs unambiguous: moving bytes
/// from the end of the context to the front of the AAD changes the encoding.
fn associated_data(context: &[u8], aad: &[u8]) -> Result<Vec<u8>> {
    let context_len = u16::try_from(context.len()).map_err(|_| BmscError::FieldTooLong {
        field: "context",
        len: context.len(),
        max: MAX_CONTEXT_LEN,
    })?;

    let mut ad = Vec::with_capacity(2 + context.len() + aad.len());
    ad.extend_from_slice(&context_len.to_be_bytes());
    ad.extend_from_slice(context);
    ad.extend_from_slice(aad);
    Ok(ad)
}
