//! Homegrown keystream: one HMAC-SHA256 evaluation per output byte
//!
//! For an `n`-byte message, keystream byte `i` is the first byte of
//!
//! ```text
//! HMAC(Kstream, context || nonce || dec(n) || dec(i) || dec(c_i)),  c_i = (i + 1) * (n - i)
//! ```
//!
//! where `dec` is unpadded ASCII base-10. The tag is the first 16 bytes of
//! `HMAC(Kmac, context || nonce || u32_be(n) || aad || ciphertext)`.
//! `Kstream` and `Kmac` come from HKDF with the nonce as salt and the labels
//! `"stream"` / `"mac"`.
//!
//! # Security
//!
//! The per-byte construction has no forward-secrecy ratchet and a public
//! coefficient formula. It is kept bit-compatible with existing ciphertexts
//! and offers no proven margin beyond HMAC output reuse; new data should use
//! [`XChaChaStream`](super::XChaChaStream).
//!
//! Cost is one keyed-hash finalization per plaintext byte, which dominates
//! everything else in this backend.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use zeroize::Zeroizing;

use super::{Backend, KEY_LEN, KeystreamEngine, TAG_LEN, Tag, check_nonce_len};
use crate::{
    derivation::{MAC_LABEL, STREAM_LABEL, SUBKEY_LEN, SubKey},
    error::{BmscError, Result},
};

type HmacSha256 = Hmac<Sha256>;

/// Nonce length for the homegrown backend (16 bytes)
pub const NONCE_LEN: usize = 16;

/// Longest message whose length fits the 4-byte header field
pub const MAX_MESSAGE_LEN: usize = u32::MAX as usize;

/// Digits in `u128::MAX`
const MAX_DECIMAL_DIGITS: usize = 39;

/// Keystream coefficient `c_i = (i + 1) * (n - i)`.
///
/// Symmetric around the midpoint: `coefficient(i, n) == coefficient(n - 1 - i, n)`.
/// Computed in `u128` so it cannot overflow for any `usize` length.
pub fn coefficient(index: usize, length: usize) -> u128 {
    debug_assert!(index < length, "index {index} out of range for length {length}");
    (index as u128 + 1) * (length - index) as u128
}

/// Generate `length` keystream bytes.
///
/// Deterministic: identical `(subkey, context, nonce, length)` always yields
/// the identical keystream. The result is zeroized on drop.
pub fn generate(
    subkey: &[u8; SUBKEY_LEN],
    context: &[u8],
    nonce: &[u8],
    length: usize,
) -> Zeroizing<Vec<u8>> {
    let mut keystream = Zeroizing::new(vec![0u8; length]);
    apply_keystream(subkey, context, nonce, keystream.as_mut_slice());
    keystream
}

/// XOR the keystream for `data.len()` into `data`.
///
/// XOR is self-inverse, so this both encrypts and decrypts.
pub fn apply_keystream(subkey: &[u8; SUBKEY_LEN], context: &[u8], nonce: &[u8], data: &mut [u8]) {
    let length = data.len();
    let mut length_digits = [0u8; MAX_DECIMAL_DIGITS];
    let mut index_digits = [0u8; MAX_DECIMAL_DIGITS];
    let mut coeff_digits = [0u8; MAX_DECIMAL_DIGITS];

    // context || nonce || dec(n) is shared by every byte
    let mut prefix = keyed_mac(subkey);
    prefix.update(context);
    prefix.update(nonce);
    prefix.update(decimal(length as u128, &mut length_digits));

    for (index, byte) in data.iter_mut().enumerate() {
        let mut mac = prefix.clone();
        mac.update(decimal(index as u128, &mut index_digits));
        mac.update(decimal(coefficient(index, length), &mut coeff_digits));
        *byte ^= mac.finalize().into_bytes()[0];
    }
}

/// The homegrown HMAC-stream engine.
#[derive(Debug, Clone, Copy, Default)]
pub struct HmacStream;

impl HmacStream {
    fn derive_keys(master_key: &[u8; KEY_LEN], nonce: &[u8]) -> (SubKey, SubKey) {
        let stream_key = SubKey::derive(master_key, nonce, &[STREAM_LABEL]);
        let mac_key = SubKey::derive(master_key, nonce, &[MAC_LABEL]);
        (stream_key, mac_key)
    }
}

impl KeystreamEngine for HmacStream {
    fn backend(&self) -> Backend {
        Backend::HmacStream
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
        check_message_len(buffer.len())?;
        let (stream_key, mac_key) = Self::derive_keys(master_key, nonce);

        apply_keystream(stream_key.as_bytes(), context, nonce, buffer);
        let mac = header_mac(&mac_key, context, nonce, aad, buffer)?;

        let mut tag = [0u8; TAG_LEN];
        tag.copy_from_slice(&mac.finalize().into_bytes()[..TAG_LEN]);
        Ok(tag)
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
        let (stream_key, mac_key) = Self::derive_keys(master_key, nonce);

        // Tag check strictly precedes keystream generation
        header_mac(&mac_key, context, nonce, aad, buffer)?
            .verify_truncated_left(tag)
            .map_err(|_| BmscError::AuthenticationFailure)?;

        apply_keystream(stream_key.as_bytes(), context, nonce, buffer);
        Ok(())
    }
}

/// HMAC state over `context || nonce || u32_be(len) || aad || ciphertext`.
fn header_mac(
    mac_key: &SubKey,
    context: &[u8],
    nonce: &[u8],
    aad: &[u8],
    ciphertext: &[u8],
) -> Result<HmacSha256> {
    let length = check_message_len(ciphertext.len())?;

    let mut mac = keyed_mac(mac_key.as_bytes());
    mac.update(context);
    mac.update(nonce);
    mac.update(&length.to_be_bytes());
    mac.update(aad);
    mac.update(ciphertext);
    Ok(mac)
}

fn check_message_len(len: usize) -> Result<u32> {
    u32::try_from(len).map_err(|_| BmscError::FieldTooLong {
        field: "message",
        len,
        max: MAX_MESSAGE_LEN,
    })
}

fn keyed_mac(key: &[u8; SUBKEY_LEN]) -> HmacSha256 {
    let Ok(mac) = HmacSha256::new_from_slice(key) else {
        unreachable!("HMAC-SHA256 accepts any key size");
    };
    mac
}

/// Unpadded ASCII base-10 rendering of `value` into the tail of `buf`.
#[allow(clippy::cast_possible_truncation)]
fn decimal(mut value: u128, buf: &mut [u8; MAX_DECIMAL_DIGITS]) -> &[u8] {
    let mut start = buf.len();
    loop {
        start -= 1;
        buf[start] = b'0' + (value % 10) as u8;
        value /= 10;
        if value == 0 {
            break;
        }
    }
    &buf[start..]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sequential_key() -> [u8; KEY_LEN] {
        let mut key = [0u8; KEY_LEN];
        for (i, byte) in key.iter_mut().enumerate() {
            *byte = i as u8;
        }
        key
    }

    #[test]
    fn coefficients_for_small_length() {
        let coeffs: Vec<u128> = (0..5).map(|i| coefficient(i, 5)).collect();
        assert_eq!(coeffs, vec![5, 8, 9, 8, 5]);
    }

    #[test]
    fn coefficient_is_symmetric() {
        for length in 1..64 {
            for index in 0..length {
                assert_eq!(coefficient(index, length), coefficient(length - 1 - index, length));
            }
        }
    }

    #[test]
    fn coefficient_does_not_overflow_at_extremes() {
        let length = usize::MAX;
        let mid = length / 2;
        assert!(coefficient(mid, length) > u128::from(u64::MAX));
    }

    #[test]
    fn decimal_rendering() {
        let mut buf = [0u8; MAX_DECIMAL_DIGITS];
        assert_eq!(decimal(0, &mut buf), b"0");
        assert_eq!(decimal(7, &mut buf), b"7");
        assert_eq!(decimal(1_000_000, &mut buf), b"1000000");
        assert_eq!(decimal(u128::MAX, &mut buf), b"340282366920938463463374607431768211455");
    }

    #[test]
    fn keystream_known_answer() {
        let nonce = [0x42; NONCE_LEN];
        let stream_key = SubKey::derive(&sequential_key(), &nonce, &[STREAM_LABEL]);

        let keystream = generate(stream_key.as_bytes(), b"BMSCv6-IV00", &nonce, 8);

        assert_eq!(hex::encode(keystream.as_slice()), "3f2f4309fc5da64c");
    }

    #[test]
    fn keystream_is_deterministic() {
        let key = [0x33; SUBKEY_LEN];
        let a = generate(&key, b"ctx", &[1; NONCE_LEN], 100);
        let b = generate(&key, b"ctx", &[1; NONCE_LEN], 100);
        assert_eq!(a.as_slice(), b.as_slice());
    }

    #[test]
    fn keystream_depends_on_length() {
        // dec(n) and c_i both change with n, so a shorter stream is not a prefix
        let key = [0x33; SUBKEY_LEN];
        let long = generate(&key, b"ctx", &[1; NONCE_LEN], 32);
        let short = generate(&key, b"ctx", &[1; NONCE_LEN], 16);
        assert_ne!(&long[..16], short.as_slice());
    }

    #[test]
    fn keystream_depends_on_nonce_and_context() {
        let key = [0x33; SUBKEY_LEN];
        let base = generate(&key, b"ctx", &[1; NONCE_LEN], 32);
        let other_nonce = generate(&key, b"ctx", &[2; NONCE_LEN], 32);
        let other_context = generate(&key, b"ctx2", &[1; NONCE_LEN], 32);
        assert_ne!(base.as_slice(), other_nonce.as_slice());
        assert_ne!(base.as_slice(), other_context.as_slice());
    }

    #[test]
    fn empty_keystream() {
        assert!(generate(&[0; SUBKEY_LEN], b"", &[0; NONCE_LEN], 0).is_empty());
    }

    #[test]
    fn apply_is_self_inverse() {
        let key = [0x99; SUBKEY_LEN];
        let original = b"attack at dawn".to_vec();
        let mut data = original.clone();

        apply_keystream(&key, b"ctx", &[7; NONCE_LEN], &mut data);
        assert_ne!(data, original);

        apply_keystream(&key, b"ctx", &[7; NONCE_LEN], &mut data);
        assert_eq!(data, original);
    }

    #[test]
    fn seal_open_roundtrip() {
        let key = sequential_key();
        let nonce = [0xA5; NONCE_LEN];
        let mut buffer = b"Hello, World!".to_vec();

        let tag = HmacStream.seal(&key, b"ctx", &nonce, b"aad", &mut buffer).unwrap();
        assert_ne!(buffer, b"Hello, World!");

        HmacStream.open(&key, b"ctx", &nonce, b"aad", &mut buffer, &tag).unwrap();
        assert_eq!(buffer, b"Hello, World!");
    }

    #[test]
    fn ciphertext_length_equals_plaintext_length() {
        let mut buffer = vec![0u8; 37];
        HmacStream.seal(&sequential_key(), b"", &[0; NONCE_LEN], b"", &mut buffer).unwrap();
        assert_eq!(buffer.len(), 37);
    }

    #[test]
    fn failed_open_leaves_buffer_untouched() {
        let key = sequential_key();
        let nonce = [0xA5; NONCE_LEN];
        let mut buffer = b"secret".to_vec();
        let mut tag = HmacStream.seal(&key, b"ctx", &nonce, b"", &mut buffer).unwrap();
        let ciphertext = buffer.clone();

        tag[0] ^= 0x01;
        let result = HmacStream.open(&key, b"ctx", &nonce, b"", &mut buffer, &tag);

        assert_eq!(result, Err(BmscError::AuthenticationFailure));
        assert_eq!(buffer, ciphertext, "no plaintext byte may be produced on failure");
    }

    #[test]
    fn aad_is_bound_to_tag() {
        let key = sequential_key();
        let nonce = [0x01; NONCE_LEN];
        let mut buffer = b"payload".to_vec();
        let tag = HmacStream.seal(&key, b"ctx", &nonce, b"aad-1", &mut buffer).unwrap();

        let result = HmacStream.open(&key, b"ctx", &nonce, b"aad-2", &mut buffer, &tag);
        assert_eq!(result, Err(BmscError::AuthenticationFailure));
    }

    #[test]
    fn context_is_bound_to_tag() {
        let key = sequential_key();
        let nonce = [0x01; NONCE_LEN];
        let mut buffer = b"payload".to_vec();
        let tag = HmacStream.seal(&key, b"ctx-a", &nonce, b"", &mut buffer).unwrap();

        let result = HmacStream.open(&key, b"ctx-b", &nonce, b"", &mut buffer, &tag);
        assert_eq!(result, Err(BmscError::AuthenticationFailure));
    }
}
