//! Versioned binary envelope for persisting sealed output.
//!
//! Three layouts, told apart by a fixed 6-byte magic. All lengths are Big
//! Endian. `N` is the nonce length of the backend that produced the blob.
//!
//! ```text
//! v0 (raw): nonce(N) || tag(16) || ciphertext
//! v1:       "BMSC6\0" || 0x01 || flags || nonce(N) || tag(16) || ciphertext
//! v2:       "BMSC6\0" || 0x02 || flags || ctx_len(2) || aad_len(4)
//!           || context || aad || nonce(N) || tag(16) || ciphertext
//! ```
//!
//! The ciphertext always runs to the end of the blob, so an envelope cannot
//! be followed by trailing data.
//!
//! # Security
//!
//! - Bounds First: every declared length is checked against the bytes that
//!   remain BEFORE slicing. Truncated input yields `MalformedContainer`,
//!   never a short field or an out-of-bounds read.
//! - Not Authenticated: decoding only establishes structure. The embedded
//!   context and AAD are trusted only once the tag verifies.

use std::{fmt, str::FromStr};

use bytes::{Buf, BufMut};

use crate::{
    error::{BmscError, Result},
    keystream::{TAG_LEN, Tag},
};

/// Envelope magic: "BMSC6" followed by a zero byte
pub const MAGIC: [u8; 6] = *b"BMSC6\0";

/// Magic + version byte + flags byte
pub const PREAMBLE_LEN: usize = MAGIC.len() + 2;

/// `ctx_len` (u16) + `aad_len` (u32) in a version 2 header
pub const V2_LENGTHS_LEN: usize = 2 + 4;

/// Longest context a version 2 envelope can embed
pub const MAX_EMBEDDED_CONTEXT: usize = u16::MAX as usize;

/// Longest AAD a version 2 envelope can embed
pub const MAX_EMBEDDED_AAD: usize = u32::MAX as usize;

/// Envelope layout version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum Version {
    /// No magic: `nonce || tag || ciphertext`
    Raw = 0,
    /// Magic header, no embedded parameters
    V1 = 1,
    /// Magic header with embedded context and AAD
    #[default]
    V2 = 2,
}

impl Version {
    /// Parse the version byte that follows the magic.
    ///
    /// Only 1 and 2 may appear there; raw envelopes have no version byte.
    pub fn from_byte(byte: u8) -> Result<Self> {
        match byte {
            1 => Ok(Self::V1),
            2 => Ok(Self::V2),
            other => Err(BmscError::UnsupportedVersion(other)),
        }
    }

    /// Numeric version (0 for raw).
    pub fn as_byte(self) -> u8 {
        self as u8
    }

    /// Smallest valid envelope of this version: everything except the
    /// ciphertext and any embedded context/AAD.
    pub fn min_len(self, nonce_len: usize) -> usize {
        let body = nonce_len + TAG_LEN;
        match self {
            Self::Raw => body,
            Self::V1 => PREAMBLE_LEN + body,
            Self::V2 => PREAMBLE_LEN + V2_LENGTHS_LEN + body,
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Raw => f.write_str("raw"),
            Self::V1 => f.write_str("v1"),
            Self::V2 => f.write_str("v2"),
        }
    }
}

impl FromStr for Version {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "raw" | "v0" | "0" => Ok(Self::Raw),
            "v1" | "1" => Ok(Self::V1),
            "v2" | "2" => Ok(Self::V2),
            _ => Err(format!("unknown envelope version '{s}' (expected raw, v1 or v2)")),
        }
    }
}

/// Where a decryption parameter came from after [`Envelope::resolve`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamSource {
    /// Taken from the envelope's version 2 header
    Embedded,
    /// Supplied by the caller
    External,
}

/// Context and AAD chosen for opening an envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolved<'a> {
    /// Context to decrypt under
    pub context: &'a [u8],
    /// AAD to verify
    pub aad: &'a [u8],
    /// Origin of `context`
    pub context_source: ParamSource,
    /// Origin of `aad`
    pub aad_source: ParamSource,
}

/// A parsed or to-be-encoded envelope.
///
/// # Invariants
///
/// - `context` and `aad` are `Some` only for [`Version::V2`] after decoding
/// - `nonce.len()` equals the producing backend's nonce length
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// Layout version
    pub version: Version,
    /// Flags byte (versions 1 and 2). Written as given, surfaced on decode.
    pub flags: u8,
    /// Embedded context (version 2)
    pub context: Option<Vec<u8>>,
    /// Embedded AAD (version 2)
    pub aad: Option<Vec<u8>>,
    /// Nonce used at seal time
    pub nonce: Vec<u8>,
    /// Detached authentication tag
    pub tag: Tag,
    /// Ciphertext, same length as the plaintext
    pub ciphertext: Vec<u8>,
}

impl Envelope {
    /// Raw envelope (`nonce || tag || ciphertext`).
    pub fn raw(nonce: Vec<u8>, tag: Tag, ciphertext: Vec<u8>) -> Self {
        Self { version: Version::Raw, flags: 0, context: None, aad: None, nonce, tag, ciphertext }
    }

    /// Version 1 envelope without embedded parameters.
    pub fn v1(nonce: Vec<u8>, tag: Tag, ciphertext: Vec<u8>) -> Self {
        Self { version: Version::V1, ..Self::raw(nonce, tag, ciphertext) }
    }

    /// Version 2 envelope embedding the context and AAD it was sealed under.
    pub fn v2(context: Vec<u8>, aad: Vec<u8>, nonce: Vec<u8>, tag: Tag, ciphertext: Vec<u8>) -> Self {
        Self {
            version: Version::V2,
            flags: 0,
            context: Some(context),
            aad: Some(aad),
            nonce,
            tag,
            ciphertext,
        }
    }

    /// Build an envelope of any version from sealed parts.
    ///
    /// `context` and `aad` are only kept for version 2.
    pub fn build(
        version: Version,
        context: &[u8],
        aad: &[u8],
        nonce: Vec<u8>,
        tag: Tag,
        ciphertext: Vec<u8>,
    ) -> Self {
        match version {
            Version::Raw => Self::raw(nonce, tag, ciphertext),
            Version::V1 => Self::v1(nonce, tag, ciphertext),
            Version::V2 => Self::v2(context.to_vec(), aad.to_vec(), nonce, tag, ciphertext),
        }
    }

    /// Exact encoded size in bytes.
    pub fn encoded_len(&self) -> usize {
        let body = self.nonce.len() + TAG_LEN + self.ciphertext.len();
        match self.version {
            Version::Raw => body,
            Version::V1 => PREAMBLE_LEN + body,
            Version::V2 => {
                PREAMBLE_LEN + V2_LENGTHS_LEN + self.embedded_context().len()
                    + self.embedded_aad().len()
                    + body
            },
        }
    }

    /// Encode into `dst`.
    ///
    /// Versions 0 and 1 ignore `context`/`aad`. Version 2 writes absent
    /// values as empty.
    ///
    /// # Errors
    ///
    /// - `FieldTooLong`: version 2 context over 65 535 bytes or AAD over
    ///   2^32 - 1 bytes. Nothing is written to `dst` in that case.
    pub fn encode(&self, dst: &mut impl BufMut) -> Result<()> {
        match self.version {
            Version::Raw => {},
            Version::V1 => {
                dst.put_slice(&MAGIC);
                dst.put_u8(Version::V1.as_byte());
                dst.put_u8(self.flags);
            },
            Version::V2 => {
                let context = self.embedded_context();
                let aad = self.embedded_aad();
                let context_len = u16::try_from(context.len()).map_err(|_| {
                    BmscError::FieldTooLong {
                        field: "context",
                        len: context.len(),
                        max: MAX_EMBEDDED_CONTEXT,
                    }
                })?;
                let aad_len = u32::try_from(aad.len()).map_err(|_| BmscError::FieldTooLong {
                    field: "aad",
                    len: aad.len(),
                    max: MAX_EMBEDDED_AAD,
                })?;

                dst.put_slice(&MAGIC);
                dst.put_u8(Version::V2.as_byte());
                dst.put_u8(self.flags);
                dst.put_u16(context_len);
                dst.put_u32(aad_len);
                dst.put_slice(context);
                dst.put_slice(aad);
            },
        }

        dst.put_slice(&self.nonce);
        dst.put_slice(&self.tag);
        dst.put_slice(&self.ciphertext);
        Ok(())
    }

    /// Encode into a freshly allocated buffer.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(self.encoded_len());
        self.encode(&mut out)?;
        Ok(out)
    }

    /// Decode an envelope produced by a backend with `nonce_len`-byte nonces.
    ///
    /// A blob that does not start with [`MAGIC`] is treated as raw.
    ///
    /// # Errors
    ///
    /// - `MalformedContainer`: the blob is shorter than its header, or a
    ///   version 2 `ctx_len`/`aad_len` overruns the remaining bytes
    /// - `UnsupportedVersion`: the version byte after the magic is not 1 or 2
    pub fn decode(blob: &[u8], nonce_len: usize) -> Result<Self> {
        if !blob.starts_with(&MAGIC) {
            let (nonce, tag, ciphertext) = split_body(blob, blob, nonce_len, "raw envelope")?;
            return Ok(Self::raw(nonce, tag, ciphertext));
        }

        ensure_remaining(blob, blob, PREAMBLE_LEN, "envelope header")?;
        let mut buf = &blob[MAGIC.len()..];
        let version = Version::from_byte(buf.get_u8())?;
        let flags = buf.get_u8();

        let (context, aad) = match version {
            Version::V2 => {
                let header_len = V2_LENGTHS_LEN.saturating_add(nonce_len).saturating_add(TAG_LEN);
                ensure_remaining(blob, buf, header_len, "v2 header")?;
                let context_len = usize::from(buf.get_u16());
                let aad_len = buf.get_u32() as usize;

                let declared = context_len
                    .checked_add(aad_len)
                    .and_then(|len| len.checked_add(nonce_len))
                    .and_then(|len| len.checked_add(TAG_LEN))
                    .unwrap_or(usize::MAX);
                ensure_remaining(blob, buf, declared, "v2 payload")?;

                let context = buf[..context_len].to_vec();
                buf.advance(context_len);
                let aad = buf[..aad_len].to_vec();
                buf.advance(aad_len);
                (Some(context), Some(aad))
            },
            Version::V1 | Version::Raw => (None, None),
        };

        let (nonce, tag, ciphertext) = split_body(blob, buf, nonce_len, "envelope body")?;
        Ok(Self { version, flags, context, aad, nonce, tag, ciphertext })
    }

    /// Choose the context and AAD to open this envelope with.
    ///
    /// An embedded context always wins over `external_context`. An embedded
    /// AAD is used unless the caller supplies a non-empty `external_aad`.
    /// To decrypt under a different context, call
    /// [`discard_embedded_context`](Self::discard_embedded_context) first.
    pub fn resolve<'a>(&'a self, external_context: &'a [u8], external_aad: &'a [u8]) -> Resolved<'a> {
        let (context, context_source) = match &self.context {
            Some(embedded) => (embedded.as_slice(), ParamSource::Embedded),
            None => (external_context, ParamSource::External),
        };

        let (aad, aad_source) = match &self.aad {
            Some(embedded) if external_aad.is_empty() => {
                (embedded.as_slice(), ParamSource::Embedded)
            },
            _ => (external_aad, ParamSource::External),
        };

        Resolved { context, aad, context_source, aad_source }
    }

    /// Explicitly drop the embedded context so [`resolve`](Self::resolve)
    /// falls back to the caller's.
    pub fn discard_embedded_context(&mut self) -> Option<Vec<u8>> {
        self.context.take()
    }

    fn embedded_context(&self) -> &[u8] {
        self.context.as_deref().unwrap_or_default()
    }

    fn embedded_aad(&self) -> &[u8] {
        self.aad.as_deref().unwrap_or_default()
    }
}

/// Fail with `MalformedContainer` unless `rest` holds at least `needed` bytes.
///
/// `expected`/`actual` are reported relative to the whole blob.
fn ensure_remaining(blob: &[u8], rest: &[u8], needed: usize, reason: &'static str) -> Result<()> {
    if rest.len() >= needed {
        return Ok(());
    }
    let consumed = blob.len() - rest.len();
    Err(BmscError::MalformedContainer {
        reason,
        expected: consumed.saturating_add(needed),
        actual: blob.len(),
    })
}

/// Split `nonce || tag || ciphertext`.
fn split_body(
    blob: &[u8],
    mut rest: &[u8],
    nonce_len: usize,
    reason: &'static str,
) -> Result<(Vec<u8>, Tag, Vec<u8>)> {
    ensure_remaining(blob, rest, nonce_len.saturating_add(TAG_LEN), reason)?;

    let nonce = rest[..nonce_len].to_vec();
    rest.advance(nonce_len);

    let mut tag = [0u8; TAG_LEN];
    rest.copy_to_slice(&mut tag);

    Ok((nonce, tag, rest.to_vec()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const NONCE_LEN: usize = 16;

    fn sample_v2() -> Envelope {
        Envelope::v2(
            b"ctx".to_vec(),
            b"aad".to_vec(),
            vec![0x11; NONCE_LEN],
            [0x22; TAG_LEN],
            vec![0x33, 0x33],
        )
    }

    #[test]
    fn v2_layout_is_byte_exact() {
        let bytes = sample_v2().to_bytes().unwrap();
        insta::assert_snapshot!(
            hex::encode(&bytes),
            @"424d53433600020000030000000363747861616411111111111111111111111111111111222222222222222222222222222222223333"
        );
    }

    #[test]
    fn v1_layout_is_byte_exact() {
        let envelope = Envelope::v1(vec![0x11; NONCE_LEN], [0x22; TAG_LEN], vec![0x33, 0x33]);
        let bytes = envelope.to_bytes().unwrap();
        insta::assert_snapshot!(
            hex::encode(&bytes),
            @"424d53433600010011111111111111111111111111111111222222222222222222222222222222223333"
        );
    }

    #[test]
    fn raw_layout_is_concatenation() {
        let envelope = Envelope::raw(vec![0x11; NONCE_LEN], [0x22; TAG_LEN], vec![0x33]);
        let bytes = envelope.to_bytes().unwrap();

        let mut expected = vec![0x11; NONCE_LEN];
        expected.extend_from_slice(&[0x22; TAG_LEN]);
        expected.push(0x33);
        assert_eq!(bytes, expected);
    }

    #[test]
    fn encoded_len_matches_output() {
        let mut envelope = sample_v2();
        envelope.flags = 0x80;
        for version in [Version::Raw, Version::V1, Version::V2] {
            envelope.version = version;
            assert_eq!(envelope.to_bytes().unwrap().len(), envelope.encoded_len());
        }
    }

    #[test]
    fn v2_roundtrip_preserves_fields() {
        let mut envelope = sample_v2();
        envelope.flags = 0x05;

        let decoded = Envelope::decode(&envelope.to_bytes().unwrap(), NONCE_LEN).unwrap();
        assert_eq!(decoded, envelope);
    }

    #[test]
    fn empty_ciphertext_roundtrip() {
        let envelope = Envelope::v1(vec![0x01; NONCE_LEN], [0x02; TAG_LEN], Vec::new());
        let decoded = Envelope::decode(&envelope.to_bytes().unwrap(), NONCE_LEN).unwrap();
        assert_eq!(decoded, envelope);
    }

    #[test]
    fn v1_ignores_context_and_aad_on_encode() {
        let mut envelope = sample_v2();
        envelope.version = Version::V1;

        let decoded = Envelope::decode(&envelope.to_bytes().unwrap(), NONCE_LEN).unwrap();
        assert_eq!(decoded.context, None);
        assert_eq!(decoded.aad, None);
        assert_eq!(decoded.ciphertext, envelope.ciphertext);
    }

    #[test]
    fn blob_without_magic_is_raw() {
        let blob = vec![0xAA; NONCE_LEN + TAG_LEN + 5];
        let decoded = Envelope::decode(&blob, NONCE_LEN).unwrap();

        assert_eq!(decoded.version, Version::Raw);
        assert_eq!(decoded.nonce, vec![0xAA; NONCE_LEN]);
        assert_eq!(decoded.ciphertext.len(), 5);
    }

    #[test]
    fn short_raw_blob_is_malformed() {
        let blob = vec![0xAA; NONCE_LEN + TAG_LEN - 1];
        assert_eq!(
            Envelope::decode(&blob, NONCE_LEN),
            Err(BmscError::MalformedContainer { reason: "raw envelope", expected: 32, actual: 31 })
        );
    }

    #[test]
    fn huge_nonce_len_is_malformed() {
        assert_eq!(
            Envelope::decode(&[0u8; 40], usize::MAX),
            Err(BmscError::MalformedContainer {
                reason: "raw envelope",
                expected: usize::MAX,
                actual: 40,
            })
        );

        let v1 = Envelope::v1(vec![0x11; NONCE_LEN], [0x22; TAG_LEN], vec![0x33]).to_bytes().unwrap();
        let v2 = sample_v2().to_bytes().unwrap();
        for (blob, reason) in [(v1, "envelope body"), (v2, "v2 header")] {
            for nonce_len in [usize::MAX, usize::MAX - TAG_LEN] {
                let result = Envelope::decode(&blob, nonce_len);
                assert!(
                    matches!(result, Err(BmscError::MalformedContainer { reason: r, .. }) if r == reason),
                    "nonce_len {nonce_len}: {result:?}"
                );
            }
        }
    }

    #[test]
    fn magic_without_version_is_malformed() {
        let blob = MAGIC.to_vec();
        assert_eq!(
            Envelope::decode(&blob, NONCE_LEN),
            Err(BmscError::MalformedContainer { reason: "envelope header", expected: 8, actual: 6 })
        );
    }

    #[test]
    fn unknown_version_is_rejected() {
        for byte in [0u8, 3, 0xFF] {
            let mut blob = MAGIC.to_vec();
            blob.extend_from_slice(&[byte, 0]);
            blob.extend_from_slice(&[0u8; 64]);
            assert_eq!(Envelope::decode(&blob, NONCE_LEN), Err(BmscError::UnsupportedVersion(byte)));
        }
    }

    #[test]
    fn truncated_v1_body_is_malformed() {
        let envelope = Envelope::v1(vec![0x11; NONCE_LEN], [0x22; TAG_LEN], Vec::new());
        let bytes = envelope.to_bytes().unwrap();

        let result = Envelope::decode(&bytes[..bytes.len() - 1], NONCE_LEN);
        assert_eq!(
            result,
            Err(BmscError::MalformedContainer { reason: "envelope body", expected: 40, actual: 39 })
        );
    }

    #[test]
    fn truncated_v2_lengths_are_malformed() {
        let bytes = sample_v2().to_bytes().unwrap();
        let result = Envelope::decode(&bytes[..PREAMBLE_LEN + 3], NONCE_LEN);
        assert!(matches!(
            result,
            Err(BmscError::MalformedContainer { reason: "v2 header", .. })
        ));
    }

    #[test]
    fn overlong_declared_aad_is_malformed() {
        let mut bytes = sample_v2().to_bytes().unwrap();
        // aad_len lives at offset 10..14
        bytes[10..14].copy_from_slice(&u32::MAX.to_be_bytes());

        let result = Envelope::decode(&bytes, NONCE_LEN);
        assert!(matches!(
            result,
            Err(BmscError::MalformedContainer { reason: "v2 payload", .. })
        ));
    }

    #[test]
    fn every_v2_truncation_fails_cleanly() {
        let bytes = sample_v2().to_bytes().unwrap();
        let minimum = bytes.len() - sample_v2().ciphertext.len();

        for cut in MAGIC.len()..minimum {
            let result = Envelope::decode(&bytes[..cut], NONCE_LEN);
            assert!(
                matches!(result, Err(BmscError::MalformedContainer { .. })),
                "cut at {cut} should be malformed, got {result:?}"
            );
        }
    }

    #[test]
    fn oversized_context_is_not_encoded() {
        let mut envelope = sample_v2();
        envelope.context = Some(vec![0u8; MAX_EMBEDDED_CONTEXT + 1]);

        let mut out = Vec::new();
        let result = envelope.encode(&mut out);

        assert_eq!(
            result,
            Err(BmscError::FieldTooLong { field: "context", len: 65_536, max: 65_535 })
        );
        assert!(out.is_empty(), "nothing may be written on failure");
    }

    #[test]
    fn resolve_prefers_embedded_context() {
        let envelope = sample_v2();
        let resolved = envelope.resolve(b"other-ctx", b"");

        assert_eq!(resolved.context, b"ctx");
        assert_eq!(resolved.context_source, ParamSource::Embedded);
        assert_eq!(resolved.aad, b"aad");
        assert_eq!(resolved.aad_source, ParamSource::Embedded);
    }

    #[test]
    fn resolve_lets_external_aad_override() {
        let envelope = sample_v2();
        let resolved = envelope.resolve(b"other-ctx", b"override");

        assert_eq!(resolved.context, b"ctx", "context is never overridden implicitly");
        assert_eq!(resolved.aad, b"override");
        assert_eq!(resolved.aad_source, ParamSource::External);
    }

    #[test]
    fn resolve_falls_back_without_embedded_values() {
        let envelope = Envelope::v1(vec![0; NONCE_LEN], [0; TAG_LEN], Vec::new());
        let resolved = envelope.resolve(b"ext-ctx", b"");

        assert_eq!(resolved.context, b"ext-ctx");
        assert_eq!(resolved.context_source, ParamSource::External);
        assert_eq!(resolved.aad, b"");
        assert_eq!(resolved.aad_source, ParamSource::External);
    }

    #[test]
    fn discarding_embedded_context_uses_external() {
        let mut envelope = sample_v2();
        assert_eq!(envelope.discard_embedded_context(), Some(b"ctx".to_vec()));

        let resolved = envelope.resolve(b"ext-ctx", b"");
        assert_eq!(resolved.context, b"ext-ctx");
        assert_eq!(resolved.aad, b"aad", "embedded aad is kept");
    }

    #[test]
    fn version_parsing() {
        assert_eq!("raw".parse::<Version>(), Ok(Version::Raw));
        assert_eq!("V1".parse::<Version>(), Ok(Version::V1));
        assert_eq!("2".parse::<Version>(), Ok(Version::V2));
        assert!("v3".parse::<Version>().is_err());
    }
}
