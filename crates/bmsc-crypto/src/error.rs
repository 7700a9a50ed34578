//! Error types for BMSC operations

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, BmscError>;

/// Errors from key derivation, sealing, opening, and envelope parsing.
///
/// Every variant is terminal for the operation that raised it. Nothing is
/// retried internally and no operation partially succeeds.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BmscError {
    /// Master key is not exactly 32 bytes
    #[error("invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength {
        /// Required key length
        expected: usize,
        /// Supplied key length
        actual: usize,
    },

    /// Nonce does not match the backend's fixed nonce size
    #[error("invalid nonce length: expected {expected}, got {actual}")]
    InvalidNonceLength {
        /// Nonce length of the selected backend
        expected: usize,
        /// Supplied nonce length
        actual: usize,
    },

    /// Requested HKDF output exceeds 255 hash blocks
    #[error("invalid hkdf output length: requested {requested}, max {max}")]
    InvalidLength {
        /// Requested output length
        requested: usize,
        /// HKDF-SHA256 ceiling (255 * 32)
        max: usize,
    },

    /// Tag verification failed.
    ///
    /// Wrong key, wrong context or AAD, and corrupted bytes all collapse into
    /// this single outcome.
    #[error("authentication failed")]
    AuthenticationFailure,

    /// Envelope is truncated or its declared lengths overrun the blob
    #[error("malformed container: {reason} (need {expected} bytes, have {actual})")]
    MalformedContainer {
        /// Which part of the envelope was short
        reason: &'static str,
        /// Bytes required to continue parsing
        expected: usize,
        /// Bytes actually available
        actual: usize,
    },

    /// Envelope version byte is not recognized
    #[error("unsupported envelope version: {0}")]
    UnsupportedVersion(u8),

    /// A length does not fit its fixed-width length prefix
    #[error("{field} too long: {len} bytes exceeds {max}")]
    FieldTooLong {
        /// Name of the oversized field
        field: &'static str,
        /// Actual length
        len: usize,
        /// Largest encodable length
        max: usize,
    },
}

impl BmscError {
    /// Returns true if this error came from tag verification.
    ///
    /// Callers typically turn this into a "check key/context/AAD" message
    /// rather than treating it as an input-format problem.
    pub fn is_authentication_failure(&self) -> bool {
        matches!(self, Self::AuthenticationFailure)
    }

    /// Returns true if the envelope itself could not be parsed.
    pub fn is_container_error(&self) -> bool {
        matches!(self, Self::MalformedContainer { .. } | Self::UnsupportedVersion(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authentication_failure_is_classified() {
        assert!(BmscError::AuthenticationFailure.is_authentication_failure());
        assert!(!BmscError::AuthenticationFailure.is_container_error());
    }

    #[test]
    fn container_errors_are_classified() {
        let err = BmscError::MalformedContainer { reason: "header", expected: 8, actual: 3 };
        assert!(err.is_container_error());
        assert!(BmscError::UnsupportedVersion(7).is_container_error());
        assert!(!BmscError::InvalidKeyLength { expected: 32, actual: 16 }.is_container_error());
    }

    #[test]
    fn error_display() {
        let err = BmscError::InvalidKeyLength { expected: 32, actual: 41 };
        assert_eq!(err.to_string(), "invalid key length: expected 32, got 41");

        let err = BmscError::MalformedContainer { reason: "v2 payload", expected: 60, actual: 12 };
        assert_eq!(err.to_string(), "malformed container: v2 payload (need 60 bytes, have 12)");

        let err = BmscError::FieldTooLong { field: "context", len: 70_000, max: 65_535 };
        assert_eq!(err.to_string(), "context too long: 70000 bytes exceeds 65535");
    }

    #[test]
    fn authentication_failure_display_carries_no_detail() {
        assert_eq!(BmscError::AuthenticationFailure.to_string(), "authentication failed");
    }
}
