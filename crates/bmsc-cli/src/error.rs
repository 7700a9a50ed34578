//! CLI error types and exit codes.

use std::{io, path::PathBuf};

use bmsc_crypto::BmscError;
use thiserror::Error;

/// Result alias for CLI operations.
pub type Result<T> = std::result::Result<T, CliError>;

/// Exit status for a successful run
pub const EXIT_OK: u8 = 0;

/// Exit status when authentication fails
pub const EXIT_AUTH: u8 = 1;

/// Exit status for unusable input
pub const EXIT_INPUT: u8 = 2;

/// Errors surfaced to the user.
#[derive(Debug, Error)]
pub enum CliError {
    /// Core rejected the operation
    #[error(transparent)]
    Crypto(#[from] BmscError),

    /// `--key-hex` is not valid hex
    #[error("invalid --key-hex: {0}")]
    KeyHex(#[from] hex::FromHexError),

    /// A Base64 field could not be decoded
    #[error("invalid base64 in {field}: {source}")]
    Base64 {
        /// Which field
        field: &'static str,
        /// Decoder error
        source: base64::DecodeError,
    },

    /// Input file could not be read
    #[error("cannot read {}: {source}", path.display())]
    Read {
        /// File path
        path: PathBuf,
        /// Underlying I/O error
        source: io::Error,
    },

    /// Output file could not be written
    #[error("cannot write {}: {source}", path.display())]
    Write {
        /// File path
        path: PathBuf,
        /// Underlying I/O error
        source: io::Error,
    },

    /// Writing to stdout failed
    #[error("output error: {0}")]
    Output(#[from] io::Error),

    /// A self-test check did not hold
    #[error("selftest failed: {0}")]
    Selftest(&'static str),
}

impl CliError {
    /// Process exit status for this error.
    ///
    /// Authentication failures (and failed self-tests) exit with 1, every
    /// input or I/O problem with 2.
    pub fn exit_code(&self) -> u8 {
        let auth = matches!(self, Self::Selftest(_))
            || matches!(self, Self::Crypto(err) if err.is_authentication_failure());
        if auth { EXIT_AUTH } else { EXIT_INPUT }
    }

    /// One-line hint printed after the error message, if any.
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::Crypto(err) if err.is_authentication_failure() => {
                Some("check key, context (--iv), AAD, nonce and tag")
            },
            Self::Crypto(BmscError::InvalidKeyLength { .. }) => {
                Some("keys are exactly 32 bytes (64 hex characters)")
            },
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authentication_failure_exits_with_one() {
        let err = CliError::from(BmscError::AuthenticationFailure);
        assert_eq!(err.exit_code(), EXIT_AUTH);
        assert!(err.hint().is_some());
    }

    #[test]
    fn container_errors_exit_with_two() {
        let err = CliError::from(BmscError::UnsupportedVersion(9));
        assert_eq!(err.exit_code(), EXIT_INPUT);
        assert_eq!(err.to_string(), "unsupported envelope version: 9");
    }

    #[test]
    fn bad_key_length_has_a_hint() {
        let err = CliError::from(BmscError::InvalidKeyLength { expected: 32, actual: 16 });
        assert_eq!(err.exit_code(), EXIT_INPUT);
        assert_eq!(err.hint(), Some("keys are exactly 32 bytes (64 hex characters)"));
    }
}
