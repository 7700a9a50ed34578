//! Fuzz target for Envelope::decode
//!
//! Feeds arbitrary bytes to the decoder under both backend nonce lengths to
//! find:
//! - Parser crashes or panics
//! - Integer overflows in declared-length arithmetic
//! - Buffer over-reads on truncated headers
//!
//! The decoder should NEVER panic. Anything that decodes must re-encode to
//! the exact input bytes.

#![no_main]

use bmsc_crypto::{Backend, BmscError, Envelope};
use bytes::BytesMut;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    for backend in Backend::ALL {
        match Envelope::decode(data, backend.nonce_len()) {
            Ok(envelope) => {
                let mut encoded = BytesMut::with_capacity(envelope.encoded_len());
                envelope.encode(&mut encoded).expect("decoded envelope must re-encode");
                assert_eq!(&encoded[..], data, "decode/encode must be lossless");
            },
            Err(BmscError::MalformedContainer { expected, actual, .. }) => {
                assert_eq!(actual, data.len());
                assert!(expected > actual, "malformed must report a shortfall");
            },
            Err(BmscError::UnsupportedVersion(v)) => {
                assert!(v != 1 && v != 2);
            },
            Err(err) => panic!("unexpected decode error: {err:?}"),
        }
    }
});
