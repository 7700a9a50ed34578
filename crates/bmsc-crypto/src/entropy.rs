//! Randomness as an injected capability.
//!
//! Nonces are the only random values the core needs. Drawing them through a
//! trait keeps the production path on the OS CSPRNG while letting tests pin
//! a deterministic source to reproduce fixed vectors.

/// Source of nonce bytes.
///
/// # Invariants
///
/// - Production implementations MUST use cryptographically secure entropy
/// - A nonce must never repeat under the same key and context
pub trait Entropy: Send + Sync {
    /// Fills the provided buffer with random bytes.
    fn random_bytes(&self, buffer: &mut [u8]);
}

impl<E: Entropy + ?Sized> Entropy for &E {
    fn random_bytes(&self, buffer: &mut [u8]) {
        (**self).random_bytes(buffer);
    }
}

/// OS-backed entropy via getrandom (e.g. `getrandom(2)` on Linux,
/// `BCryptGenRandom` on Windows).
///
/// # Panics
///
/// Panics if the OS RNG fails. Encrypting without working randomness would
/// risk nonce reuse, which breaks both confidentiality and the tag binding.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEntropy;

impl SystemEntropy {
    /// Create a handle to the OS RNG.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Entropy for SystemEntropy {
    #[allow(clippy::expect_used)]
    fn random_bytes(&self, buffer: &mut [u8]) {
        getrandom::fill(buffer)
            .expect("invariant: OS RNG failure is unrecoverable - nonces cannot be generated");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_entropy_random_bytes_are_random() {
        let entropy = SystemEntropy::new();

        let mut bytes1 = [0u8; 32];
        let mut bytes2 = [0u8; 32];

        entropy.random_bytes(&mut bytes1);
        entropy.random_bytes(&mut bytes2);

        assert_ne!(bytes1, bytes2, "random bytes should differ");
    }

    #[test]
    fn system_entropy_fills_buffer() {
        let entropy = SystemEntropy::new();

        let mut bytes = [0u8; 64];
        entropy.random_bytes(&mut bytes);

        let non_zero_count = bytes.iter().filter(|&&b| b != 0).count();
        assert!(non_zero_count > 32, "most bytes should be non-zero");
    }

    #[test]
    fn reference_forwards_to_inner_source() {
        struct Fixed;
        impl Entropy for Fixed {
            fn random_bytes(&self, buffer: &mut [u8]) {
                buffer.fill(0x42);
            }
        }

        fn draw<E: Entropy>(entropy: E, buffer: &mut [u8]) {
            entropy.random_bytes(buffer);
        }

        let source = Fixed;
        let mut bytes = [0u8; 8];
        draw(&source, &mut bytes);

        assert_eq!(bytes, [0x42; 8]);
    }
}
