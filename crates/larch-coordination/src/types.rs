//! Shared types for coordination primitives.

use rand::RngCore;

/// Unique token identifying a lock holder.
///
/// A fresh token is generated for every acquisition attempt; ownership of a
/// lock is proven by presenting the exact token stored at acquire time, so
/// release can never remove a lock re-acquired by a different holder.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HolderToken(String);

impl HolderToken {
    /// Generate a fresh random 128-bit token, hex-encoded.
    pub fn generate() -> Self {
        let mut bytes = [0u8; 16];
        rand::rng().fill_bytes(&mut bytes);
        Self(hex::encode(bytes))
    }

    /// The token's stored string form.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for HolderToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_are_unique() {
        let a = HolderToken::generate();
        let b = HolderToken::generate();
        assert_ne!(a, b);
    }

    #[test]
    fn token_is_hex_of_128_bits() {
        let token = HolderToken::generate();
        assert_eq!(token.as_str().len(), 32);
        assert!(token.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }
}
