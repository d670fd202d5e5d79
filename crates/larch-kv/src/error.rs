//! Error types for key-value store operations.

use thiserror::Error;

/// Errors from key-value store operations.
///
/// `Unavailable` is the failure-mode signal the coordination layer converts
/// into its documented fail-open/fail-closed behavior; the remaining variants
/// are caller errors surfaced by validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyValueStoreError {
    /// Store could not be reached (network partition, backend outage).
    #[error("store unavailable: {reason}")]
    Unavailable {
        /// Description of the backend failure.
        reason: String,
    },

    /// Key was empty.
    #[error("key cannot be empty")]
    EmptyKey,

    /// Key exceeds the fixed size bound.
    #[error("key size {size} exceeds maximum of {max} bytes")]
    KeyTooLarge { size: u32, max: u32 },

    /// Value exceeds the fixed size bound.
    #[error("value size {size} exceeds maximum of {max} bytes")]
    ValueTooLarge { size: u32, max: u32 },

    /// A TTL-bearing command carried a zero TTL.
    #[error("ttl must be positive for key '{key}'")]
    InvalidTtl {
        /// Key the command targeted.
        key: String,
    },

    /// Increment hit a value that is not an integer.
    #[error("value at '{key}' is not an integer counter")]
    NotCounter {
        /// Key holding the non-integer value.
        key: String,
    },
}

impl KeyValueStoreError {
    /// Build an `Unavailable` error from any failure description.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable { reason: reason.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unavailable_display() {
        let err = KeyValueStoreError::unavailable("connection refused");
        assert_eq!(err.to_string(), "store unavailable: connection refused");
    }

    #[test]
    fn key_too_large_display() {
        let err = KeyValueStoreError::KeyTooLarge { size: 2048, max: 1024 };
        assert_eq!(err.to_string(), "key size 2048 exceeds maximum of 1024 bytes");
    }

    #[test]
    fn not_counter_display() {
        let err = KeyValueStoreError::NotCounter { key: "rate:x:60".into() };
        assert_eq!(err.to_string(), "value at 'rate:x:60' is not an integer counter");
    }

    #[test]
    fn clone_and_equality() {
        let err = KeyValueStoreError::InvalidTtl { key: "k".into() };
        assert_eq!(err, err.clone());
        assert_ne!(err, KeyValueStoreError::EmptyKey);
    }
}
