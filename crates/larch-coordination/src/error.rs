//! Error types for coordination primitives.

use larch_kv::KeyValueStoreError;
use snafu::Snafu;

/// Errors from coordination primitives.
///
/// Store unavailability is intercepted inside each primitive and converted to
/// its documented fail-open/fail-closed behavior; `Store` carries the
/// remaining storage failures (validation, corrupted counters) that do
/// propagate to the caller.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum CoordinationError {
    /// Lock could not be acquired within the configured attempts.
    #[snafu(display("lock '{key}' not acquired after {attempts} attempts"))]
    LockNotAcquired {
        /// The lock key.
        key: String,
        /// Attempts made, including the initial one.
        attempts: u32,
    },

    /// Release presented a token that no longer owns the lock.
    ///
    /// Logged rather than raised on the release path: an expired-and-
    /// reassigned lock is an expected operational outcome, not caller error.
    #[snafu(display("lock '{key}' not owned by the presented token"))]
    LockNotOwned {
        /// The lock key.
        key: String,
    },

    /// An operation with the same derived key is in flight or already
    /// completed within its window.
    #[snafu(display("duplicate request for key '{key}'"))]
    DuplicateRequest {
        /// The guard key that was already held.
        key: String,
    },

    /// A key-generation strategy could not derive a key.
    ///
    /// Fails closed: the guarded operation does not run. This is a
    /// configuration error, never silently ignored.
    #[snafu(display("key generation failed: {reason}"))]
    KeyGenerationFailed {
        /// What was missing or malformed.
        reason: String,
    },

    /// Call frequency exceeded a configured window cap.
    #[snafu(display("rate limit exceeded for '{key}'"))]
    RateLimitExceeded {
        /// The limited subject key.
        key: String,
    },

    /// Underlying storage error.
    #[snafu(display("storage error: {source}"))]
    Store {
        /// The underlying error.
        source: KeyValueStoreError,
    },
}

impl From<KeyValueStoreError> for CoordinationError {
    fn from(source: KeyValueStoreError) -> Self {
        CoordinationError::Store { source }
    }
}
