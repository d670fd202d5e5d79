//! Fixed bounds for key-value operations.
//!
//! Constants are fixed and immutable, enforced at validation time. Explicit
//! bounds prevent unbounded resource allocation in the backing store.

/// Maximum key size in bytes.
pub const MAX_KEY_SIZE: u32 = 1024;

/// Maximum value size in bytes (1 MiB).
pub const MAX_VALUE_SIZE: u32 = 1024 * 1024;
