//! Key-value operation types.
//!
//! Wire-level types for the single-key atomic operations the coordination
//! primitives consume.

use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

use crate::constants::MAX_KEY_SIZE;
use crate::constants::MAX_VALUE_SIZE;
use crate::error::KeyValueStoreError;

/// Commands for modifying key-value state.
///
/// Each command must be applied by the store as one indivisible unit for its
/// key; the coordination layer never issues a separate read followed by a
/// separate write where a race would be possible.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum WriteCommand {
    /// Create a key with a TTL only if it is currently absent.
    SetIfAbsent {
        key: String,
        value: String,
        ttl_ms: u64,
    },
    /// Delete a single key unconditionally.
    Delete { key: String },
    /// Delete a key only if its current value matches `expected`.
    ///
    /// This is the release script of the lock manager: stores without a
    /// native compare-and-delete run it as a short atomic script.
    CompareAndDelete { key: String, expected: String },
    /// Add `delta` to an integer value, initializing absent keys at 0.
    ///
    /// Returns the post-increment value. A freshly initialized counter
    /// carries no expiry until an `Expire` command sets one.
    Increment { key: String, delta: i64 },
    /// Set or overwrite the TTL of an existing key.
    Expire { key: String, ttl_ms: u64 },
}

/// Request to perform a write operation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WriteRequest {
    pub command: WriteCommand,
}

impl WriteRequest {
    /// Create a SetIfAbsent command.
    pub fn set_if_absent(key: impl Into<String>, value: impl Into<String>, ttl: Duration) -> Self {
        Self {
            command: WriteCommand::SetIfAbsent {
                key: key.into(),
                value: value.into(),
                ttl_ms: ttl.as_millis() as u64,
            },
        }
    }

    /// Create a Delete command.
    pub fn delete(key: impl Into<String>) -> Self {
        Self {
            command: WriteCommand::Delete { key: key.into() },
        }
    }

    /// Create a CompareAndDelete command.
    pub fn compare_and_delete(key: impl Into<String>, expected: impl Into<String>) -> Self {
        Self {
            command: WriteCommand::CompareAndDelete {
                key: key.into(),
                expected: expected.into(),
            },
        }
    }

    /// Create an Increment command.
    pub fn increment(key: impl Into<String>, delta: i64) -> Self {
        Self {
            command: WriteCommand::Increment {
                key: key.into(),
                delta,
            },
        }
    }

    /// Create an Expire command.
    pub fn expire(key: impl Into<String>, ttl: Duration) -> Self {
        Self {
            command: WriteCommand::Expire {
                key: key.into(),
                ttl_ms: ttl.as_millis() as u64,
            },
        }
    }
}

/// Result of a write operation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct WriteResult {
    /// Whether a conditional command took effect (`SetIfAbsent` created the
    /// key, `CompareAndDelete` matched and deleted, `Delete`/`Expire` found
    /// a live key).
    pub applied: Option<bool>,
    /// Post-increment value for `Increment`.
    pub new_value: Option<i64>,
}

/// Request to read a single key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReadRequest {
    pub key: String,
}

impl ReadRequest {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }
}

/// A key with its stored value.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct KeyValue {
    pub key: String,
    pub value: String,
}

/// Response from a read operation. `kv` is `None` for absent or expired keys.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReadResult {
    pub kv: Option<KeyValue>,
}

/// Request for the remaining lifetime of a key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TtlRequest {
    pub key: String,
}

impl TtlRequest {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }
}

/// Remaining lifetime of a key.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum KeyTtl {
    /// Key exists and expires after this many milliseconds.
    Remaining { ms: u64 },
    /// Key exists with no expiry set.
    NoExpiry,
    /// Key does not exist or has already expired.
    Missing,
}

impl KeyTtl {
    /// Integer form matching the usual store convention: remaining whole
    /// seconds (rounded up), -1 for no expiry, -2 for a missing key.
    pub fn as_seconds(&self) -> i64 {
        match self {
            KeyTtl::Remaining { ms } => ms.div_ceil(1000) as i64,
            KeyTtl::NoExpiry => -1,
            KeyTtl::Missing => -2,
        }
    }
}

/// Response from a TTL query.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TtlResult {
    pub ttl: KeyTtl,
}

/// Validate a write command against fixed size limits.
pub fn validate_write_command(command: &WriteCommand) -> Result<(), KeyValueStoreError> {
    let check_key = |key: &str| {
        if key.is_empty() {
            return Err(KeyValueStoreError::EmptyKey);
        }
        let len = key.len();
        if len > MAX_KEY_SIZE as usize {
            Err(KeyValueStoreError::KeyTooLarge {
                size: len as u32,
                max: MAX_KEY_SIZE,
            })
        } else {
            Ok(())
        }
    };

    let check_value = |value: &str| {
        let len = value.len();
        if len > MAX_VALUE_SIZE as usize {
            Err(KeyValueStoreError::ValueTooLarge {
                size: len as u32,
                max: MAX_VALUE_SIZE,
            })
        } else {
            Ok(())
        }
    };

    let check_ttl = |key: &str, ttl_ms: u64| {
        if ttl_ms == 0 {
            Err(KeyValueStoreError::InvalidTtl { key: key.to_string() })
        } else {
            Ok(())
        }
    };

    match command {
        WriteCommand::SetIfAbsent { key, value, ttl_ms } => {
            check_key(key)?;
            check_value(value)?;
            check_ttl(key, *ttl_ms)?;
        }
        WriteCommand::Delete { key } => {
            check_key(key)?;
        }
        WriteCommand::CompareAndDelete { key, expected } => {
            check_key(key)?;
            check_value(expected)?;
        }
        WriteCommand::Increment { key, .. } => {
            check_key(key)?;
        }
        WriteCommand::Expire { key, ttl_ms } => {
            check_key(key)?;
            check_ttl(key, *ttl_ms)?;
        }
    }

    Ok(())
}
