//! In-memory implementation of [`KeyValueStore`] with real TTL semantics.
//!
//! Deterministic and non-persistent, for unit tests and embedding. Expiry is
//! evaluated lazily: an expired entry is treated as absent by every operation
//! that touches it, which matches how the coordination primitives observe a
//! networked store.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::KeyValueStoreError;
use crate::kv::KeyTtl;
use crate::kv::KeyValue;
use crate::kv::ReadRequest;
use crate::kv::ReadResult;
use crate::kv::TtlRequest;
use crate::kv::TtlResult;
use crate::kv::WriteCommand;
use crate::kv::WriteRequest;
use crate::kv::WriteResult;
use crate::kv::validate_write_command;
use crate::traits::KeyValueStore;

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[derive(Debug, Clone)]
struct StoredValue {
    value: String,
    /// Unix-ms deadline; `None` means no expiry.
    expires_at_ms: Option<u64>,
}

impl StoredValue {
    fn is_expired(&self, now: u64) -> bool {
        matches!(self.expires_at_ms, Some(deadline) if now >= deadline)
    }
}

/// Deterministic in-memory key-value store.
#[derive(Default)]
pub struct MemoryKeyValueStore {
    inner: Mutex<HashMap<String, StoredValue>>,
}

impl MemoryKeyValueStore {
    /// Create a new empty store wrapped in Arc.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

/// Look up a live entry, dropping it if expired.
fn live_entry<'a>(
    data: &'a mut HashMap<String, StoredValue>,
    key: &str,
    now: u64,
) -> Option<&'a StoredValue> {
    if data.get(key).is_some_and(|entry| entry.is_expired(now)) {
        data.remove(key);
    }
    data.get(key)
}

#[async_trait]
impl KeyValueStore for MemoryKeyValueStore {
    async fn write(&self, request: WriteRequest) -> Result<WriteResult, KeyValueStoreError> {
        validate_write_command(&request.command)?;

        let now = now_ms();
        let mut data = self.inner.lock().await;
        match request.command {
            WriteCommand::SetIfAbsent { key, value, ttl_ms } => {
                if live_entry(&mut data, &key, now).is_some() {
                    Ok(WriteResult {
                        applied: Some(false),
                        ..Default::default()
                    })
                } else {
                    data.insert(key, StoredValue {
                        value,
                        expires_at_ms: Some(now.saturating_add(ttl_ms)),
                    });
                    Ok(WriteResult {
                        applied: Some(true),
                        ..Default::default()
                    })
                }
            }
            WriteCommand::Delete { key } => {
                let was_live = live_entry(&mut data, &key, now).is_some();
                data.remove(&key);
                Ok(WriteResult {
                    applied: Some(was_live),
                    ..Default::default()
                })
            }
            WriteCommand::CompareAndDelete { key, expected } => {
                let matches = live_entry(&mut data, &key, now).is_some_and(|e| e.value == expected);
                if matches {
                    data.remove(&key);
                }
                Ok(WriteResult {
                    applied: Some(matches),
                    ..Default::default()
                })
            }
            WriteCommand::Increment { key, delta } => {
                let (current, expires_at_ms) = match live_entry(&mut data, &key, now) {
                    Some(entry) => {
                        let parsed = entry.value.parse::<i64>().map_err(|_| {
                            KeyValueStoreError::NotCounter { key: key.clone() }
                        })?;
                        (parsed, entry.expires_at_ms)
                    }
                    None => (0, None),
                };
                let new_value = current.saturating_add(delta);
                data.insert(key, StoredValue {
                    value: new_value.to_string(),
                    expires_at_ms,
                });
                Ok(WriteResult {
                    new_value: Some(new_value),
                    ..Default::default()
                })
            }
            WriteCommand::Expire { key, ttl_ms } => {
                let applied = match live_entry(&mut data, &key, now) {
                    Some(_) => {
                        if let Some(entry) = data.get_mut(&key) {
                            entry.expires_at_ms = Some(now.saturating_add(ttl_ms));
                        }
                        true
                    }
                    None => false,
                };
                Ok(WriteResult {
                    applied: Some(applied),
                    ..Default::default()
                })
            }
        }
    }

    async fn read(&self, request: ReadRequest) -> Result<ReadResult, KeyValueStoreError> {
        let now = now_ms();
        let mut data = self.inner.lock().await;
        let kv = live_entry(&mut data, &request.key, now).map(|entry| KeyValue {
            key: request.key.clone(),
            value: entry.value.clone(),
        });
        Ok(ReadResult { kv })
    }

    async fn ttl(&self, request: TtlRequest) -> Result<TtlResult, KeyValueStoreError> {
        let now = now_ms();
        let mut data = self.inner.lock().await;
        let ttl = match live_entry(&mut data, &request.key, now) {
            Some(entry) => match entry.expires_at_ms {
                Some(deadline) => KeyTtl::Remaining {
                    ms: deadline.saturating_sub(now),
                },
                None => KeyTtl::NoExpiry,
            },
            None => KeyTtl::Missing,
        };
        Ok(TtlResult { ttl })
    }
}
