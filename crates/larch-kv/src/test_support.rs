//! Test support fixtures for failure-policy tests.
//!
//! Minimal wrappers used by this workspace's own tests; production code
//! reaches the store through [`KeyValueStore`] implementations.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

use async_trait::async_trait;

use crate::error::KeyValueStoreError;
use crate::kv::ReadRequest;
use crate::kv::ReadResult;
use crate::kv::TtlRequest;
use crate::kv::TtlResult;
use crate::kv::WriteRequest;
use crate::kv::WriteResult;
use crate::traits::KeyValueStore;

/// Store wrapper that can simulate an outage.
///
/// While marked unavailable, every operation fails with
/// [`KeyValueStoreError::Unavailable`]; otherwise calls pass through to the
/// wrapped store. Used to exercise the fail-open/fail-closed policies of the
/// coordination primitives.
pub struct UnavailableKeyValueStore<S: KeyValueStore> {
    inner: Arc<S>,
    available: AtomicBool,
}

impl<S: KeyValueStore> UnavailableKeyValueStore<S> {
    /// Wrap a store, initially available.
    pub fn new(inner: Arc<S>) -> Arc<Self> {
        Arc::new(Self {
            inner,
            available: AtomicBool::new(true),
        })
    }

    /// Flip the simulated outage on or off.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), KeyValueStoreError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(KeyValueStoreError::unavailable("injected outage"))
        }
    }
}

#[async_trait]
impl<S: KeyValueStore> KeyValueStore for UnavailableKeyValueStore<S> {
    async fn write(&self, request: WriteRequest) -> Result<WriteResult, KeyValueStoreError> {
        self.check()?;
        self.inner.write(request).await
    }

    async fn read(&self, request: ReadRequest) -> Result<ReadResult, KeyValueStoreError> {
        self.check()?;
        self.inner.read(request).await
    }

    async fn ttl(&self, request: TtlRequest) -> Result<TtlResult, KeyValueStoreError> {
        self.check()?;
        self.inner.ttl(request).await
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::memory::MemoryKeyValueStore;

    #[tokio::test]
    async fn outage_fails_every_operation() {
        let store = UnavailableKeyValueStore::new(MemoryKeyValueStore::new());
        store.set_available(false);

        let result = store
            .write(WriteRequest::set_if_absent("k", "v", Duration::from_secs(1)))
            .await;
        assert!(matches!(result, Err(KeyValueStoreError::Unavailable { .. })));

        let result = store.read(ReadRequest::new("k")).await;
        assert!(matches!(result, Err(KeyValueStoreError::Unavailable { .. })));

        store.set_available(true);
        assert!(store.read(ReadRequest::new("k")).await.is_ok());
    }
}
