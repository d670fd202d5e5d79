//! Store trait consumed by the coordination primitives.

use async_trait::async_trait;

use crate::error::KeyValueStoreError;
use crate::kv::ReadRequest;
use crate::kv::ReadResult;
use crate::kv::TtlRequest;
use crate::kv::TtlResult;
use crate::kv::WriteRequest;
use crate::kv::WriteResult;

/// Shared key-value store with per-key atomicity and expiry.
///
/// Every operation is a network round trip and may suspend the calling
/// execution context. Implementations must apply each [`WriteRequest`]
/// atomically for its single key.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Apply a single-key write command.
    async fn write(&self, request: WriteRequest) -> Result<WriteResult, KeyValueStoreError>;

    /// Read a value by key; expired keys read as absent.
    async fn read(&self, request: ReadRequest) -> Result<ReadResult, KeyValueStoreError>;

    /// Query the remaining lifetime of a key.
    async fn ttl(&self, request: TtlRequest) -> Result<TtlResult, KeyValueStoreError>;
}

// Blanket implementation for Arc<T>
#[async_trait]
impl<T: KeyValueStore + ?Sized> KeyValueStore for std::sync::Arc<T> {
    async fn write(&self, request: WriteRequest) -> Result<WriteResult, KeyValueStoreError> {
        (**self).write(request).await
    }

    async fn read(&self, request: ReadRequest) -> Result<ReadResult, KeyValueStoreError> {
        (**self).read(request).await
    }

    async fn ttl(&self, request: TtlRequest) -> Result<TtlResult, KeyValueStoreError> {
        (**self).ttl(request).await
    }
}
