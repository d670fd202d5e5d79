//! At-most-once execution guard.
//!
//! A guard key is claimed with the same atomic set-if-absent primitive the
//! lock manager uses, but the stored value is an opaque marker rather than a
//! holder token: release is unconditional, so no ownership verification is
//! needed. Existence of the key means "in flight or completed within the
//! window."

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;
use tracing::warn;

use larch_kv::KeyValueStore;
use larch_kv::WriteRequest;

use crate::constants::IDEMPOTENCY_KEY_PREFIX;
use crate::error::CoordinationError;
use crate::error::DuplicateRequestSnafu;

/// Marker value stored under the guard key. Opaque; never inspected.
const GUARD_MARKER: &str = "1";

/// What happens to the guard key after the guarded operation finishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReleasePolicy {
    /// Delete the key as soon as the operation has run, allowing immediate
    /// retries.
    ReleaseAfterExecution,
    /// Leave the key to expire at its TTL: no retry within the window is
    /// accepted, regardless of how quickly the first run finished.
    #[default]
    RetainForWindow,
}

/// At-most-once execution of a logical operation within a window.
///
/// State machine per key: ABSENT --acquire--> HELD --release-or-ttl-->
/// ABSENT. A concurrent acquire while HELD fails without mutating state.
pub struct IdempotencyGuard<S: KeyValueStore + ?Sized> {
    store: Arc<S>,
}

impl<S: KeyValueStore + ?Sized> IdempotencyGuard<S> {
    /// Create a new guard over the given store.
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    fn guard_key(key: &str) -> String {
        format!("{IDEMPOTENCY_KEY_PREFIX}{key}")
    }

    /// Try to claim `key` for `ttl`. Returns `false` when an identical
    /// request is in flight or completed within the window.
    ///
    /// Store unavailability propagates as an error: when the guard cannot be
    /// established, at-most-once cannot be guaranteed, so the caller must not
    /// run the operation (fail-closed).
    pub async fn acquire(&self, key: &str, ttl: Duration) -> Result<bool, CoordinationError> {
        let guard_key = Self::guard_key(key);
        let result = self
            .store
            .write(WriteRequest::set_if_absent(&guard_key, GUARD_MARKER, ttl))
            .await?;
        let acquired = result.applied.unwrap_or(false);
        debug!(key = %guard_key, acquired, ttl_ms = ttl.as_millis() as u64, "guard acquire");
        Ok(acquired)
    }

    /// Drop the guard key, re-admitting the logical operation immediately.
    pub async fn release(&self, key: &str) -> Result<bool, CoordinationError> {
        let guard_key = Self::guard_key(key);
        let result = self.store.write(WriteRequest::delete(&guard_key)).await?;
        Ok(result.applied.unwrap_or(false))
    }

    /// Run `operation` at most once per window for `key`.
    ///
    /// A failed acquire raises [`CoordinationError::DuplicateRequest`] and the
    /// operation does not run. After the operation finishes, whatever its
    /// own outcome, the guard key is deleted iff the policy is
    /// [`ReleasePolicy::ReleaseAfterExecution`]; under
    /// [`ReleasePolicy::RetainForWindow`] it expires naturally at `ttl`.
    pub async fn execute_once<F, T>(
        &self,
        key: &str,
        ttl: Duration,
        policy: ReleasePolicy,
        operation: F,
    ) -> Result<T, CoordinationError>
    where
        F: Future<Output = T>,
    {
        if !self.acquire(key, ttl).await? {
            return DuplicateRequestSnafu {
                key: Self::guard_key(key),
            }
            .fail();
        }

        let result = operation.await;

        if policy == ReleasePolicy::ReleaseAfterExecution {
            if let Err(e) = self.release(key).await {
                // Best-effort: the key expires at ttl anyway
                warn!(key, error = %e, "guard release failed");
            }
        }

        Ok(result)
    }
}
