//! Distributed mutual-exclusion lock.
//!
//! Ownership is a fresh random holder token stored with a single atomic
//! set-if-absent; release is a single compare-and-delete, so a lock that
//! expired and was re-acquired by another holder can never be removed by the
//! stale token. TTL expiry is the crash-recovery net: an unreleased lock
//! frees itself when its TTL elapses.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;
use tracing::warn;

use larch_kv::KeyTtl;
use larch_kv::KeyValueStore;
use larch_kv::KeyValueStoreError;
use larch_kv::ReadRequest;
use larch_kv::TtlRequest;
use larch_kv::WriteRequest;

use crate::constants::DEFAULT_LOCK_TTL_MS;
use crate::constants::DEFAULT_MAX_RETRIES;
use crate::constants::DEFAULT_RETRY_DELAY_MS;
use crate::constants::LOCK_KEY_PREFIX;
use crate::error::CoordinationError;
use crate::error::LockNotAcquiredSnafu;
use crate::types::HolderToken;

/// Configuration for the lock manager.
#[derive(Debug, Clone)]
pub struct LockConfig {
    /// Time-to-live applied to acquired locks.
    pub ttl: Duration,
    /// Retries after the initial attempt in [`LockManager::acquire`].
    pub max_retries: u32,
    /// Delay between retry attempts.
    pub retry_delay: Duration,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_millis(DEFAULT_LOCK_TTL_MS),
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: Duration::from_millis(DEFAULT_RETRY_DELAY_MS),
        }
    }
}

/// Mutual exclusion on logical resources across processes.
///
/// A stateless wrapper over the store: all mutation of a lock key goes
/// through exactly one atomic store command, and no process-local locking is
/// added. There is no fairness or ordering guarantee among competitors.
pub struct LockManager<S: KeyValueStore + ?Sized> {
    store: Arc<S>,
    config: LockConfig,
}

impl<S: KeyValueStore + ?Sized> LockManager<S> {
    /// Create a new lock manager over the given store.
    pub fn new(store: Arc<S>, config: LockConfig) -> Self {
        Self { store, config }
    }

    fn lock_key(resource: &str) -> String {
        format!("{LOCK_KEY_PREFIX}{resource}")
    }

    /// Try to acquire the lock without blocking.
    ///
    /// Generates a fresh holder token and stores it with a single atomic
    /// set-if-absent. Returns `None` when the lock is held. Store
    /// unavailability counts as "not acquired" (fail-closed): a lock that
    /// cannot be confirmed must not be treated as held.
    pub async fn try_acquire(
        &self,
        resource: &str,
        ttl: Duration,
    ) -> Result<Option<HolderToken>, CoordinationError> {
        let key = Self::lock_key(resource);
        let token = HolderToken::generate();

        match self
            .store
            .write(WriteRequest::set_if_absent(&key, token.as_str(), ttl))
            .await
        {
            Ok(result) => {
                if result.applied.unwrap_or(false) {
                    debug!(key = %key, token = %token, ttl_ms = ttl.as_millis() as u64, "lock acquired");
                    Ok(Some(token))
                } else {
                    debug!(key = %key, "lock held by another token");
                    Ok(None)
                }
            }
            Err(KeyValueStoreError::Unavailable { reason }) => {
                warn!(key = %key, %reason, "store unavailable during acquire; treating as not acquired");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Poll [`Self::try_acquire`] until success or attempts run out.
    ///
    /// Makes `max_retries + 1` attempts with a sleep between them. Each
    /// attempt is one atomic round trip, so cancelling this future between
    /// attempts aborts the loop without leaving partial state.
    pub async fn try_acquire_with_retry(
        &self,
        resource: &str,
        ttl: Duration,
        max_retries: u32,
        retry_delay: Duration,
    ) -> Result<Option<HolderToken>, CoordinationError> {
        for attempt in 0..=max_retries {
            if let Some(token) = self.try_acquire(resource, ttl).await? {
                return Ok(Some(token));
            }
            if attempt < max_retries {
                debug!(
                    resource,
                    attempt = attempt + 1,
                    retry_delay_ms = retry_delay.as_millis() as u64,
                    "lock held, backing off"
                );
                tokio::time::sleep(retry_delay).await;
            }
        }
        Ok(None)
    }

    /// Acquire with the configured TTL and retry policy.
    ///
    /// Convenience over [`Self::try_acquire_with_retry`] that raises
    /// [`CoordinationError::LockNotAcquired`] when attempts are exhausted.
    pub async fn acquire(&self, resource: &str) -> Result<HolderToken, CoordinationError> {
        match self
            .try_acquire_with_retry(
                resource,
                self.config.ttl,
                self.config.max_retries,
                self.config.retry_delay,
            )
            .await?
        {
            Some(token) => Ok(token),
            None => LockNotAcquiredSnafu {
                key: Self::lock_key(resource),
                attempts: self.config.max_retries + 1,
            }
            .fail(),
        }
    }

    /// Release the lock if `token` still owns it.
    ///
    /// Executed as one atomic compare-and-delete, never a read followed by a
    /// delete. A non-matching token means the lock expired and was possibly
    /// re-acquired; that outcome is logged and reported as `false`, not
    /// raised. Store unavailability is best-effort (fail-open): the bounded
    /// TTL is the ultimate safety net.
    pub async fn release(
        &self,
        resource: &str,
        token: &HolderToken,
    ) -> Result<bool, CoordinationError> {
        let key = Self::lock_key(resource);

        match self
            .store
            .write(WriteRequest::compare_and_delete(&key, token.as_str()))
            .await
        {
            Ok(result) => {
                if result.applied.unwrap_or(false) {
                    debug!(key = %key, token = %token, "lock released");
                    Ok(true)
                } else {
                    let err = CoordinationError::LockNotOwned { key: key.clone() };
                    warn!(key = %key, error = %err, "release skipped");
                    Ok(false)
                }
            }
            Err(KeyValueStoreError::Unavailable { reason }) => {
                warn!(key = %key, %reason, "store unavailable during release; lock will expire via TTL");
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Unconditionally delete the lock.
    ///
    /// Administrative only: bypasses ownership verification and is unsafe in
    /// normal flow.
    pub async fn force_release(&self, resource: &str) -> Result<bool, CoordinationError> {
        let key = Self::lock_key(resource);
        let result = self.store.write(WriteRequest::delete(&key)).await?;
        let deleted = result.applied.unwrap_or(false);
        if deleted {
            warn!(key = %key, "lock force-released");
        }
        Ok(deleted)
    }

    /// Whether the lock is currently held.
    pub async fn is_locked(&self, resource: &str) -> Result<bool, CoordinationError> {
        let result = self.store.read(ReadRequest::new(Self::lock_key(resource))).await?;
        Ok(result.kv.is_some())
    }

    /// Remaining lifetime of the lock.
    ///
    /// [`KeyTtl::as_seconds`] yields the conventional integer form: remaining
    /// seconds, -1 for no expiry, -2 for an absent lock.
    pub async fn remaining_ttl(&self, resource: &str) -> Result<KeyTtl, CoordinationError> {
        let result = self.store.ttl(TtlRequest::new(Self::lock_key(resource))).await?;
        Ok(result.ttl)
    }
}

#[cfg(test)]
mod tests {
    use larch_kv::MemoryKeyValueStore;
    use larch_kv::test_support::UnavailableKeyValueStore;

    use super::*;

    #[tokio::test]
    async fn acquire_and_release() {
        let store = MemoryKeyValueStore::new();
        let manager = LockManager::new(store, LockConfig::default());

        let token = manager
            .try_acquire("res", Duration::from_secs(30))
            .await
            .unwrap()
            .expect("lock should be free");
        assert!(manager.is_locked("res").await.unwrap());

        assert!(manager.release("res", &token).await.unwrap());
        assert!(!manager.is_locked("res").await.unwrap());
    }

    #[tokio::test]
    async fn contention_returns_none() {
        let store = MemoryKeyValueStore::new();
        let manager = LockManager::new(store, LockConfig::default());

        let _token = manager
            .try_acquire("res", Duration::from_secs(30))
            .await
            .unwrap()
            .unwrap();

        let second = manager.try_acquire("res", Duration::from_secs(30)).await.unwrap();
        assert!(second.is_none());
    }

    #[tokio::test]
    async fn release_with_stale_token_is_noop() {
        let store = MemoryKeyValueStore::new();
        let manager = LockManager::new(store, LockConfig::default());

        let token = manager
            .try_acquire("res", Duration::from_secs(30))
            .await
            .unwrap()
            .unwrap();
        let stale = HolderToken::generate();

        assert!(!manager.release("res", &stale).await.unwrap());
        assert!(manager.is_locked("res").await.unwrap());

        assert!(manager.release("res", &token).await.unwrap());
        // Second release with the same token reports false
        assert!(!manager.release("res", &token).await.unwrap());
    }

    #[tokio::test]
    async fn expired_lock_can_be_reacquired() {
        let store = MemoryKeyValueStore::new();
        let manager = LockManager::new(store, LockConfig::default());

        let _token = manager
            .try_acquire("res", Duration::from_millis(40))
            .await
            .unwrap()
            .unwrap();

        tokio::time::sleep(Duration::from_millis(70)).await;

        assert!(!manager.is_locked("res").await.unwrap());
        let retaken = manager.try_acquire("res", Duration::from_secs(30)).await.unwrap();
        assert!(retaken.is_some());
    }

    #[tokio::test]
    async fn retry_wins_after_holder_expires() {
        let store = MemoryKeyValueStore::new();
        let manager = LockManager::new(store, LockConfig::default());

        let _holder = manager
            .try_acquire("res", Duration::from_millis(60))
            .await
            .unwrap()
            .unwrap();

        let token = manager
            .try_acquire_with_retry("res", Duration::from_secs(30), 5, Duration::from_millis(30))
            .await
            .unwrap();
        assert!(token.is_some());
    }

    #[tokio::test]
    async fn acquire_raises_when_exhausted() {
        let store = MemoryKeyValueStore::new();
        let config = LockConfig {
            max_retries: 1,
            retry_delay: Duration::from_millis(10),
            ..Default::default()
        };
        let manager = LockManager::new(store, config);

        let _holder = manager.acquire("res").await.unwrap();
        let result = manager.acquire("res").await;
        assert!(matches!(result, Err(CoordinationError::LockNotAcquired { attempts: 2, .. })));
    }

    #[tokio::test]
    async fn unavailable_store_fails_closed_on_acquire() {
        let flaky = UnavailableKeyValueStore::new(MemoryKeyValueStore::new());
        let manager = LockManager::new(flaky.clone(), LockConfig::default());

        flaky.set_available(false);
        let token = manager.try_acquire("res", Duration::from_secs(30)).await.unwrap();
        assert!(token.is_none());
    }

    #[tokio::test]
    async fn unavailable_store_is_best_effort_on_release() {
        let flaky = UnavailableKeyValueStore::new(MemoryKeyValueStore::new());
        let manager = LockManager::new(flaky.clone(), LockConfig::default());

        let token = manager
            .try_acquire("res", Duration::from_secs(30))
            .await
            .unwrap()
            .unwrap();

        flaky.set_available(false);
        assert!(!manager.release("res", &token).await.unwrap());
    }

    #[tokio::test]
    async fn remaining_ttl_states() {
        let store = MemoryKeyValueStore::new();
        let manager = LockManager::new(store, LockConfig::default());

        assert_eq!(manager.remaining_ttl("res").await.unwrap().as_seconds(), -2);

        let _token = manager
            .try_acquire("res", Duration::from_secs(30))
            .await
            .unwrap()
            .unwrap();
        let ttl = manager.remaining_ttl("res").await.unwrap();
        let secs = ttl.as_seconds();
        assert!(secs > 0 && secs <= 30);
    }
}
