//! Lazily-anchored fixed-window rate limiter.
//!
//! A counter per (subject, window size) is atomically incremented on every
//! call; the first increment anchors the window by setting the counter's TTL,
//! so boundaries start at first use rather than being calendar-aligned. The
//! increment happens before the limit check and is not rolled back on
//! rejection: counts can slightly overshoot the cap under contention, and in
//! multi-window checks an increment already applied to a window that passed
//! stays when a later window rejects the call. This is a protective, soft
//! limiter, not a correctness guarantee.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;
use tracing::warn;

use larch_kv::KeyValueStore;
use larch_kv::KeyValueStoreError;
use larch_kv::WriteRequest;

use crate::constants::RATE_KEY_PREFIX;
use crate::constants::WINDOW_DAY;
use crate::constants::WINDOW_HOUR;
use crate::constants::WINDOW_MINUTE;
use crate::error::CoordinationError;
use crate::error::RateLimitExceededSnafu;

/// A cap within one fixed window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowLimit {
    /// Maximum calls admitted within the window.
    pub max_count: u64,
    /// Window length.
    pub window: Duration,
}

impl WindowLimit {
    pub fn new(max_count: u64, window: Duration) -> Self {
        Self { max_count, window }
    }

    /// Cap per minute.
    pub fn per_minute(max_count: u64) -> Self {
        Self::new(max_count, WINDOW_MINUTE)
    }

    /// Cap per hour.
    pub fn per_hour(max_count: u64) -> Self {
        Self::new(max_count, WINDOW_HOUR)
    }

    /// Cap per day.
    pub fn per_day(max_count: u64) -> Self {
        Self::new(max_count, WINDOW_DAY)
    }
}

/// Compound limits layering caller identity and source address.
///
/// Both dimensions must pass for a call to be admitted.
#[derive(Debug, Clone)]
pub struct RatePolicy {
    /// Windows checked against the caller identity.
    pub per_identity: Vec<WindowLimit>,
    /// Windows checked against the source address.
    pub per_source: Vec<WindowLimit>,
}

impl Default for RatePolicy {
    fn default() -> Self {
        Self {
            per_identity: vec![
                WindowLimit::per_minute(60),
                WindowLimit::per_hour(1_000),
                WindowLimit::per_day(10_000),
            ],
            per_source: vec![WindowLimit::per_minute(120), WindowLimit::per_hour(2_000)],
        }
    }
}

/// Caps operation frequency per key across one or more fixed windows.
///
/// Stateless wrapper over the store. Store unavailability bypasses the
/// limiter (fail-open): rate limiting is protective, not correctness-
/// critical, which is deliberately the opposite policy from lock acquire.
pub struct RateLimiter<S: KeyValueStore + ?Sized> {
    store: Arc<S>,
}

impl<S: KeyValueStore + ?Sized> RateLimiter<S> {
    /// Create a new rate limiter over the given store.
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Counter keys embed the window length so simultaneous windows for the
    /// same subject count independently.
    fn window_key(key: &str, window: Duration) -> String {
        format!("{RATE_KEY_PREFIX}{key}:{}", window.as_secs())
    }

    /// Record one call against `key` and check it against the cap.
    ///
    /// Returns `false` when the post-increment count exceeds `max_count`.
    /// The rejected call's increment is not rolled back.
    pub async fn try_acquire(
        &self,
        key: &str,
        max_count: u64,
        window: Duration,
    ) -> Result<bool, CoordinationError> {
        let counter_key = Self::window_key(key, window);

        let count = match self.store.write(WriteRequest::increment(&counter_key, 1)).await {
            Ok(result) => result.new_value.unwrap_or(0),
            Err(KeyValueStoreError::Unavailable { reason }) => {
                warn!(key = %counter_key, %reason, "store unavailable; rate limiter bypassed");
                return Ok(true);
            }
            Err(e) => return Err(e.into()),
        };

        if count == 1 {
            // First call anchors the window boundary
            match self.store.write(WriteRequest::expire(&counter_key, window)).await {
                Ok(_) => {}
                Err(KeyValueStoreError::Unavailable { reason }) => {
                    warn!(key = %counter_key, %reason, "store unavailable; window not anchored");
                    return Ok(true);
                }
                Err(e) => return Err(e.into()),
            }
        }

        let allowed = count <= max_count as i64;
        debug!(key = %counter_key, count, max_count, allowed, "rate window checked");
        Ok(allowed)
    }

    /// Check `key` against every window; all must pass.
    ///
    /// Increments already applied to windows that passed are not retracted
    /// when a later window rejects the call.
    pub async fn check_windows(
        &self,
        key: &str,
        limits: &[WindowLimit],
    ) -> Result<bool, CoordinationError> {
        for limit in limits {
            if !self.try_acquire(key, limit.max_count, limit.window).await? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Record a call against both dimensions of `policy`.
    ///
    /// The identity windows are checked first, then the source windows; both
    /// must pass. A rejection raises
    /// [`CoordinationError::RateLimitExceeded`] naming the subject whose
    /// window was exhausted.
    pub async fn check_and_record(
        &self,
        policy: &RatePolicy,
        identity: &str,
        source_addr: &str,
    ) -> Result<(), CoordinationError> {
        let subject = format!("id:{identity}");
        if !self.check_windows(&subject, &policy.per_identity).await? {
            return RateLimitExceededSnafu { key: subject }.fail();
        }

        let subject = format!("src:{source_addr}");
        if !self.check_windows(&subject, &policy.per_source).await? {
            return RateLimitExceededSnafu { key: subject }.fail();
        }
        Ok(())
    }

    /// Like [`Self::try_acquire`], but maps a rejection to
    /// [`CoordinationError::RateLimitExceeded`] for callers that surface
    /// typed outcomes.
    pub async fn enforce(
        &self,
        key: &str,
        max_count: u64,
        window: Duration,
    ) -> Result<(), CoordinationError> {
        if self.try_acquire(key, max_count, window).await? {
            Ok(())
        } else {
            RateLimitExceededSnafu { key: key.to_string() }.fail()
        }
    }

    /// Administrative reset: delete the counters of every given window for
    /// `key`, restarting counting from zero.
    pub async fn clear_limit(&self, key: &str, windows: &[Duration]) -> Result<(), CoordinationError> {
        for window in windows {
            let counter_key = Self::window_key(key, *window);
            self.store.write(WriteRequest::delete(&counter_key)).await?;
            debug!(key = %counter_key, "rate window cleared");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use larch_kv::MemoryKeyValueStore;
    use larch_kv::ReadRequest;
    use larch_kv::test_support::UnavailableKeyValueStore;

    use super::*;

    #[tokio::test]
    async fn cap_rejects_after_max_count() {
        let store = MemoryKeyValueStore::new();
        let limiter = RateLimiter::new(store);
        let window = Duration::from_secs(60);

        for _ in 0..5 {
            assert!(limiter.try_acquire("subject", 5, window).await.unwrap());
        }
        assert!(!limiter.try_acquire("subject", 5, window).await.unwrap());
    }

    #[tokio::test]
    async fn window_expiry_restarts_counting() {
        let store = MemoryKeyValueStore::new();
        let limiter = RateLimiter::new(store.clone());
        let window = Duration::from_millis(80);

        assert!(limiter.try_acquire("subject", 1, window).await.unwrap());
        assert!(!limiter.try_acquire("subject", 1, window).await.unwrap());

        tokio::time::sleep(Duration::from_millis(120)).await;

        assert!(limiter.try_acquire("subject", 1, window).await.unwrap());
        // Counter restarted at 1
        let counter = store
            .read(ReadRequest::new(format!("rate:subject:{}", window.as_secs())))
            .await
            .unwrap();
        assert_eq!(counter.kv.unwrap().value, "1");
    }

    #[tokio::test]
    async fn rejection_does_not_roll_back_passed_windows() {
        let store = MemoryKeyValueStore::new();
        let limiter = RateLimiter::new(store.clone());
        let limits = [
            WindowLimit::new(100, Duration::from_secs(3600)),
            WindowLimit::new(1, Duration::from_secs(60)),
        ];

        assert!(limiter.check_windows("subject", &limits).await.unwrap());
        assert!(!limiter.check_windows("subject", &limits).await.unwrap());

        // The hourly window kept the increment from the rejected call
        let hourly = store
            .read(ReadRequest::new("rate:subject:3600"))
            .await
            .unwrap();
        assert_eq!(hourly.kv.unwrap().value, "2");
    }

    #[tokio::test]
    async fn compound_policy_names_the_exhausted_dimension() {
        let store = MemoryKeyValueStore::new();
        let limiter = RateLimiter::new(store);
        let policy = RatePolicy {
            per_identity: vec![WindowLimit::new(2, Duration::from_secs(60))],
            per_source: vec![WindowLimit::new(1, Duration::from_secs(60))],
        };

        limiter.check_and_record(&policy, "user-1", "10.0.0.9").await.unwrap();

        // Identity budget remains, but the source window is exhausted
        let denied = limiter.check_and_record(&policy, "user-1", "10.0.0.9").await;
        match denied {
            Err(CoordinationError::RateLimitExceeded { key }) => assert_eq!(key, "src:10.0.0.9"),
            other => panic!("expected source rejection, got {other:?}"),
        }

        // The rejected call still counted against the identity window, which
        // is now exhausted too; the error names the identity subject
        let denied = limiter.check_and_record(&policy, "user-1", "10.0.0.7").await;
        match denied {
            Err(CoordinationError::RateLimitExceeded { key }) => assert_eq!(key, "id:user-1"),
            other => panic!("expected identity rejection, got {other:?}"),
        }

        // A fresh identity and source pass
        limiter.check_and_record(&policy, "user-2", "10.0.0.7").await.unwrap();
    }

    #[tokio::test]
    async fn clear_limit_resets_all_windows() {
        let store = MemoryKeyValueStore::new();
        let limiter = RateLimiter::new(store);
        let window = Duration::from_secs(60);

        assert!(limiter.try_acquire("subject", 1, window).await.unwrap());
        assert!(!limiter.try_acquire("subject", 1, window).await.unwrap());

        limiter.clear_limit("subject", &[window]).await.unwrap();
        assert!(limiter.try_acquire("subject", 1, window).await.unwrap());
    }

    #[tokio::test]
    async fn enforce_maps_rejection_to_error() {
        let store = MemoryKeyValueStore::new();
        let limiter = RateLimiter::new(store);
        let window = Duration::from_secs(60);

        limiter.enforce("subject", 1, window).await.unwrap();
        let result = limiter.enforce("subject", 1, window).await;
        assert!(matches!(result, Err(CoordinationError::RateLimitExceeded { .. })));
    }

    #[tokio::test]
    async fn unavailable_store_fails_open() {
        let flaky = UnavailableKeyValueStore::new(MemoryKeyValueStore::new());
        let limiter = RateLimiter::new(flaky.clone());

        flaky.set_available(false);
        for _ in 0..10 {
            assert!(limiter.try_acquire("subject", 1, Duration::from_secs(60)).await.unwrap());
        }
    }
}
