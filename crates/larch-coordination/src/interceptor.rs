//! Call interceptor composing rate limiting, key generation, and the
//! idempotency guard.
//!
//! Checks run in a fixed order: rate limits first (cheapest rejection),
//! then key derivation, then the at-most-once guard around the operation
//! itself. A rate-limited or duplicate call never reaches the operation.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::constants::DEFAULT_GUARD_TTL_MS;
use crate::error::CoordinationError;
use crate::idempotency::IdempotencyGuard;
use crate::idempotency::ReleasePolicy;
use crate::keygen::CallContext;
use crate::keygen::KeyGenerator;
use crate::rate_limiter::RateLimiter;
use crate::rate_limiter::RatePolicy;

use larch_kv::KeyValueStore;

/// Subject used for rate accounting when the call carries no identity.
const ANONYMOUS_IDENTITY: &str = "anonymous";

/// Subject used for rate accounting when the call carries no source address.
const UNKNOWN_SOURCE: &str = "unknown";

/// Wraps an operation with per-caller rate limits and at-most-once
/// execution keyed by a [`KeyGenerator`] strategy.
pub struct GuardedCall<S: KeyValueStore + ?Sized> {
    guard: IdempotencyGuard<S>,
    limiter: RateLimiter<S>,
    keygen: Arc<dyn KeyGenerator>,
    prefix: String,
    ttl: Duration,
    policy: ReleasePolicy,
    rate_policy: Option<RatePolicy>,
}

impl<S: KeyValueStore + ?Sized> GuardedCall<S> {
    /// Wrap calls under `prefix` with the default window and release policy
    /// and no rate limiting.
    pub fn new(store: Arc<S>, keygen: Arc<dyn KeyGenerator>, prefix: impl Into<String>) -> Self {
        Self {
            guard: IdempotencyGuard::new(store.clone()),
            limiter: RateLimiter::new(store),
            keygen,
            prefix: prefix.into(),
            ttl: Duration::from_millis(DEFAULT_GUARD_TTL_MS),
            policy: ReleasePolicy::default(),
            rate_policy: None,
        }
    }

    /// Override the deduplication window.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Override the guard release policy.
    pub fn with_release_policy(mut self, policy: ReleasePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Enable rate limiting with the given policy.
    pub fn with_rate_policy(mut self, rate_policy: RatePolicy) -> Self {
        self.rate_policy = Some(rate_policy);
        self
    }

    /// Run `operation` through the full chain.
    ///
    /// Possible rejections, in order: [`CoordinationError::RateLimitExceeded`]
    /// when a window cap is hit, [`CoordinationError::KeyGenerationFailed`]
    /// when the strategy cannot derive a key, and
    /// [`CoordinationError::DuplicateRequest`] when the derived key is
    /// already held.
    pub async fn invoke<F, T>(&self, ctx: &CallContext, operation: F) -> Result<T, CoordinationError>
    where
        F: Future<Output = T>,
    {
        if let Some(rate_policy) = &self.rate_policy {
            let identity = ctx.identity.as_deref().unwrap_or(ANONYMOUS_IDENTITY);
            let source = ctx.source_addr.as_deref().unwrap_or(UNKNOWN_SOURCE);
            self.limiter
                .check_and_record(rate_policy, identity, source)
                .await?;
        }

        let key = self.keygen.generate_key(&self.prefix, ctx)?;
        self.guard
            .execute_once(&key, self.ttl, self.policy, operation)
            .await
    }
}
