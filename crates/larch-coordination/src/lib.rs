//! Coordination primitives built on a shared key-value store.
//!
//! Three primitives cover the common cross-process coordination needs of
//! services sharing one store:
//!
//! - [`LockManager`]: mutual exclusion on logical resources, with random
//!   holder tokens and TTL-based crash recovery.
//! - [`IdempotencyGuard`]: at-most-once execution of a logical operation
//!   within a time window, with pluggable [`KeyGenerator`] strategies and a
//!   [`GuardedCall`] interceptor that composes rate limiting on top.
//! - [`RateLimiter`]: fixed-window call caps, layered per identity and per
//!   source address.
//!
//! All primitives are stateless wrappers over the store: every mutation is a
//! single atomic store command, so any number of processes can construct
//! their own instances against the same backend.
//!
//! ```ignore
//! let store = MemoryKeyValueStore::new();
//! let locks = LockManager::new(store.clone(), LockConfig::default());
//!
//! let token = locks.acquire("payment:order123").await?;
//! // ... exclusive work ...
//! locks.release("payment:order123", &token).await?;
//! ```
//!
//! Failure policy differs by primitive: lock acquisition and key generation
//! fail closed when the store is unreachable, while lock release and rate
//! limiting fail open. See each primitive's docs for the reasoning.

pub mod constants;
mod error;
mod idempotency;
mod interceptor;
mod keygen;
mod lock;
mod rate_limiter;
mod types;

pub use error::CoordinationError;
pub use idempotency::IdempotencyGuard;
pub use idempotency::ReleasePolicy;
pub use interceptor::GuardedCall;
pub use keygen::CallContext;
pub use keygen::FieldSelectorKeyGenerator;
pub use keygen::KeyGenerator;
pub use keygen::ParamHashKeyGenerator;
pub use lock::LockConfig;
pub use lock::LockManager;
pub use rate_limiter::RateLimiter;
pub use rate_limiter::RatePolicy;
pub use rate_limiter::WindowLimit;
pub use types::HolderToken;

pub use larch_kv::KeyTtl;
