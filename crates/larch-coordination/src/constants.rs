//! Centralized constants for the coordination primitives.
//!
//! Defaults are plain configuration values; callers override them through the
//! config structs of each primitive.

use std::time::Duration;

/// Default lock TTL in milliseconds.
pub const DEFAULT_LOCK_TTL_MS: u64 = 30_000;

/// Default delay between lock retry attempts in milliseconds.
pub const DEFAULT_RETRY_DELAY_MS: u64 = 100;

/// Default number of retries after the initial acquire attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default idempotency guard window in milliseconds.
pub const DEFAULT_GUARD_TTL_MS: u64 = 60_000;

/// Key prefix for lock entries.
pub const LOCK_KEY_PREFIX: &str = "lock:";

/// Key prefix for idempotency guard markers.
pub const IDEMPOTENCY_KEY_PREFIX: &str = "idem:";

/// Key prefix for rate limiter window counters.
pub const RATE_KEY_PREFIX: &str = "rate:";

/// One-minute rate window.
pub const WINDOW_MINUTE: Duration = Duration::from_secs(60);

/// One-hour rate window.
pub const WINDOW_HOUR: Duration = Duration::from_secs(60 * 60);

/// One-day rate window.
pub const WINDOW_DAY: Duration = Duration::from_secs(24 * 60 * 60);
