//! Key-value store contract for the larch coordination primitives.
//!
//! The coordination layer (locks, idempotency guards, rate limiters) consumes
//! a small set of single-key atomic operations: create-if-absent with TTL,
//! read, delete, compare-and-delete, integer increment, and expiry updates.
//! Any networked store with per-key atomicity satisfies the contract (Redis
//! realizes these as SET NX PX / GET / DEL / a compare-and-delete script /
//! INCRBY / PEXPIRE); its wire internals stay out of scope here.
//!
//! [`MemoryKeyValueStore`] is a deterministic in-memory implementation with
//! real TTL semantics, used for unit tests and embedding.

pub mod constants;
mod error;
mod kv;
mod memory;
pub mod test_support;
mod traits;

pub use error::KeyValueStoreError;
pub use kv::KeyTtl;
pub use kv::KeyValue;
pub use kv::ReadRequest;
pub use kv::ReadResult;
pub use kv::TtlRequest;
pub use kv::TtlResult;
pub use kv::WriteCommand;
pub use kv::WriteRequest;
pub use kv::WriteResult;
pub use kv::validate_write_command;
pub use memory::MemoryKeyValueStore;
pub use traits::KeyValueStore;
