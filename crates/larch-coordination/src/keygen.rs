//! Pluggable key-generation strategies for the idempotency guard.
//!
//! Strategies are typed and caller-supplied: the caller states which parts of
//! the call participate in the derived key instead of a framework inferring
//! it reflectively. A strategy that cannot derive a key fails closed: the
//! guarded operation does not run.

use serde_json::Value;
use sha2::Digest;
use sha2::Sha256;

use crate::error::CoordinationError;
use crate::error::KeyGenerationFailedSnafu;

/// The view of a guarded call that an interceptor hands to a strategy.
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    /// Authenticated caller identity, e.g. an auth token subject.
    pub identity: Option<String>,
    /// Network source address of the call.
    pub source_addr: Option<String>,
    /// Named call arguments.
    pub args: Value,
}

impl CallContext {
    /// Context for an authenticated caller.
    pub fn new(identity: impl Into<String>, args: Value) -> Self {
        Self {
            identity: Some(identity.into()),
            source_addr: None,
            args,
        }
    }

    /// Attach the network source address.
    pub fn with_source_addr(mut self, source_addr: impl Into<String>) -> Self {
        self.source_addr = Some(source_addr.into());
        self
    }
}

/// Derives the guard key for a call.
pub trait KeyGenerator: Send + Sync {
    /// Derive the key, or fail when required data is missing.
    fn generate_key(&self, prefix: &str, ctx: &CallContext) -> Result<String, CoordinationError>;
}

fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}

/// Key = prefix + caller identity + digest of every argument.
///
/// The caller identity is the authenticated identity when present, otherwise
/// the source address; a context carrying neither is a configuration error.
#[derive(Debug, Default)]
pub struct ParamHashKeyGenerator;

impl KeyGenerator for ParamHashKeyGenerator {
    fn generate_key(&self, prefix: &str, ctx: &CallContext) -> Result<String, CoordinationError> {
        let caller = match ctx.identity.as_deref().or(ctx.source_addr.as_deref()) {
            Some(caller) => caller,
            None => {
                return KeyGenerationFailedSnafu {
                    reason: "neither identity nor source address present",
                }
                .fail();
            }
        };

        let serialized =
            serde_json::to_string(&ctx.args).map_err(|e| CoordinationError::KeyGenerationFailed {
                reason: format!("arguments not serializable: {e}"),
            })?;

        Ok(format!("{prefix}{caller}:{}", sha256_hex(&serialized)))
    }
}

/// Key = prefix + digest of caller-selected data.
///
/// The selector closure states which argument data participates in the key.
/// A selector returning `None` (missing field, wrong shape) fails closed.
pub struct FieldSelectorKeyGenerator<F>
where
    F: Fn(&CallContext) -> Option<String> + Send + Sync,
{
    selector: F,
}

impl<F> FieldSelectorKeyGenerator<F>
where
    F: Fn(&CallContext) -> Option<String> + Send + Sync,
{
    /// Build a generator from a field selector.
    pub fn new(selector: F) -> Self {
        Self { selector }
    }
}

impl<F> KeyGenerator for FieldSelectorKeyGenerator<F>
where
    F: Fn(&CallContext) -> Option<String> + Send + Sync,
{
    fn generate_key(&self, prefix: &str, ctx: &CallContext) -> Result<String, CoordinationError> {
        let selected = match (self.selector)(ctx) {
            Some(selected) => selected,
            None => {
                return KeyGenerationFailedSnafu {
                    reason: "selector produced no value",
                }
                .fail();
            }
        };
        Ok(format!("{prefix}{}", sha256_hex(&selected)))
    }
}
