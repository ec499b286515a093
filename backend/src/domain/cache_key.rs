//! Content-derived cache keys for aggregated to-do results.
//!
//! A key digests everything that can change a result: the user, the
//! `<kind>_<purpose>` namespace, the set of contexts queried, the query
//! parameters and the user's batch token. Context lists are sorted and
//! deduplicated and parameter objects have their keys sorted recursively, so
//! neither input order nor parameter order changes the key.

use std::collections::BTreeSet;
use std::fmt;

use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::domain::ports::{BatchToken, TodoCacheKey};
use crate::domain::{ContextRef, ObjectKind, Purpose, UserId};

/// Failure to render a canonical JSON payload.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("failed to serialise canonical JSON payload: {message}")]
pub struct FingerprintError {
    message: String,
}

/// SHA-256 digest of a canonicalised input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    /// Raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hexadecimal encoding.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    fn of(bytes: &[u8]) -> Self {
        Self(Sha256::digest(bytes).into())
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Canonicalise a JSON value and compute its SHA-256 digest.
///
/// Object keys are sorted recursively, arrays keep their order and the
/// result is hashed as compact JSON.
///
/// # Examples
/// ```
/// use serde_json::json;
/// use todo_backend::domain::canonicalize_and_hash;
///
/// let a = canonicalize_and_hash(&json!({"b": 2, "a": {"y": 1, "x": 0}})).expect("hash a");
/// let b = canonicalize_and_hash(&json!({"a": {"x": 0, "y": 1}, "b": 2})).expect("hash b");
/// assert_eq!(a, b);
/// ```
pub fn canonicalize_and_hash(value: &serde_json::Value) -> Result<Fingerprint, FingerprintError> {
    let canonical = canonicalize(value);
    let bytes = serde_json::to_vec(&canonical).map_err(|err| FingerprintError {
        message: err.to_string(),
    })?;
    Ok(Fingerprint::of(&bytes))
}

fn canonicalize(value: &serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Object(map) => {
            let mut sorted: Vec<_> = map.iter().collect();
            sorted.sort_by_key(|(key, _)| key.as_str());
            serde_json::Value::Object(
                sorted
                    .into_iter()
                    .map(|(key, nested)| (key.clone(), canonicalize(nested)))
                    .collect(),
            )
        }
        serde_json::Value::Array(items) => {
            serde_json::Value::Array(items.iter().map(canonicalize).collect())
        }
        other => other.clone(),
    }
}

/// Digest of a context set; order and duplicates are ignored.
pub fn context_fingerprint(contexts: &[ContextRef]) -> Fingerprint {
    let unique: BTreeSet<ContextRef> = contexts.iter().copied().collect();
    let joined = unique
        .iter()
        .map(|context| context.asset_string())
        .collect::<Vec<_>>()
        .join(",");
    Fingerprint::of(joined.as_bytes())
}

/// Inputs of a to-do cache key.
#[derive(Debug, Clone, Copy)]
pub struct CacheKeyParts<'a> {
    pub user: UserId,
    pub kind: ObjectKind,
    pub purpose: Purpose,
    pub contexts: &'a [ContextRef],
    pub params: &'a serde_json::Value,
    pub batch_token: BatchToken,
}

/// Derive the cache key for `parts`.
pub fn derive_cache_key(parts: &CacheKeyParts<'_>) -> Result<TodoCacheKey, FingerprintError> {
    let params = canonicalize_and_hash(parts.params)?;
    let contexts = context_fingerprint(parts.contexts);
    let material = format!(
        "{user}/{namespace}/{contexts}/{params}/{token}",
        user = parts.user,
        namespace = parts.kind.cache_namespace(parts.purpose),
        token = parts.batch_token,
    );
    Ok(TodoCacheKey::from_digest(
        &Fingerprint::of(material.as_bytes()).to_hex(),
    ))
}
