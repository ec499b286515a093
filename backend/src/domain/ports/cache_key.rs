//! Domain cache key type shared by to-do cache adapters.
use thiserror::Error;

/// Namespace prefix of every to-do cache key; bump the version to orphan
/// entries written in an older value format.
pub const TODO_CACHE_KEY_PREFIX: &str = "todo:v1:";

/// Cache key used to store and retrieve aggregated to-do results.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TodoCacheKey(String);

impl TodoCacheKey {
    /// Construct a cache key after validating that it is non-empty, trimmed
    /// and namespaced.
    pub fn new(value: impl Into<String>) -> Result<Self, TodoCacheKeyValidationError> {
        let raw = value.into();
        if raw.trim().is_empty() {
            return Err(TodoCacheKeyValidationError::Empty);
        }
        if raw.trim() != raw {
            return Err(TodoCacheKeyValidationError::ContainsWhitespace);
        }
        if !raw.starts_with(TODO_CACHE_KEY_PREFIX) {
            return Err(TodoCacheKeyValidationError::MissingNamespace);
        }
        Ok(Self(raw))
    }

    /// Build a key from a hex digest.
    pub fn from_digest(digest_hex: &str) -> Self {
        Self(format!("{TODO_CACHE_KEY_PREFIX}{digest_hex}"))
    }

    /// Borrow the underlying key as a string slice.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl std::fmt::Display for TodoCacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl AsRef<str> for TodoCacheKey {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

/// Validation errors returned when constructing [`TodoCacheKey`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TodoCacheKeyValidationError {
    /// Key is empty after trimming whitespace.
    #[error("todo cache key must not be empty")]
    Empty,
    /// Key contains leading or trailing whitespace.
    #[error("todo cache key must not contain surrounding whitespace")]
    ContainsWhitespace,
    /// Key lacks the `todo:v1:` namespace.
    #[error("todo cache key must start with `todo:v1:`")]
    MissingNamespace,
}
