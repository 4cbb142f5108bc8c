use std::time::Duration;

/// Errors from storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The key, field or member does not exist (or has expired).
    #[error("not found: {table}/{key}")]
    NotFound { table: String, key: String },

    /// The key holds a different kind of structure.
    #[error("wrong type for {table}/{key}: expected {expected}")]
    WrongType {
        table: String,
        key: String,
        expected: &'static str,
    },

    /// A named lock could not be acquired within the bounded wait.
    #[error("lock '{name}' not acquired within {waited:?}")]
    LockTimeout { name: String, waited: Duration },

    /// The store has been closed.
    #[error("store is closed")]
    Closed,

    /// Failure inside the backing store.
    #[error("backend error: {0}")]
    Backend(String),

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl StoreError {
    pub(crate) fn not_found(table: &str, key: &[u8]) -> Self {
        Self::NotFound {
            table: table.to_string(),
            key: hex::encode(key),
        }
    }

    /// `true` for the expected "absent" outcome rather than a failure.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// `true` if the same call may succeed when retried later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::LockTimeout { .. })
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
