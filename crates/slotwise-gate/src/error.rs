use slotwise_store::StoreError;

/// Errors that can occur during gate evaluation.
///
/// These are failures to *reach* a decision. A request that is merely not
/// authorized produces a rejected [`GateResult`](crate::GateResult), not an
/// error.
#[derive(Debug, thiserror::Error)]
pub enum GateError {
    /// The key registry could not be read.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// A registry entry exists but cannot be decoded.
    #[error("corrupt registry entry for {actor}: {message}")]
    CorruptEntry { actor: String, message: String },

    /// Configuration is invalid.
    #[error("configuration error: {0}")]
    Config(String),
}

impl GateError {
    /// `true` if the failure came from lock or storage contention that may
    /// clear on retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Store(e) if e.is_retryable())
    }
}
