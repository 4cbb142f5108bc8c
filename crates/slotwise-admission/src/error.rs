use slotwise_crypto::CryptoError;
use slotwise_store::StoreError;
use slotwise_types::CodeActor;

/// Errors from admission control.
#[derive(Debug, thiserror::Error)]
pub enum AdmissionError {
    /// The code is not (or no longer) provisioned for this actor class.
    #[error("invalid {actor} code")]
    InvalidCode { actor: CodeActor },

    /// The token counter holds something other than an 8-byte integer.
    #[error("corrupt priority counter: {0} bytes")]
    CorruptCounter(usize),

    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),
}

impl AdmissionError {
    /// `true` if the same call may succeed when retried later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Store(e) if e.is_retryable())
    }
}

/// Result alias for admission operations.
pub type AdmissionResult<T> = Result<T, AdmissionError>;
