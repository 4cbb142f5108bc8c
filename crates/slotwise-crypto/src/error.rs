/// Errors from cryptographic operations.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CryptoError {
    /// The signature does not match the data and public key.
    #[error("invalid signature")]
    InvalidSignature,

    /// Key bytes could not be decoded as a P-256 key.
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// The operation needs the private half, but the key is public-only.
    #[error("key '{0}' has no private half")]
    MissingPrivateKey(String),

    /// The key's algorithm does not support the requested operation.
    #[error("key '{name}' is an {algorithm} key")]
    WrongAlgorithm { name: String, algorithm: String },

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Result alias for crypto operations.
pub type CryptoResult<T> = Result<T, CryptoError>;
