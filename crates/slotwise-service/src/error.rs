use std::fmt;

use slotwise_admission::AdmissionError;
use slotwise_booking::BookingError;
use slotwise_crypto::CryptoError;
use slotwise_gate::{GateError, Rejection};
use slotwise_store::StoreError;

/// The outcome every handler reports to its transport.
///
/// Expected outcomes (`NotFound`, `Conflict`, rejected signatures) are
/// reported as-is. Everything else becomes `Internal` and is logged at the
/// point of translation.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("not authorized: {0}")]
    NotAuthorized(String),

    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    #[error("signature expired: {0}")]
    SignatureExpired(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("invalid params: {0}")]
    InvalidParams(String),

    #[error("internal error: {message}")]
    Internal { message: String, retryable: bool },
}

impl ServiceError {
    /// `true` only for internal failures caused by lock contention.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Internal { retryable: true, .. })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotAuthorized(_) => "not_authorized",
            Self::InvalidSignature(_) => "invalid_signature",
            Self::SignatureExpired(_) => "signature_expired",
            Self::NotFound(_) => "not_found",
            Self::Conflict(_) => "conflict",
            Self::InvalidParams(_) => "invalid_params",
            Self::Internal { .. } => "internal",
        }
    }

    pub(crate) fn rejected(rejection: Rejection, reason: String) -> Self {
        match rejection {
            Rejection::NotAuthorized => Self::NotAuthorized(reason),
            Rejection::InvalidSignature => Self::InvalidSignature(reason),
            Rejection::SignatureExpired => Self::SignatureExpired(reason),
        }
    }

    /// Log and wrap a failure the caller cannot act on.
    pub(crate) fn internal(source: &'static str, error: impl fmt::Display, retryable: bool) -> Self {
        if retryable {
            tracing::warn!(source, error = %error, "contention, caller may retry");
        } else {
            tracing::error!(source, error = %error, "internal failure");
        }
        Self::Internal {
            message: format!("{source}: {error}"),
            retryable,
        }
    }
}

impl From<StoreError> for ServiceError {
    fn from(e: StoreError) -> Self {
        if e.is_not_found() {
            return Self::NotFound(e.to_string());
        }
        let retryable = e.is_retryable();
        Self::internal("store", e, retryable)
    }
}

impl From<GateError> for ServiceError {
    fn from(e: GateError) -> Self {
        let retryable = e.is_retryable();
        Self::internal("gate", e, retryable)
    }
}

impl From<CryptoError> for ServiceError {
    fn from(e: CryptoError) -> Self {
        Self::internal("crypto", e, false)
    }
}

impl From<AdmissionError> for ServiceError {
    fn from(e: AdmissionError) -> Self {
        match e {
            AdmissionError::InvalidCode { .. } => Self::NotAuthorized(e.to_string()),
            other => {
                let retryable = other.is_retryable();
                Self::internal("admission", other, retryable)
            }
        }
    }
}

impl From<BookingError> for ServiceError {
    fn from(e: BookingError) -> Self {
        match e {
            BookingError::NotFound { .. } | BookingError::FullyBooked => {
                Self::NotFound(e.to_string())
            }
            BookingError::TokenUsed => Self::Conflict(e.to_string()),
            BookingError::ProviderInactive => Self::NotAuthorized(e.to_string()),
            BookingError::InvalidAppointment(m) | BookingError::InvalidRange(m) => {
                Self::InvalidParams(m)
            }
            other => {
                let retryable = other.is_retryable();
                Self::internal("booking", other, retryable)
            }
        }
    }
}

/// Result alias for handlers; the sealed response every transport adapts.
pub type ServiceResult<T> = Result<T, ServiceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn booking_outcomes_map_to_taxonomy() {
        assert!(matches!(
            ServiceError::from(BookingError::FullyBooked),
            ServiceError::NotFound(_)
        ));
        assert!(matches!(
            ServiceError::from(BookingError::TokenUsed),
            ServiceError::Conflict(_)
        ));
        assert!(matches!(
            ServiceError::from(BookingError::InvalidRange("x".into())),
            ServiceError::InvalidParams(_)
        ));
    }

    #[test]
    fn only_lock_contention_is_retryable() {
        let contention = ServiceError::from(StoreError::LockTimeout {
            name: "provider:ab".into(),
            waited: std::time::Duration::from_millis(100),
        });
        assert!(contention.is_retryable());
        assert_eq!(contention.kind(), "internal");

        let backend = ServiceError::from(StoreError::Backend("disk on fire".into()));
        assert!(!backend.is_retryable());
        assert!(!ServiceError::Conflict("t".into()).is_retryable());
    }

    #[test]
    fn missing_store_key_is_not_found() {
        let err = ServiceError::from(StoreError::NotFound {
            table: "keys".into(),
            key: "x".into(),
        });
        assert!(matches!(err, ServiceError::NotFound(_)));
    }
}
