use slotwise_gate::GateError;
use slotwise_store::StoreError;

/// Errors from the booking engine.
#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    /// The appointment, booking or provider record does not exist.
    #[error("{what} not found")]
    NotFound { what: &'static str },

    /// Every slot of the appointment is taken.
    #[error("appointment is fully booked")]
    FullyBooked,

    /// The priority token has already been spent on a booking.
    #[error("token already used")]
    TokenUsed,

    /// The provider is not (or no longer) registered.
    #[error("provider is inactive")]
    ProviderInactive,

    /// A published appointment is malformed or not signed by its provider.
    #[error("invalid appointment: {0}")]
    InvalidAppointment(String),

    /// A date range or radius is out of bounds.
    #[error("invalid range: {0}")]
    InvalidRange(String),

    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    #[error("registry error: {0}")]
    Registry(#[from] GateError),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl BookingError {
    pub(crate) fn not_found(what: &'static str) -> Self {
        Self::NotFound { what }
    }

    /// `true` for expected terminal states a caller reports as "not found".
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. } | Self::FullyBooked)
    }

    /// `true` if the same call may succeed when retried later.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Store(e) => e.is_retryable(),
            Self::Registry(e) => e.is_retryable(),
            _ => false,
        }
    }
}

impl From<serde_json::Error> for BookingError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

/// Result alias for booking operations.
pub type BookingResult<T> = Result<T, BookingError>;
