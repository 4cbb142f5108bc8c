//! Built-in gate stages, in pipeline order.

pub mod freshness;
pub mod registration;
pub mod signature;
pub mod token;

pub use freshness::FreshnessStage;
pub use registration::RegistrationStage;
pub use signature::SignatureStage;
pub use token::TokenBindingStage;
