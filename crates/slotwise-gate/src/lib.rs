//! Actor trust chain for Slotwise.
//!
//! Every signed request passes through the [`TrustGate`] before it can touch
//! state. The gate runs a pipeline of stages (registration, signature,
//! freshness, token binding) parameterised by the [`Authority`] the request
//! must come from, and produces an accept/reject decision with a per-stage
//! audit trail.
//!
//! # Quick Start
//!
//! ```rust
//! use chrono::Utc;
//! use serde::{Deserialize, Serialize};
//! use slotwise_crypto::{SignedEnvelope, SigningKey};
//! use slotwise_gate::{Authority, GateConfig, SignedRequest, TrustGate};
//! use slotwise_store::InMemoryDatabase;
//! use slotwise_types::Timestamped;
//!
//! #[derive(Serialize, Deserialize)]
//! struct Hello { timestamp: chrono::DateTime<Utc> }
//! impl Timestamped for Hello {
//!     fn timestamp(&self) -> chrono::DateTime<Utc> { self.timestamp }
//! }
//!
//! let root = SigningKey::generate();
//! let config = GateConfig::new(vec![root.verifying_key().to_bytes()], Vec::new());
//! let gate = TrustGate::with_default_stages(config);
//!
//! let envelope = SignedEnvelope::sign(&Hello { timestamp: Utc::now() }, &root).unwrap();
//! let request = SignedRequest::from_envelope(&envelope);
//! let result = gate.evaluate(&InMemoryDatabase::new(), Authority::Root, &request).unwrap();
//! assert!(result.is_accepted());
//! ```

pub mod config;
pub mod error;
pub mod gate;
pub mod registry;
pub mod stage;
pub mod stages;
#[cfg(test)]
pub(crate) mod testing;

pub use config::{GateConfig, DEFAULT_SIGNATURE_WINDOW};
pub use error::GateError;
pub use gate::{Decision, GateResult, TrustGate};
pub use registry::{ActorKey, KeyRegistry, KEYS_TABLE};
pub use stage::{
    Authority, GateContext, GateStage, Rejection, SignedRequest, StageDecision, StageResult,
};
pub use stages::{FreshnessStage, RegistrationStage, SignatureStage, TokenBindingStage};
