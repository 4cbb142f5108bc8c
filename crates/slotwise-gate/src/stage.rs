use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use slotwise_crypto::SignedEnvelope;
use slotwise_types::{ActorId, Timestamped, TokenData};

use crate::config::GateConfig;
use crate::error::GateError;
use crate::registry::KeyRegistry;

// ---------------------------------------------------------------------------
// Authority
// ---------------------------------------------------------------------------

/// Which registered authority a request must be signed by.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Authority {
    /// One of the configured root keys.
    Root,
    /// A mediator registered by the root authority.
    Mediator,
    /// A provider registered by a mediator.
    Provider,
    /// Any key, bound to a server-issued user token.
    User,
    /// Any key; the request only proves possession of its own private half.
    SelfSigned,
}

impl Authority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Root => "root",
            Self::Mediator => "mediator",
            Self::Provider => "provider",
            Self::User => "user",
            Self::SelfSigned => "self-signed",
        }
    }
}

impl fmt::Display for Authority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// SignedRequest
// ---------------------------------------------------------------------------

/// Everything the gate looks at: the exact signed bytes, the signature, the
/// claimed signer key, the timestamp carried inside the payload and, for
/// user requests, the server-issued token.
#[derive(Clone, Debug)]
pub struct SignedRequest {
    pub json: String,
    pub signature: Vec<u8>,
    pub public_key: Vec<u8>,
    pub timestamp: DateTime<Utc>,
    pub token: Option<SignedEnvelope<TokenData>>,
}

impl SignedRequest {
    /// Build a request from a signed envelope whose payload is timestamped.
    pub fn from_envelope<T: Timestamped>(envelope: &SignedEnvelope<T>) -> Self {
        Self {
            json: envelope.json().to_string(),
            signature: envelope.signature().to_vec(),
            public_key: envelope.public_key().to_vec(),
            timestamp: envelope.data().timestamp(),
            token: None,
        }
    }

    /// Attach the user token a [`Authority::User`] request is bound to.
    pub fn with_token(mut self, token: SignedEnvelope<TokenData>) -> Self {
        self.token = Some(token);
        self
    }

    /// ID of the claimed signer.
    pub fn signer(&self) -> ActorId {
        ActorId::derive(&self.public_key)
    }
}

// ---------------------------------------------------------------------------
// Rejection / StageDecision
// ---------------------------------------------------------------------------

/// Why a request was turned away.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Rejection {
    /// The key is not registered with the required authority.
    NotAuthorized,
    /// The signature does not match the signed bytes and key.
    InvalidSignature,
    /// The payload timestamp is outside the freshness window.
    SignatureExpired,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotAuthorized => f.write_str("not authorized"),
            Self::InvalidSignature => f.write_str("invalid signature"),
            Self::SignatureExpired => f.write_str("signature expired"),
        }
    }
}

/// The outcome of a single gate stage evaluation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StageDecision {
    /// The stage passed; proceed to the next stage.
    Pass,
    /// The stage failed; the request is rejected.
    Fail { rejection: Rejection, reason: String },
}

impl StageDecision {
    pub fn fail(rejection: Rejection, reason: impl Into<String>) -> Self {
        Self::Fail {
            rejection,
            reason: reason.into(),
        }
    }

    /// Returns `true` if the decision is `Pass`.
    pub fn is_pass(&self) -> bool {
        matches!(self, Self::Pass)
    }

    /// Returns `true` if the decision is `Fail`.
    pub fn is_fail(&self) -> bool {
        matches!(self, Self::Fail { .. })
    }
}

// ---------------------------------------------------------------------------
// StageResult
// ---------------------------------------------------------------------------

/// Recorded result from a completed stage evaluation.
#[derive(Clone, Debug)]
pub struct StageResult {
    /// Name of the stage that produced this result.
    pub stage_name: String,
    /// Whether the stage passed.
    pub passed: bool,
    /// Populated on failure.
    pub reason: Option<String>,
    /// Wall-clock time the stage took to evaluate.
    pub elapsed: Duration,
}

// ---------------------------------------------------------------------------
// GateContext
// ---------------------------------------------------------------------------

/// Contextual information available to every gate stage.
pub struct GateContext<'a> {
    /// Authority the request must be signed by.
    pub authority: Authority,
    /// Registered mediator and provider keys.
    pub registry: KeyRegistry<'a>,
    /// Root keys, token key and freshness window.
    pub config: &'a GateConfig,
    /// Server time the request is judged against.
    pub now: DateTime<Utc>,
    /// Results from stages that have already run in this evaluation.
    pub previous_stages: Vec<StageResult>,
}

// ---------------------------------------------------------------------------
// GateStage trait
// ---------------------------------------------------------------------------

/// A single evaluation stage in the gate pipeline.
///
/// Stages are evaluated in order. Each stage receives the request and a
/// shared context, and returns a pass/fail decision. The trait is
/// object-safe and `Send + Sync` so stages can be stored in a
/// `Vec<Box<dyn GateStage>>`.
pub trait GateStage: Send + Sync {
    /// Human-readable name of this stage (e.g., "registration", "signature").
    fn name(&self) -> &str;

    /// Whether this stage runs for requests of the given authority.
    fn applies_to(&self, _authority: Authority) -> bool {
        true
    }

    /// Evaluate the request and return a decision.
    fn evaluate(
        &self,
        request: &SignedRequest,
        context: &GateContext<'_>,
    ) -> Result<StageDecision, GateError>;
}
