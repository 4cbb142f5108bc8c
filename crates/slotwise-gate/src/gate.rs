use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use slotwise_store::Database;
use slotwise_types::ActorId;

use crate::config::GateConfig;
use crate::error::GateError;
use crate::registry::KeyRegistry;
use crate::stage::{
    Authority, GateContext, GateStage, Rejection, SignedRequest, StageDecision, StageResult,
};
use crate::stages::{FreshnessStage, RegistrationStage, SignatureStage, TokenBindingStage};

// ---------------------------------------------------------------------------
// Decision / GateResult
// ---------------------------------------------------------------------------

/// The final verdict of the pipeline.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Decision {
    Accepted,
    Rejected { rejection: Rejection, reason: String },
}

impl Decision {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted)
    }
}

/// The outcome of running a request through the full gate pipeline.
#[derive(Clone, Debug)]
pub struct GateResult {
    pub decision: Decision,
    /// ID of the key that signed the request.
    pub signer: ActorId,
    /// Per-stage results in evaluation order.
    pub stage_results: Vec<StageResult>,
    /// Total wall-clock time for the pipeline evaluation.
    pub elapsed: Duration,
}

impl GateResult {
    /// Returns `true` if the request was accepted.
    pub fn is_accepted(&self) -> bool {
        self.decision.is_accepted()
    }

    /// `Ok(signer)` if accepted, otherwise the rejection.
    pub fn into_outcome(self) -> Result<ActorId, Rejection> {
        match self.decision {
            Decision::Accepted => Ok(self.signer),
            Decision::Rejected { rejection, .. } => Err(rejection),
        }
    }
}

// ---------------------------------------------------------------------------
// TrustGate
// ---------------------------------------------------------------------------

/// The trust gate: one pipeline of stages, parameterised by [`Authority`],
/// that every signed request passes through before it may touch state.
///
/// Root, mediator, provider and user checks share the same stages and differ
/// only in which registry the registration stage consults and whether the
/// token binding stage applies.
pub struct TrustGate {
    stages: Vec<Box<dyn GateStage>>,
    config: GateConfig,
}

impl TrustGate {
    /// Create a gate with an empty pipeline.
    pub fn new(config: GateConfig) -> Self {
        Self {
            stages: Vec::new(),
            config,
        }
    }

    /// Create a gate with the default pipeline:
    /// Registration -> Signature -> Freshness -> TokenBinding
    pub fn with_default_stages(config: GateConfig) -> Self {
        let mut gate = Self::new(config);
        gate.add_stage(Box::new(RegistrationStage));
        gate.add_stage(Box::new(SignatureStage));
        gate.add_stage(Box::new(FreshnessStage));
        gate.add_stage(Box::new(TokenBindingStage));
        gate
    }

    /// Append a stage to the end of the pipeline.
    pub fn add_stage(&mut self, stage: Box<dyn GateStage>) {
        self.stages.push(stage);
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    /// Number of stages in the pipeline.
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Evaluate a request against the current server time.
    pub fn evaluate(
        &self,
        db: &dyn Database,
        authority: Authority,
        request: &SignedRequest,
    ) -> Result<GateResult, GateError> {
        self.evaluate_at(db, authority, request, Utc::now())
    }

    /// Evaluate a request as of `now`.
    ///
    /// The pipeline is **fail-fast**: the first failing stage stops
    /// evaluation and its rejection becomes the decision. Stages that do not
    /// apply to `authority` are skipped and leave no result.
    pub fn evaluate_at(
        &self,
        db: &dyn Database,
        authority: Authority,
        request: &SignedRequest,
        now: DateTime<Utc>,
    ) -> Result<GateResult, GateError> {
        let pipeline_start = Instant::now();
        let signer = request.signer();
        let mut context = GateContext {
            authority,
            registry: KeyRegistry::new(db),
            config: &self.config,
            now,
            previous_stages: Vec::with_capacity(self.stages.len()),
        };

        for stage in self.stages.iter().filter(|s| s.applies_to(authority)) {
            let stage_start = Instant::now();
            let decision = stage.evaluate(request, &context)?;

            let reason = match &decision {
                StageDecision::Pass => None,
                StageDecision::Fail { reason, .. } => Some(reason.clone()),
            };
            context.previous_stages.push(StageResult {
                stage_name: stage.name().to_string(),
                passed: decision.is_pass(),
                reason,
                elapsed: stage_start.elapsed(),
            });

            if let StageDecision::Fail { rejection, reason } = decision {
                tracing::warn!(
                    %authority,
                    signer = %signer.short_id(),
                    stage = stage.name(),
                    %rejection,
                    %reason,
                    "request rejected"
                );
                return Ok(GateResult {
                    decision: Decision::Rejected { rejection, reason },
                    signer,
                    stage_results: context.previous_stages,
                    elapsed: pipeline_start.elapsed(),
                });
            }
        }

        tracing::debug!(%authority, signer = %signer.short_id(), "request accepted");
        Ok(GateResult {
            decision: Decision::Accepted,
            signer,
            stage_results: context.previous_stages,
            elapsed: pipeline_start.elapsed(),
        })
    }
}

impl std::fmt::Debug for TrustGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrustGate")
            .field("stages", &self.stages.iter().map(|s| s.name()).collect::<Vec<_>>())
            .field("config", &self.config)
            .finish()
    }
}
