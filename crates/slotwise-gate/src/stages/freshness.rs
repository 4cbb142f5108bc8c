use chrono::TimeDelta;

use crate::error::GateError;
use crate::stage::{GateContext, GateStage, Rejection, SignedRequest, StageDecision};

/// Replay bound: the payload timestamp must lie within the configured window
/// of server time, in either direction.
pub struct FreshnessStage;

impl GateStage for FreshnessStage {
    fn name(&self) -> &str {
        "freshness"
    }

    fn evaluate(
        &self,
        request: &SignedRequest,
        context: &GateContext<'_>,
    ) -> Result<StageDecision, GateError> {
        let window = TimeDelta::from_std(context.config.signature_window)
            .map_err(|e| GateError::Config(format!("signature window: {e}")))?;
        let skew = context.now.signed_duration_since(request.timestamp);

        if skew > window {
            Ok(StageDecision::fail(
                Rejection::SignatureExpired,
                format!("payload is {}s old", skew.num_seconds()),
            ))
        } else if -skew > window {
            Ok(StageDecision::fail(
                Rejection::SignatureExpired,
                format!("payload is {}s in the future", (-skew).num_seconds()),
            ))
        } else {
            Ok(StageDecision::Pass)
        }
    }
}
