use crate::error::GateError;
use crate::stage::{GateContext, GateStage, Rejection, SignedRequest, StageDecision};

/// Signature check over the exact signed bytes.
pub struct SignatureStage;

impl GateStage for SignatureStage {
    fn name(&self) -> &str {
        "signature"
    }

    fn evaluate(
        &self,
        request: &SignedRequest,
        _context: &GateContext<'_>,
    ) -> Result<StageDecision, GateError> {
        if slotwise_crypto::verify(
            request.json.as_bytes(),
            &request.signature,
            &request.public_key,
        ) {
            Ok(StageDecision::Pass)
        } else {
            Ok(StageDecision::fail(
                Rejection::InvalidSignature,
                "signature does not match payload and key",
            ))
        }
    }
}
