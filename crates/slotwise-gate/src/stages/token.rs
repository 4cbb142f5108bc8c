use slotwise_crypto::VerifyingKey;

use crate::error::GateError;
use crate::stage::{Authority, GateContext, GateStage, Rejection, SignedRequest, StageDecision};

/// User token binding.
///
/// A user may only act if the request carries a token signed by this
/// server's token key, and the request itself is signed by the key baked
/// into that token.
pub struct TokenBindingStage;

impl GateStage for TokenBindingStage {
    fn name(&self) -> &str {
        "token"
    }

    fn applies_to(&self, authority: Authority) -> bool {
        authority == Authority::User
    }

    fn evaluate(
        &self,
        request: &SignedRequest,
        context: &GateContext<'_>,
    ) -> Result<StageDecision, GateError> {
        let Some(token) = &request.token else {
            return Ok(StageDecision::fail(
                Rejection::NotAuthorized,
                "no signed token supplied",
            ));
        };

        let server_key = VerifyingKey::from_bytes(&context.config.token_key)
            .map_err(|e| GateError::Config(format!("token key: {e}")))?;
        if token.verify_with(&server_key).is_err() {
            return Ok(StageDecision::fail(
                Rejection::NotAuthorized,
                "token was not issued by this server",
            ));
        }

        if token.data().public_key != request.public_key {
            return Ok(StageDecision::fail(
                Rejection::NotAuthorized,
                "request key does not match token key",
            ));
        }

        Ok(StageDecision::Pass)
    }
}
