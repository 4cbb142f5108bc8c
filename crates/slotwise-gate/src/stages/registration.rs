use crate::error::GateError;
use crate::stage::{Authority, GateContext, GateStage, Rejection, SignedRequest, StageDecision};

/// Registry lookup stage.
///
/// Checks that the claimed public key belongs to the required authority:
/// a configured root key, a root-signed mediator, or a provider whose key was
/// signed by such a mediator. User and self-signed requests carry no
/// registered key and pass straight through.
pub struct RegistrationStage;

impl GateStage for RegistrationStage {
    fn name(&self) -> &str {
        "registration"
    }

    fn evaluate(
        &self,
        request: &SignedRequest,
        context: &GateContext<'_>,
    ) -> Result<StageDecision, GateError> {
        let root_keys = &context.config.root_keys;
        let registered = match context.authority {
            Authority::Root => context.config.is_root_key(&request.public_key),
            Authority::Mediator => context
                .registry
                .verified_mediator(&request.public_key, root_keys)?
                .is_some(),
            Authority::Provider => context
                .registry
                .verified_provider(&request.public_key, root_keys)?
                .is_some(),
            Authority::User | Authority::SelfSigned => true,
        };

        if registered {
            Ok(StageDecision::Pass)
        } else {
            Ok(StageDecision::fail(
                Rejection::NotAuthorized,
                format!("key is not a registered {} key", context.authority),
            ))
        }
    }
}
