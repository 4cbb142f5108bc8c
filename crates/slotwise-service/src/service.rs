use std::sync::Arc;

use chrono::Utc;
use slotwise_admission::{CodeBook, PriorityTokens};
use slotwise_booking::{
    BookingEngine, BookingRequest, DistanceIndex, EngineConfig, Meter, ProviderAppointments,
    ProviderDirectory, ProviderRecord, PublishReport, StoreMeter, StoredAppointment,
};
use slotwise_crypto::{SignedEnvelope, SigningKey};
use slotwise_gate::{Authority, Decision, KeyRegistry, SignedRequest, TrustGate};
use slotwise_store::Database;
use slotwise_types::{ActorId, Booking, CodeActor, PublicAppointment, Timestamped, TokenData};

use crate::error::{ServiceError, ServiceResult};
use crate::params::*;
use crate::settings::{Settings, SettingsError};

/// Upper bound on pending provider records returned at once.
pub const MAX_PENDING_LIMIT: usize = 1000;

/// One handler per operation. Every signed request is checked by the trust
/// gate before any state is read or written.
///
/// The service holds no mutable state of its own; all of it lives in the
/// database, so handlers may run concurrently from any number of threads.
pub struct AppointmentsService {
    db: Arc<dyn Database>,
    gate: TrustGate,
    settings: Settings,
    engine_config: EngineConfig,
    token_key: SigningKey,
    meter: Arc<dyn Meter>,
}

impl AppointmentsService {
    pub fn new(db: Arc<dyn Database>, settings: Settings) -> Result<Self, SettingsError> {
        settings.validate()?;
        let token_key = settings.token_signing_key()?;
        let gate = TrustGate::with_default_stages(
            settings.gate_config(token_key.verifying_key().to_bytes()),
        );
        let meter: Arc<dyn Meter> = Arc::new(StoreMeter::new(Arc::clone(&db)));
        Ok(Self {
            db,
            gate,
            engine_config: settings.engine_config(),
            settings,
            token_key,
            meter,
        })
    }

    /// Replace the default [`StoreMeter`].
    pub fn with_meter(mut self, meter: Arc<dyn Meter>) -> Self {
        self.meter = meter;
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn database(&self) -> &Arc<dyn Database> {
        &self.db
    }

    // -----------------------------------------------------------------------
    // Root operations
    // -----------------------------------------------------------------------

    pub fn add_mediator_public_keys(
        &self,
        request: SignedEnvelope<AddMediatorPublicKeysParams>,
    ) -> ServiceResult<ActorId> {
        self.authorize(Authority::Root, &request, None)?;
        let key = &request.data().signed_key_data;
        if !self.gate.config().is_root_key(key.public_key()) {
            return Err(ServiceError::NotAuthorized(
                "mediator key is not signed by a root key".into(),
            ));
        }
        key.verify()
            .map_err(|_| ServiceError::InvalidSignature("bad mediator key signature".into()))?;
        let id = KeyRegistry::new(self.db.as_ref()).add_mediator(key)?;
        tracing::info!(mediator = %id.short_id(), "mediator registered");
        Ok(id)
    }

    pub fn upload_distances(
        &self,
        request: SignedEnvelope<UploadDistancesParams>,
    ) -> ServiceResult<usize> {
        self.authorize(Authority::Root, &request, None)?;
        let params = request.data();
        if let Some(edge) = params
            .distances
            .iter()
            .find(|e| !e.distance.is_finite() || e.distance < 0.0)
        {
            return Err(ServiceError::InvalidParams(format!(
                "invalid distance {} between {} and {}",
                edge.distance, edge.from, edge.to
            )));
        }
        Ok(DistanceIndex::new(self.db.as_ref()).add_edges(params.kind, &params.distances)?)
    }

    pub fn add_codes(&self, request: SignedEnvelope<AddCodesParams>) -> ServiceResult<usize> {
        self.authorize(Authority::Root, &request, None)?;
        let params = request.data();
        let added = self.code_book(params.actor).add_codes(params.codes.as_slice())?;
        tracing::info!(actor = %params.actor, added, "codes provisioned");
        Ok(added)
    }

    pub fn reset_db(&self, request: SignedEnvelope<ResetDbParams>) -> ServiceResult<()> {
        self.authorize(Authority::Root, &request, None)?;
        if !self.settings.allow_reset {
            return Err(ServiceError::NotAuthorized("reset is disabled".into()));
        }
        self.db.reset()?;
        tracing::warn!("database reset");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Mediator operations
    // -----------------------------------------------------------------------

    pub fn get_pending_provider_data(
        &self,
        request: SignedEnvelope<GetPendingProviderDataParams>,
    ) -> ServiceResult<Vec<ProviderRecord>> {
        self.authorize(Authority::Mediator, &request, None)?;
        let limit = request.data().limit.min(MAX_PENDING_LIMIT);
        Ok(ProviderDirectory::new(self.db.as_ref()).pending(limit)?)
    }

    /// Register a provider: its mediator-signed key goes into the provider
    /// registry and its listing becomes searchable. Re-confirming replaces
    /// the previous key.
    pub fn confirm_provider(
        &self,
        request: SignedEnvelope<ConfirmProviderParams>,
    ) -> ServiceResult<ActorId> {
        let mediator = self.authorize(Authority::Mediator, &request, None)?;
        let params = request.data();
        ensure_signed_by(&params.signed_key_data, request.public_key(), "provider key")?;
        ensure_signed_by(
            &params.signed_public_provider_data,
            request.public_key(),
            "public provider data",
        )?;
        if params.signed_key_data.data().queue_data.is_none() {
            return Err(ServiceError::InvalidParams(
                "provider key carries no queue data".into(),
            ));
        }

        let id = KeyRegistry::new(self.db.as_ref()).add_provider(&params.signed_key_data)?;
        ProviderDirectory::new(self.db.as_ref()).confirm(
            &id,
            params.encrypted_provider_data.clone(),
            &params.signed_public_provider_data,
        )?;
        tracing::info!(
            provider = %id.short_id(),
            mediator = %mediator.short_id(),
            "provider confirmed"
        );
        Ok(id)
    }

    pub fn revoke_provider(&self, request: SignedEnvelope<RevokeProviderParams>) -> ServiceResult<()> {
        let mediator = self.authorize(Authority::Mediator, &request, None)?;
        let provider = request.data().provider_id;
        if !KeyRegistry::new(self.db.as_ref()).remove_provider(&provider)? {
            return Err(ServiceError::NotFound("provider not registered".into()));
        }
        ProviderDirectory::new(self.db.as_ref()).unlist(&provider)?;
        tracing::info!(
            provider = %provider.short_id(),
            mediator = %mediator.short_id(),
            "provider revoked"
        );
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Provider operations
    // -----------------------------------------------------------------------

    /// Submit encrypted provider data for review; signed by the provider's
    /// fresh key, which is not registered yet.
    pub fn store_provider_data(
        &self,
        request: SignedEnvelope<StoreProviderDataParams>,
    ) -> ServiceResult<()> {
        let provider = self.authorize(Authority::SelfSigned, &request, None)?;
        let params = request.data();
        self.consume_code(CodeActor::Provider, params.code.as_deref())?;
        ProviderDirectory::new(self.db.as_ref()).store_pending(&provider, params.encrypted_data.clone())?;
        Ok(())
    }

    pub fn check_provider_data(
        &self,
        request: SignedEnvelope<CheckProviderDataParams>,
    ) -> ServiceResult<ProviderRecord> {
        let provider = self.authorize(Authority::SelfSigned, &request, None)?;
        ProviderDirectory::new(self.db.as_ref())
            .verified(&provider)?
            .ok_or_else(|| ServiceError::NotFound("provider data not verified".into()))
    }

    pub fn publish_appointments(
        &self,
        request: SignedEnvelope<PublishAppointmentsParams>,
    ) -> ServiceResult<PublishReport> {
        let provider = self.authorize(Authority::Provider, &request, None)?;
        Ok(self
            .engine()
            .publish(&provider, request.into_data().appointments)?)
    }

    pub fn get_provider_appointments(
        &self,
        request: SignedEnvelope<GetProviderAppointmentsParams>,
    ) -> ServiceResult<Vec<StoredAppointment>> {
        let provider = self.authorize(Authority::Provider, &request, None)?;
        let params = request.data();
        Ok(self
            .engine()
            .get_provider_appointments(&provider, params.from, params.to)?)
    }

    // -----------------------------------------------------------------------
    // User operations
    // -----------------------------------------------------------------------

    /// Issue the next priority token, bound to the key that signed the
    /// request.
    pub fn get_token(
        &self,
        request: SignedEnvelope<GetTokenParams>,
    ) -> ServiceResult<SignedEnvelope<TokenData>> {
        let user = self.authorize(Authority::SelfSigned, &request, None)?;
        let params = request.data();
        self.consume_code(CodeActor::User, params.code.as_deref())?;

        let issued = PriorityTokens::new(self.db.as_ref(), &self.settings.priority_token_secret).next()?;
        let data = TokenData {
            public_key: request.public_key().to_vec(),
            hash: params.hash.clone(),
            token: issued.token.to_vec(),
            n: issued.n,
            timestamp: Utc::now(),
        };
        let signed = SignedEnvelope::sign(&data, &self.token_key)?;
        tracing::debug!(user = %user.short_id(), n = issued.n, "user token issued");
        Ok(signed)
    }

    pub fn book_appointment(
        &self,
        request: SignedEnvelope<BookAppointmentParams>,
    ) -> ServiceResult<Booking> {
        let params = request.data();
        self.authorize(Authority::User, &request, Some(&params.signed_token_data))?;
        let token = params.signed_token_data.data();
        let tokens = PriorityTokens::new(self.db.as_ref(), &self.settings.priority_token_secret);
        if !tokens.verify(token.n, &token.token) {
            tracing::warn!(n = token.n, "priority token does not verify");
            return Err(ServiceError::NotAuthorized("invalid priority token".into()));
        }

        Ok(self.engine().book(BookingRequest {
            provider: params.provider_id,
            appointment_id: params.id.clone(),
            user_public_key: request.public_key().to_vec(),
            token: token.token.clone(),
            encrypted_data: params.encrypted_data.clone(),
        })?)
    }

    pub fn cancel_appointment(
        &self,
        request: SignedEnvelope<CancelAppointmentParams>,
    ) -> ServiceResult<()> {
        let params = request.data();
        self.authorize(Authority::User, &request, Some(&params.signed_token_data))?;
        Ok(self.engine().cancel(
            &params.provider_id,
            &params.id,
            &params.signed_token_data.data().token,
        )?)
    }

    // -----------------------------------------------------------------------
    // Anonymous lookups
    // -----------------------------------------------------------------------

    pub fn get_appointments_by_zip_code(
        &self,
        params: GetAppointmentsByZipCodeParams,
    ) -> ServiceResult<Vec<ProviderAppointments>> {
        Ok(self.engine().get_appointments_by_zip_code(
            &params.zip_code,
            params.radius,
            params.from,
            params.to,
        )?)
    }

    pub fn get_appointment(&self, params: GetAppointmentParams) -> ServiceResult<PublicAppointment> {
        Ok(self.engine().get_appointment(&params.provider_id, &params.id)?)
    }

    pub fn get_keys(&self) -> ServiceResult<Keys> {
        Ok(Keys {
            root_keys: self.settings.root_keys.clone(),
            token_key: self.token_key.verifying_key().to_bytes(),
            provider_data_key: self.settings.provider_data_key.clone(),
            mediators: KeyRegistry::new(self.db.as_ref()).mediators()?,
        })
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn engine(&self) -> BookingEngine<'_> {
        BookingEngine::new(self.db.as_ref(), self.meter.as_ref(), &self.engine_config)
    }

    fn code_book(&self, actor: CodeActor) -> CodeBook<'_> {
        CodeBook::new(self.db.as_ref(), actor, self.settings.codes.for_actor(actor))
    }

    fn consume_code(&self, actor: CodeActor, code: Option<&[u8]>) -> ServiceResult<()> {
        if !self.settings.codes.for_actor(actor).enabled {
            return Ok(());
        }
        let code =
            code.ok_or_else(|| ServiceError::NotAuthorized(format!("{actor} code required")))?;
        Ok(self.code_book(actor).consume(code)?)
    }

    /// Run the trust gate and return the signer on acceptance.
    fn authorize<T: Timestamped>(
        &self,
        authority: Authority,
        request: &SignedEnvelope<T>,
        token: Option<&SignedEnvelope<TokenData>>,
    ) -> ServiceResult<ActorId> {
        let mut signed = SignedRequest::from_envelope(request);
        if let Some(token) = token {
            signed = signed.with_token(token.clone());
        }
        let result = self.gate.evaluate(self.db.as_ref(), authority, &signed)?;
        match result.decision {
            Decision::Accepted => Ok(result.signer),
            Decision::Rejected { rejection, reason } => {
                Err(ServiceError::rejected(rejection, reason))
            }
        }
    }
}

/// A nested envelope must be signed by the requester and verify.
fn ensure_signed_by<T>(
    envelope: &SignedEnvelope<T>,
    requester_key: &[u8],
    what: &str,
) -> ServiceResult<()> {
    if envelope.public_key() != requester_key {
        return Err(ServiceError::NotAuthorized(format!(
            "{what} is not signed by the requester"
        )));
    }
    envelope
        .verify()
        .map_err(|_| ServiceError::InvalidSignature(format!("bad {what} signature")))
}
