//! Shared fixtures for this crate's tests.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, TimeDelta, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use slotwise_crypto::{EncryptionKey, SignedEnvelope, SigningKey};
use slotwise_store::InMemoryDatabase;
use slotwise_types::{
    ActorId, ActorKeyData, Appointment, EncryptedData, PublicProviderData, QueueData, Slot,
    TokenData,
};

use crate::params::*;
use crate::service::AppointmentsService;
use crate::settings::Settings;

pub(crate) struct Harness {
    pub db: Arc<InMemoryDatabase>,
    pub root: SigningKey,
    pub token_key: SigningKey,
    pub service: AppointmentsService,
}

pub(crate) struct Provider {
    pub id: ActorId,
    pub key: SigningKey,
}

pub(crate) struct User {
    pub key: SigningKey,
    pub token: SignedEnvelope<TokenData>,
}

pub(crate) fn sign<T: Serialize + DeserializeOwned>(params: &T, key: &SigningKey) -> SignedEnvelope<T> {
    SignedEnvelope::sign(params, key).unwrap()
}

pub(crate) fn now() -> DateTime<Utc> {
    Utc::now()
}

pub(crate) fn day(offset: i64) -> NaiveDate {
    Utc::now().date_naive() + TimeDelta::days(offset)
}

impl Harness {
    /// Codes disabled for both actor classes.
    pub fn new() -> Self {
        Self::with_settings(|s| {
            s.codes.user.enabled = false;
            s.codes.provider.enabled = false;
        })
    }

    pub fn with_settings(adjust: impl FnOnce(&mut Settings)) -> Self {
        let root = SigningKey::generate();
        let token_key = SigningKey::generate();
        let mut settings = Settings::new(
            vec![root.verifying_key().to_bytes()],
            token_key.to_bytes(),
            EncryptionKey::generate().public_key_bytes(),
            vec![0x42; 32],
        );
        adjust(&mut settings);
        let db = Arc::new(InMemoryDatabase::with_lock_timeout(settings.lock_timeout()));
        let service = AppointmentsService::new(db.clone(), settings).unwrap();
        Self {
            db,
            root,
            token_key,
            service,
        }
    }

    pub fn register_mediator(&self) -> SigningKey {
        let mediator = SigningKey::generate();
        let params = AddMediatorPublicKeysParams {
            signed_key_data: sign(&key_data(&mediator, None), &self.root),
            timestamp: now(),
        };
        self.service
            .add_mediator_public_keys(sign(&params, &self.root))
            .unwrap();
        mediator
    }

    pub fn confirm_provider(&self, mediator: &SigningKey, zip_code: &str) -> Provider {
        self.confirm_provider_key(mediator, SigningKey::generate(), zip_code)
    }

    pub fn confirm_provider_key(&self, mediator: &SigningKey, key: SigningKey, zip_code: &str) -> Provider {
        let queue = QueueData {
            zip_code: zip_code.into(),
            accessible: true,
        };
        let listing = PublicProviderData {
            name: format!("Impfzentrum {zip_code}"),
            street: "Hauptstr. 1".into(),
            city: "Berlin".into(),
            zip_code: zip_code.into(),
            description: None,
            accessible: true,
        };
        let params = ConfirmProviderParams {
            signed_key_data: sign(&key_data(&key, Some(queue)), mediator),
            encrypted_provider_data: EncryptedData::default(),
            signed_public_provider_data: sign(&listing, mediator),
            timestamp: now(),
        };
        let id = self.service.confirm_provider(sign(&params, mediator)).unwrap();
        Provider { id, key }
    }

    /// A mediator plus one confirmed provider at `zip_code`.
    pub fn provider(&self, zip_code: &str) -> Provider {
        let mediator = self.register_mediator();
        self.confirm_provider(&mediator, zip_code)
    }

    pub fn user(&self) -> User {
        let key = SigningKey::generate();
        let token = self.request_token(&key, None).unwrap();
        User { key, token }
    }

    pub fn request_token(
        &self,
        key: &SigningKey,
        code: Option<&[u8]>,
    ) -> crate::ServiceResult<SignedEnvelope<TokenData>> {
        let params = GetTokenParams {
            hash: vec![0xaa; 32],
            code: code.map(<[u8]>::to_vec),
            timestamp: now(),
        };
        self.service.get_token(sign(&params, key))
    }

    pub fn publish(&self, provider: &Provider, id: &[u8], slots: &[&[u8]]) {
        let appointment = Appointment {
            id: id.to_vec(),
            public_key: provider.key.verifying_key().to_bytes(),
            timestamp: day(1).and_hms_opt(9, 0, 0).unwrap().and_utc(),
            duration: 15,
            properties: BTreeMap::new(),
            slots: slots.iter().map(|s| Slot::new(s.to_vec())).collect(),
        };
        let params = PublishAppointmentsParams {
            appointments: vec![sign(&appointment, &provider.key)],
            timestamp: now(),
        };
        self.service
            .publish_appointments(sign(&params, &provider.key))
            .unwrap();
    }

    pub fn book(&self, user: &User, provider: &Provider, id: &[u8]) -> crate::ServiceResult<slotwise_types::Booking> {
        self.book_with(&user.key, &user.token, provider, id)
    }

    pub fn book_with(
        &self,
        key: &SigningKey,
        token: &SignedEnvelope<TokenData>,
        provider: &Provider,
        id: &[u8],
    ) -> crate::ServiceResult<slotwise_types::Booking> {
        let params = BookAppointmentParams {
            provider_id: provider.id,
            id: id.to_vec(),
            encrypted_data: EncryptedData {
                iv: vec![1; 12],
                data: vec![2; 48],
                public_key: vec![3; 65],
            },
            signed_token_data: token.clone(),
            timestamp: now(),
        };
        self.service.book_appointment(sign(&params, key))
    }

    pub fn cancel(&self, user: &User, provider: &Provider, id: &[u8]) -> crate::ServiceResult<()> {
        let params = CancelAppointmentParams {
            provider_id: provider.id,
            id: id.to_vec(),
            signed_token_data: user.token.clone(),
            timestamp: now(),
        };
        self.service.cancel_appointment(sign(&params, &user.key))
    }
}

pub(crate) fn key_data(key: &SigningKey, queue_data: Option<QueueData>) -> ActorKeyData {
    ActorKeyData {
        signing: key.verifying_key().to_bytes(),
        encryption: EncryptionKey::generate().public_key_bytes(),
        queue_data,
        timestamp: now(),
    }
}
