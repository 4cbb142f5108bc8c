//! Shared fixtures for this crate's tests.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use slotwise_crypto::{EncryptionKey, SignedEnvelope, SigningKey};
use slotwise_store::InMemoryDatabase;
use slotwise_types::{ActorKeyData, QueueData, Timestamped, TokenData};

use crate::config::GateConfig;
use crate::gate::TrustGate;
use crate::registry::KeyRegistry;
use crate::stage::SignedRequest;

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct Ping {
    pub timestamp: DateTime<Utc>,
}

impl Timestamped for Ping {
    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

pub(crate) struct Fixture {
    pub db: InMemoryDatabase,
    pub root: SigningKey,
    pub token_key: SigningKey,
    pub config: GateConfig,
}

impl Fixture {
    pub fn new() -> Self {
        let root = SigningKey::generate();
        let token_key = SigningKey::generate();
        let config = GateConfig::new(
            vec![root.verifying_key().to_bytes()],
            token_key.verifying_key().to_bytes(),
        );
        Self {
            db: InMemoryDatabase::new(),
            root,
            token_key,
            config,
        }
    }

    pub fn gate(&self) -> TrustGate {
        TrustGate::with_default_stages(self.config.clone())
    }

    pub fn register_mediator(&self) -> SigningKey {
        self.register_mediator_signed_by(&self.root)
    }

    pub fn register_mediator_signed_by(&self, authority: &SigningKey) -> SigningKey {
        let mediator = SigningKey::generate();
        let envelope = SignedEnvelope::sign(&key_data(&mediator, None), authority).unwrap();
        KeyRegistry::new(&self.db).add_mediator(&envelope).unwrap();
        mediator
    }

    pub fn register_provider(&self, mediator: &SigningKey) -> SigningKey {
        let provider = SigningKey::generate();
        let queue = QueueData {
            zip_code: "10115".into(),
            accessible: true,
        };
        let envelope = SignedEnvelope::sign(&key_data(&provider, Some(queue)), mediator).unwrap();
        KeyRegistry::new(&self.db).add_provider(&envelope).unwrap();
        provider
    }

    pub fn issue_token(&self, user: &SigningKey) -> SignedEnvelope<TokenData> {
        issue_token_with(&self.token_key, user)
    }
}

pub(crate) fn key_data(key: &SigningKey, queue_data: Option<QueueData>) -> ActorKeyData {
    ActorKeyData {
        signing: key.verifying_key().to_bytes(),
        encryption: EncryptionKey::generate().public_key_bytes(),
        queue_data,
        timestamp: Utc::now(),
    }
}

pub(crate) fn issue_token_with(server: &SigningKey, user: &SigningKey) -> SignedEnvelope<TokenData> {
    let data = TokenData {
        public_key: user.verifying_key().to_bytes(),
        hash: vec![0xab; 32],
        token: vec![0xcd; 32],
        n: 1,
        timestamp: Utc::now(),
    };
    SignedEnvelope::sign(&data, server).unwrap()
}

pub(crate) fn signed_request(key: &SigningKey, timestamp: DateTime<Utc>) -> SignedRequest {
    let envelope = SignedEnvelope::sign(&Ping { timestamp }, key).unwrap();
    SignedRequest::from_envelope(&envelope)
}
