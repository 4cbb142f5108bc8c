//! Shared fixtures for this crate's tests.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, TimeDelta, Utc};
use slotwise_crypto::{EncryptionKey, SignedEnvelope, SigningKey};
use slotwise_gate::KeyRegistry;
use slotwise_store::InMemoryDatabase;
use slotwise_types::{ActorId, ActorKeyData, Appointment, QueueData, Slot};

use crate::config::EngineConfig;
use crate::engine::{BookingEngine, PublishReport};
use crate::meter::NoopMeter;

pub(crate) struct Fixture {
    pub db: Arc<InMemoryDatabase>,
    pub mediator: SigningKey,
    pub config: EngineConfig,
}

pub(crate) struct ProviderHandle {
    pub id: ActorId,
    pub key: SigningKey,
}

impl Fixture {
    pub fn new() -> Self {
        Self::from_db(InMemoryDatabase::new())
    }

    pub fn with_lock_timeout(timeout: Duration) -> Self {
        Self::from_db(InMemoryDatabase::with_lock_timeout(timeout))
    }

    /// A root key in the engine config and one mediator it signed.
    fn from_db(db: InMemoryDatabase) -> Self {
        let root = SigningKey::generate();
        let mediator = SigningKey::generate();
        let db = Arc::new(db);
        let envelope = SignedEnvelope::sign(&key_data(&mediator, None), &root).unwrap();
        KeyRegistry::new(db.as_ref()).add_mediator(&envelope).unwrap();
        Self {
            db,
            mediator,
            config: EngineConfig {
                root_keys: vec![root.verifying_key().to_bytes()],
                ..EngineConfig::default()
            },
        }
    }

    pub fn engine(&self) -> BookingEngine<'_> {
        BookingEngine::new(self.db.as_ref(), &NoopMeter, &self.config)
    }

    /// Today plus `offset` days.
    pub fn day(&self, offset: i64) -> NaiveDate {
        Utc::now().date_naive() + TimeDelta::days(offset)
    }

    /// Register a provider placed at `zip_code`.
    pub fn provider(&self, zip_code: &str) -> ProviderHandle {
        let key = SigningKey::generate();
        let queue = QueueData {
            zip_code: zip_code.into(),
            accessible: false,
        };
        let envelope = SignedEnvelope::sign(&key_data(&key, Some(queue)), &self.mediator).unwrap();
        let id = KeyRegistry::new(self.db.as_ref())
            .add_provider(&envelope)
            .unwrap();
        ProviderHandle { id, key }
    }
}

impl ProviderHandle {
    /// A signed appointment at 10:00 UTC, `day_offset` days from today.
    pub fn appointment(
        &self,
        fx: &Fixture,
        id: &[u8],
        slots: &[&[u8]],
        day_offset: i64,
    ) -> SignedEnvelope<Appointment> {
        let timestamp = fx
            .day(day_offset)
            .and_hms_opt(10, 0, 0)
            .unwrap()
            .and_utc();
        let appointment = Appointment {
            id: id.to_vec(),
            public_key: self.key.verifying_key().to_bytes(),
            timestamp,
            duration: 30,
            properties: BTreeMap::from([("vaccine".to_string(), "mrna".to_string())]),
            slots: slots.iter().map(|s| Slot::new(s.to_vec())).collect(),
        };
        SignedEnvelope::sign(&appointment, &self.key).unwrap()
    }

    pub fn publish(&self, fx: &Fixture, id: &[u8], slots: &[&[u8]], day_offset: i64) -> PublishReport {
        fx.engine()
            .publish(&self.id, vec![self.appointment(fx, id, slots, day_offset)])
            .unwrap()
    }
}

fn key_data(key: &SigningKey, queue_data: Option<QueueData>) -> ActorKeyData {
    ActorKeyData {
        signing: key.verifying_key().to_bytes(),
        encryption: EncryptionKey::generate().public_key_bytes(),
        queue_data,
        timestamp: Utc::now(),
    }
}
