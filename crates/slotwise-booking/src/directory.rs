//! Provider data: encrypted intake records and the public listing shown in
//! search results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use slotwise_crypto::SignedEnvelope;
use slotwise_store::{Database, OptionalExt};
use slotwise_types::{ActorId, EncryptedData, PublicProviderData};

use crate::error::BookingResult;

pub const PROVIDER_DATA_TABLE: &str = "providerData";
const PENDING: &[u8] = b"pending";
const VERIFIED: &[u8] = b"verified";
const PUBLIC: &[u8] = b"public";

/// Encrypted provider data as submitted or as confirmed by a mediator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderRecord {
    pub id: ActorId,
    pub encrypted_data: EncryptedData,
    pub updated_at: DateTime<Utc>,
}

pub struct ProviderDirectory<'a> {
    db: &'a dyn Database,
}

impl<'a> ProviderDirectory<'a> {
    pub fn new(db: &'a dyn Database) -> Self {
        Self { db }
    }

    /// File (or replace) a provider's submission for mediator review.
    pub fn store_pending(&self, id: &ActorId, data: EncryptedData) -> BookingResult<()> {
        let record = ProviderRecord {
            id: *id,
            encrypted_data: data,
            updated_at: Utc::now(),
        };
        self.db
            .map(PROVIDER_DATA_TABLE, PENDING)
            .set(id.as_bytes(), &serde_json::to_vec(&record)?)?;
        tracing::info!(provider = %id.short_id(), "provider data submitted");
        Ok(())
    }

    /// Up to `limit` pending submissions, oldest first.
    pub fn pending(&self, limit: usize) -> BookingResult<Vec<ProviderRecord>> {
        let mut records = self.records(PENDING)?;
        records.sort_by(|a, b| (a.updated_at, a.id).cmp(&(b.updated_at, b.id)));
        records.truncate(limit);
        Ok(records)
    }

    /// Mark a provider verified: the mediator's re-encrypted record replaces
    /// the pending submission, and the signed public listing is stored.
    pub fn confirm(
        &self,
        id: &ActorId,
        verified: EncryptedData,
        public: &SignedEnvelope<PublicProviderData>,
    ) -> BookingResult<()> {
        let record = ProviderRecord {
            id: *id,
            encrypted_data: verified,
            updated_at: Utc::now(),
        };
        self.db
            .map(PROVIDER_DATA_TABLE, VERIFIED)
            .set(id.as_bytes(), &serde_json::to_vec(&record)?)?;
        self.db
            .map(PROVIDER_DATA_TABLE, PUBLIC)
            .set(id.as_bytes(), &serde_json::to_vec(public)?)?;
        self.db.map(PROVIDER_DATA_TABLE, PENDING).del(id.as_bytes())?;
        tracing::info!(provider = %id.short_id(), "provider data verified");
        Ok(())
    }

    pub fn verified(&self, id: &ActorId) -> BookingResult<Option<ProviderRecord>> {
        self.db
            .map(PROVIDER_DATA_TABLE, VERIFIED)
            .get(id.as_bytes())
            .optional()?
            .map(|bytes| serde_json::from_slice(&bytes).map_err(Into::into))
            .transpose()
    }

    pub fn public_data(&self, id: &ActorId) -> BookingResult<Option<SignedEnvelope<PublicProviderData>>> {
        self.db
            .map(PROVIDER_DATA_TABLE, PUBLIC)
            .get(id.as_bytes())
            .optional()?
            .map(|bytes| serde_json::from_slice(&bytes).map_err(Into::into))
            .transpose()
    }

    /// Drop the public listing; the verified record stays for audit.
    pub fn unlist(&self, id: &ActorId) -> BookingResult<bool> {
        Ok(self.db.map(PROVIDER_DATA_TABLE, PUBLIC).del(id.as_bytes())?)
    }

    fn records(&self, which: &[u8]) -> BookingResult<Vec<ProviderRecord>> {
        let entries = self.db.map(PROVIDER_DATA_TABLE, which).get_all()?;
        let mut records = Vec::with_capacity(entries.len());
        for bytes in entries.values() {
            match serde_json::from_slice(bytes) {
                Ok(record) => records.push(record),
                Err(e) => tracing::error!(error = %e, "skipping corrupt provider record"),
            }
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotwise_crypto::SigningKey;
    use slotwise_store::InMemoryDatabase;

    fn data(tag: u8) -> EncryptedData {
        EncryptedData {
            iv: vec![tag; 12],
            data: vec![tag; 40],
            public_key: vec![tag; 65],
        }
    }

    fn listing(mediator: &SigningKey) -> SignedEnvelope<PublicProviderData> {
        let public = PublicProviderData {
            name: "Praxis Mitte".into(),
            street: "Invalidenstr. 1".into(),
            city: "Berlin".into(),
            zip_code: "10115".into(),
            description: None,
            accessible: true,
        };
        SignedEnvelope::sign(&public, mediator).unwrap()
    }

    #[test]
    fn pending_respects_limit() {
        let db = InMemoryDatabase::new();
        let dir = ProviderDirectory::new(&db);
        for i in 0..5u8 {
            dir.store_pending(&ActorId::from_raw([i; 32]), data(i)).unwrap();
        }
        assert_eq!(dir.pending(3).unwrap().len(), 3);
        assert_eq!(dir.pending(10).unwrap().len(), 5);
    }

    #[test]
    fn confirm_moves_pending_to_verified() {
        let db = InMemoryDatabase::new();
        let dir = ProviderDirectory::new(&db);
        let id = ActorId::from_raw([7; 32]);
        dir.store_pending(&id, data(1)).unwrap();
        assert!(dir.verified(&id).unwrap().is_none());

        let mediator = SigningKey::generate();
        dir.confirm(&id, data(2), &listing(&mediator)).unwrap();

        assert!(dir.pending(10).unwrap().is_empty());
        assert_eq!(dir.verified(&id).unwrap().unwrap().encrypted_data, data(2));
        let public = dir.public_data(&id).unwrap().unwrap();
        assert_eq!(public.data().zip_code, "10115");
        assert!(public.verify_with(&mediator.verifying_key()).is_ok());
    }

    #[test]
    fn unlist_removes_public_listing_only() {
        let db = InMemoryDatabase::new();
        let dir = ProviderDirectory::new(&db);
        let id = ActorId::from_raw([7; 32]);
        dir.confirm(&id, data(2), &listing(&SigningKey::generate())).unwrap();
        assert!(dir.unlist(&id).unwrap());
        assert!(dir.public_data(&id).unwrap().is_none());
        assert!(dir.verified(&id).unwrap().is_some());
    }
}
