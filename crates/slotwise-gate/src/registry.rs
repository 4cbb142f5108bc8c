//! Registered actor keys: mediators vouched for by the root authority and
//! providers vouched for by a mediator.

use slotwise_crypto::SignedEnvelope;
use slotwise_store::{Database, OptionalExt};
use slotwise_types::{ActorId, ActorKeyData};

use crate::error::GateError;

/// Table holding both registries.
pub const KEYS_TABLE: &str = "keys";
const MEDIATORS: &[u8] = b"mediators";
const PROVIDERS: &[u8] = b"providers";

/// A registered actor key: the actor's key data signed by its authority.
pub type ActorKey = SignedEnvelope<ActorKeyData>;

/// Read/write view over the mediator and provider key registries.
///
/// Entries are keyed by the actor ID, i.e. the hash of the signing key inside
/// the envelope. Holding an entry is not enough on its own: the envelope must
/// also verify and be signed by the right authority, which
/// [`KeyRegistry::verified_mediator`] and [`KeyRegistry::verified_provider`]
/// check every time.
#[derive(Clone, Copy)]
pub struct KeyRegistry<'a> {
    db: &'a dyn Database,
}

impl<'a> KeyRegistry<'a> {
    pub fn new(db: &'a dyn Database) -> Self {
        Self { db }
    }

    // -- mediators ----------------------------------------------------------

    pub fn add_mediator(&self, key: &ActorKey) -> Result<ActorId, GateError> {
        self.put(MEDIATORS, key)
    }

    pub fn mediator(&self, id: &ActorId) -> Result<Option<ActorKey>, GateError> {
        self.get(MEDIATORS, id)
    }

    pub fn mediators(&self) -> Result<Vec<ActorKey>, GateError> {
        self.all(MEDIATORS)
    }

    pub fn remove_mediator(&self, id: &ActorId) -> Result<bool, GateError> {
        Ok(self.db.map(KEYS_TABLE, MEDIATORS).del(id.as_bytes())?)
    }

    /// The mediator registered for `public_key`, if its key is root-signed.
    pub fn verified_mediator(
        &self,
        public_key: &[u8],
        root_keys: &[Vec<u8>],
    ) -> Result<Option<ActorKey>, GateError> {
        let Some(key) = self.mediator(&ActorId::derive(public_key))? else {
            return Ok(None);
        };
        if vouches_for(&key, public_key) && root_keys.iter().any(|k| k == key.public_key()) {
            Ok(Some(key))
        } else {
            tracing::warn!(
                mediator = %ActorId::derive(public_key).short_id(),
                "mediator key is not signed by a root key"
            );
            Ok(None)
        }
    }

    // -- providers ----------------------------------------------------------

    pub fn add_provider(&self, key: &ActorKey) -> Result<ActorId, GateError> {
        self.put(PROVIDERS, key)
    }

    pub fn provider(&self, id: &ActorId) -> Result<Option<ActorKey>, GateError> {
        self.get(PROVIDERS, id)
    }

    pub fn providers(&self) -> Result<Vec<ActorKey>, GateError> {
        self.all(PROVIDERS)
    }

    pub fn remove_provider(&self, id: &ActorId) -> Result<bool, GateError> {
        Ok(self.db.map(KEYS_TABLE, PROVIDERS).del(id.as_bytes())?)
    }

    /// The provider registered for `public_key`, if its key is signed by a
    /// mediator that is itself root-signed.
    pub fn verified_provider(
        &self,
        public_key: &[u8],
        root_keys: &[Vec<u8>],
    ) -> Result<Option<ActorKey>, GateError> {
        let Some(key) = self.provider(&ActorId::derive(public_key))? else {
            return Ok(None);
        };
        if !vouches_for(&key, public_key) {
            tracing::warn!(
                provider = %ActorId::derive(public_key).short_id(),
                "provider key entry does not verify"
            );
            return Ok(None);
        }
        match self.verified_mediator(key.public_key(), root_keys)? {
            Some(_) => Ok(Some(key)),
            None => {
                tracing::warn!(
                    provider = %ActorId::derive(public_key).short_id(),
                    "provider key is not signed by a registered mediator"
                );
                Ok(None)
            }
        }
    }

    /// The provider registered under `id`, if its chain to a root key holds.
    pub fn verified_provider_by_id(
        &self,
        id: &ActorId,
        root_keys: &[Vec<u8>],
    ) -> Result<Option<ActorKey>, GateError> {
        match self.provider(id)? {
            Some(key) => self.verified_provider(&key.data().signing, root_keys),
            None => Ok(None),
        }
    }

    /// Every registered provider whose chain to a root key holds.
    pub fn verified_providers(&self, root_keys: &[Vec<u8>]) -> Result<Vec<ActorKey>, GateError> {
        let mut verified = Vec::new();
        for key in self.providers()? {
            if let Some(key) = self.verified_provider(&key.data().signing, root_keys)? {
                verified.push(key);
            }
        }
        Ok(verified)
    }

    // -- internals ----------------------------------------------------------

    fn put(&self, registry: &[u8], key: &ActorKey) -> Result<ActorId, GateError> {
        let id = key.data().actor_id();
        let bytes = serde_json::to_vec(key).map_err(|e| GateError::CorruptEntry {
            actor: id.short_id(),
            message: e.to_string(),
        })?;
        self.db
            .map(KEYS_TABLE, registry)
            .set(id.as_bytes(), &bytes)?;
        tracing::info!(
            registry = %String::from_utf8_lossy(registry),
            actor = %id.short_id(),
            "actor key registered"
        );
        Ok(id)
    }

    fn get(&self, registry: &[u8], id: &ActorId) -> Result<Option<ActorKey>, GateError> {
        self.db
            .map(KEYS_TABLE, registry)
            .get(id.as_bytes())
            .optional()?
            .map(|bytes| decode(id, &bytes))
            .transpose()
    }

    fn all(&self, registry: &[u8]) -> Result<Vec<ActorKey>, GateError> {
        let entries = self.db.map(KEYS_TABLE, registry).get_all()?;
        let mut keys = Vec::with_capacity(entries.len());
        for (field, bytes) in entries {
            let id = ActorId::from_slice(&field).unwrap_or_else(|_| ActorId::derive(&field));
            match decode(&id, &bytes) {
                Ok(key) => keys.push(key),
                Err(e) => tracing::error!(error = %e, "skipping corrupt registry entry"),
            }
        }
        Ok(keys)
    }
}

fn decode(id: &ActorId, bytes: &[u8]) -> Result<ActorKey, GateError> {
    serde_json::from_slice(bytes).map_err(|e| GateError::CorruptEntry {
        actor: id.short_id(),
        message: e.to_string(),
    })
}

/// The envelope verifies and names `public_key` as the actor's signing key.
fn vouches_for(key: &ActorKey, public_key: &[u8]) -> bool {
    key.data().signing == public_key && key.verify().is_ok()
}

impl std::fmt::Debug for KeyRegistry<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyRegistry").finish_non_exhaustive()
    }
}
