//! Sequential priority tokens.
//!
//! A single counter is incremented per issued token and the counter value is
//! HMAC-signed with a server secret. Only the counter is persisted; the token
//! for any `n` can be recomputed by anyone holding the secret, so independent
//! backends that share a secret agree on tokens without coordination.

use slotwise_crypto::{hmac_sha256, verify_hmac};
use slotwise_store::{Database, OptionalExt};

use crate::error::{AdmissionError, AdmissionResult};

pub const PRIORITY_TABLE: &str = "priorityToken";
const PRIMARY: &[u8] = b"primary";
const LOCK: &str = "priorityToken";

/// A freshly issued token with its queue position.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PriorityToken {
    pub n: i64,
    pub token: [u8; 32],
}

/// Issues priority tokens from the shared counter.
pub struct PriorityTokens<'a> {
    db: &'a dyn Database,
    secret: &'a [u8],
}

impl<'a> PriorityTokens<'a> {
    pub fn new(db: &'a dyn Database, secret: &'a [u8]) -> Self {
        Self { db, secret }
    }

    /// The token for counter value `n`.
    pub fn derive(secret: &[u8], n: i64) -> AdmissionResult<[u8; 32]> {
        Ok(hmac_sha256(secret, &n.to_be_bytes())?)
    }

    /// Increment the counter and sign the new value.
    pub fn next(&self) -> AdmissionResult<PriorityToken> {
        let _guard = self.db.lock(LOCK)?;
        let n = self.current()? + 1;
        self.db
            .value(PRIORITY_TABLE, PRIMARY)
            .set(&n.to_be_bytes(), None)?;
        let token = Self::derive(self.secret, n)?;
        tracing::debug!(n, "priority token issued");
        Ok(PriorityToken { n, token })
    }

    /// Number of tokens issued so far.
    pub fn current(&self) -> AdmissionResult<i64> {
        match self.db.value(PRIORITY_TABLE, PRIMARY).get().optional()? {
            None => Ok(0),
            Some(bytes) => {
                let raw: [u8; 8] = bytes
                    .as_slice()
                    .try_into()
                    .map_err(|_| AdmissionError::CorruptCounter(bytes.len()))?;
                Ok(i64::from_be_bytes(raw))
            }
        }
    }

    /// Whether `token` is the genuine token for position `n`.
    pub fn verify(&self, n: i64, token: &[u8]) -> bool {
        verify_hmac(self.secret, &n.to_be_bytes(), token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotwise_store::InMemoryDatabase;
    use std::sync::Arc;
    use std::thread;

    const SECRET: &[u8] = b"priority-secret";

    #[test]
    fn counter_is_sequential() {
        let db = InMemoryDatabase::new();
        let tokens = PriorityTokens::new(&db, SECRET);
        assert_eq!(tokens.current().unwrap(), 0);
        assert_eq!(tokens.next().unwrap().n, 1);
        assert_eq!(tokens.next().unwrap().n, 2);
        assert_eq!(tokens.current().unwrap(), 2);
    }

    #[test]
    fn same_counter_and_secret_give_same_token() {
        let a = InMemoryDatabase::new();
        let b = InMemoryDatabase::new();
        let from_a = PriorityTokens::new(&a, SECRET).next().unwrap();
        let from_b = PriorityTokens::new(&b, SECRET).next().unwrap();
        assert_eq!(from_a, from_b);
        assert_eq!(from_a.token, PriorityTokens::derive(SECRET, 1).unwrap());
    }

    #[test]
    fn different_secret_gives_different_token() {
        assert_ne!(
            PriorityTokens::derive(b"one", 7).unwrap(),
            PriorityTokens::derive(b"two", 7).unwrap()
        );
        assert_ne!(
            PriorityTokens::derive(SECRET, 7).unwrap(),
            PriorityTokens::derive(SECRET, 8).unwrap()
        );
    }

    #[test]
    fn tokens_verify_against_their_position() {
        let db = InMemoryDatabase::new();
        let tokens = PriorityTokens::new(&db, SECRET);
        let issued = tokens.next().unwrap();
        assert!(tokens.verify(issued.n, &issued.token));
        assert!(!tokens.verify(issued.n + 1, &issued.token));
    }

    #[test]
    fn corrupt_counter_is_reported() {
        let db = InMemoryDatabase::new();
        Database::value_set(&db, PRIORITY_TABLE, PRIMARY, b"xyz", None).unwrap();
        let err = PriorityTokens::new(&db, SECRET).current().unwrap_err();
        assert!(matches!(err, AdmissionError::CorruptCounter(3)));
    }

    #[test]
    fn concurrent_issuance_never_repeats() {
        let db: Arc<dyn Database> = Arc::new(InMemoryDatabase::with_lock_timeout(
            std::time::Duration::from_secs(5),
        ));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let db = Arc::clone(&db);
                thread::spawn(move || {
                    (0..10)
                        .map(|_| PriorityTokens::new(db.as_ref(), SECRET).next().unwrap().n)
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut all: Vec<i64> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        all.sort_unstable();
        assert_eq!(all, (1..=80).collect::<Vec<_>>());
    }
}
