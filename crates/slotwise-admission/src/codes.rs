//! Provisioned signup codes with bounded reuse.

use serde::{Deserialize, Serialize};
use slotwise_store::{Database, OptionalExt};
use slotwise_types::CodeActor;

use crate::error::{AdmissionError, AdmissionResult};

/// Set of provisioned codes, one key per actor class.
pub const CODES_TABLE: &str = "codes";
/// Use counts per code, one sorted set per actor class.
pub const CODE_SCORES_TABLE: &str = "codeScores";

/// Code checking for one actor class.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodeSettings {
    /// When `false`, any code (or none) is accepted.
    pub enabled: bool,
    /// How many times a code may be reused after its first use.
    pub reuse_limit: u32,
}

impl Default for CodeSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            reuse_limit: 0,
        }
    }
}

/// The codes of one actor class.
///
/// Each successful use bumps the code's counter. The use that pushes the
/// counter past `reuse_limit` still succeeds but deletes the code, so a code
/// admits exactly `reuse_limit + 1` uses.
pub struct CodeBook<'a> {
    db: &'a dyn Database,
    actor: CodeActor,
    settings: CodeSettings,
}

impl<'a> CodeBook<'a> {
    pub fn new(db: &'a dyn Database, actor: CodeActor, settings: CodeSettings) -> Self {
        Self {
            db,
            actor,
            settings,
        }
    }

    /// Provision codes; returns how many were new.
    pub fn add_codes<C: AsRef<[u8]>>(&self, codes: &[C]) -> AdmissionResult<usize> {
        let set = self.db.set(CODES_TABLE, self.key());
        let mut added = 0;
        for code in codes {
            if set.add(code.as_ref())? {
                added += 1;
            }
        }
        tracing::info!(actor = %self.actor, added, total = codes.len(), "codes provisioned");
        Ok(added)
    }

    /// Whether `code` is currently provisioned.
    pub fn contains(&self, code: &[u8]) -> AdmissionResult<bool> {
        Ok(self.db.set(CODES_TABLE, self.key()).has(code)?)
    }

    /// Successful uses recorded for `code` so far.
    pub fn uses(&self, code: &[u8]) -> AdmissionResult<i64> {
        Ok(self
            .db
            .sorted_set(CODE_SCORES_TABLE, self.key())
            .score(code)
            .optional()?
            .unwrap_or(0))
    }

    /// Spend one use of `code`.
    ///
    /// Skipped entirely when code checking is disabled for this class.
    pub fn consume(&self, code: &[u8]) -> AdmissionResult<()> {
        if !self.settings.enabled {
            tracing::debug!(actor = %self.actor, "code checks disabled");
            return Ok(());
        }

        let _guard = self.db.lock(&format!("codes:{}", self.actor))?;
        let codes = self.db.set(CODES_TABLE, self.key());
        if !codes.has(code)? {
            return Err(AdmissionError::InvalidCode { actor: self.actor });
        }

        let scores = self.db.sorted_set(CODE_SCORES_TABLE, self.key());
        let uses = scores.score(code).optional()?.unwrap_or(0) + 1;
        if uses > i64::from(self.settings.reuse_limit) {
            codes.del(code)?;
            scores.del(code)?;
            tracing::debug!(actor = %self.actor, uses, "code exhausted");
        } else {
            scores.add(code, uses)?;
        }
        Ok(())
    }

    fn key(&self) -> &'static [u8] {
        self.actor.as_str().as_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotwise_store::InMemoryDatabase;

    fn book(db: &InMemoryDatabase, reuse_limit: u32) -> CodeBook<'_> {
        CodeBook::new(
            db,
            CodeActor::User,
            CodeSettings {
                enabled: true,
                reuse_limit,
            },
        )
    }

    fn consumed_before_rejection(reuse_limit: u32) -> u32 {
        let db = InMemoryDatabase::new();
        let codes = book(&db, reuse_limit);
        codes.add_codes(&[b"shared"]).unwrap();
        let mut uses = 0;
        while codes.consume(b"shared").is_ok() {
            uses += 1;
            assert!(uses < 100, "code never ran out");
        }
        uses
    }

    #[test]
    fn code_admits_reuse_limit_plus_one_uses() {
        for limit in [0, 1, 3] {
            assert_eq!(consumed_before_rejection(limit), limit + 1);
        }
    }

    #[test]
    fn exhausted_code_fails_not_authorized() {
        let db = InMemoryDatabase::new();
        let codes = book(&db, 0);
        codes.add_codes(&[b"once"]).unwrap();
        codes.consume(b"once").unwrap();
        assert!(!codes.contains(b"once").unwrap());
        assert!(matches!(
            codes.consume(b"once"),
            Err(AdmissionError::InvalidCode {
                actor: CodeActor::User
            })
        ));
    }

    #[test]
    fn unknown_code_is_rejected() {
        let db = InMemoryDatabase::new();
        let err = book(&db, 5).consume(b"nope").unwrap_err();
        assert!(matches!(err, AdmissionError::InvalidCode { .. }));
        assert!(!err.is_retryable());
    }

    #[test]
    fn use_count_is_tracked() {
        let db = InMemoryDatabase::new();
        let codes = book(&db, 5);
        codes.add_codes(&[b"c"]).unwrap();
        codes.consume(b"c").unwrap();
        codes.consume(b"c").unwrap();
        assert_eq!(codes.uses(b"c").unwrap(), 2);
    }

    #[test]
    fn actor_classes_are_separate() {
        let db = InMemoryDatabase::new();
        book(&db, 0).add_codes(&[b"c"]).unwrap();
        let provider = CodeBook::new(&db, CodeActor::Provider, CodeSettings::default());
        assert!(provider.consume(b"c").is_err());
    }

    #[test]
    fn disabled_checks_accept_anything() {
        let db = InMemoryDatabase::new();
        let codes = CodeBook::new(
            &db,
            CodeActor::Provider,
            CodeSettings {
                enabled: false,
                reuse_limit: 0,
            },
        );
        codes.consume(b"whatever").unwrap();
        codes.consume(b"whatever").unwrap();
    }

    #[test]
    fn add_codes_counts_new_only() {
        let db = InMemoryDatabase::new();
        let codes = book(&db, 0);
        assert_eq!(codes.add_codes(&[b"a", b"b"]).unwrap(), 2);
        assert_eq!(codes.add_codes(&[b"b", b"c"]).unwrap(), 1);
    }

    #[test]
    fn settings_default_when_fields_missing() {
        let settings: CodeSettings = serde_json::from_str("{}").unwrap();
        assert_eq!(settings, CodeSettings::default());
    }
}
