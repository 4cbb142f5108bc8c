use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use crate::error::{StoreError, StoreResult};
use crate::lock::{LocalLocks, LockGuard};
use crate::traits::{Database, SortedSetEntry};

/// Default bounded wait for [`Database::lock`].
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_millis(100);

type StoreKey = (String, Vec<u8>);

#[derive(Clone, Debug, Default)]
struct ScoredSet {
    scores: HashMap<Vec<u8>, i64>,
    ordered: BTreeSet<(i64, Vec<u8>)>,
}

impl ScoredSet {
    fn insert(&mut self, member: &[u8], score: i64) {
        if let Some(old) = self.scores.insert(member.to_vec(), score) {
            self.ordered.remove(&(old, member.to_vec()));
        }
        self.ordered.insert((score, member.to_vec()));
    }

    fn remove(&mut self, member: &[u8]) -> bool {
        match self.scores.remove(member) {
            Some(score) => {
                self.ordered.remove(&(score, member.to_vec()));
                true
            }
            None => false,
        }
    }

    fn len(&self) -> usize {
        self.scores.len()
    }

    fn entries(&self) -> impl Iterator<Item = SortedSetEntry> + '_ {
        self.ordered.iter().map(|(score, member)| SortedSetEntry {
            member: member.clone(),
            score: *score,
        })
    }

    /// Resolve a Redis-style inclusive rank range to `start..end`.
    fn rank_bounds(&self, from: i64, to: i64) -> Option<(usize, usize)> {
        let len = self.len() as i64;
        let norm = |i: i64| if i < 0 { len + i } else { i };
        let start = norm(from).max(0);
        let end = norm(to).min(len - 1);
        if len == 0 || start > end {
            return None;
        }
        Some((start as usize, end as usize + 1))
    }
}

#[derive(Clone, Debug)]
enum Stored {
    Map(BTreeMap<Vec<u8>, Vec<u8>>),
    Set(BTreeSet<Vec<u8>>),
    SortedSet(ScoredSet),
    Value(Vec<u8>),
}

impl Stored {
    fn is_empty(&self) -> bool {
        match self {
            Self::Map(m) => m.is_empty(),
            Self::Set(s) => s.is_empty(),
            Self::SortedSet(z) => z.len() == 0,
            Self::Value(_) => false,
        }
    }
}

#[derive(Clone, Debug)]
struct Entry {
    stored: Stored,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// In-memory, HashMap-based implementation of [`Database`].
///
/// Intended for tests, embedding and single-process deployments. All data
/// lives behind one `RwLock`, which makes every operation atomic per key (and
/// in fact per store). Expired keys are treated as absent on access and
/// removed lazily, or eagerly via [`InMemoryDatabase::purge_expired`].
pub struct InMemoryDatabase {
    entries: RwLock<HashMap<StoreKey, Entry>>,
    locks: Arc<LocalLocks>,
    lock_timeout: Duration,
    closed: AtomicBool,
}

impl InMemoryDatabase {
    /// Create a new empty store with the default lock timeout.
    pub fn new() -> Self {
        Self::with_lock_timeout(DEFAULT_LOCK_TIMEOUT)
    }

    pub fn with_lock_timeout(lock_timeout: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            locks: LocalLocks::new(),
            lock_timeout,
            closed: AtomicBool::new(false),
        }
    }

    /// Number of live (non-expired) keys.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .read()
            .map(|m| m.values().filter(|e| !e.is_expired(now)).count())
            .unwrap_or(0)
    }

    /// Returns `true` if the store holds no live keys.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every expired key; returns how many were removed.
    pub fn purge_expired(&self) -> StoreResult<usize> {
        let now = Instant::now();
        let mut entries = self.write()?;
        let before = entries.len();
        entries.retain(|_, e| !e.is_expired(now));
        Ok(before - entries.len())
    }

    fn ensure_open(&self) -> StoreResult<()> {
        if self.closed.load(Ordering::Acquire) {
            Err(StoreError::Closed)
        } else {
            Ok(())
        }
    }

    fn read(
        &self,
    ) -> StoreResult<std::sync::RwLockReadGuard<'_, HashMap<StoreKey, Entry>>> {
        self.ensure_open()?;
        self.entries
            .read()
            .map_err(|e| StoreError::Backend(format!("lock poisoned: {e}")))
    }

    fn write(
        &self,
    ) -> StoreResult<std::sync::RwLockWriteGuard<'_, HashMap<StoreKey, Entry>>> {
        self.ensure_open()?;
        self.entries
            .write()
            .map_err(|e| StoreError::Backend(format!("lock poisoned: {e}")))
    }

    /// Run `f` on the live structure at `(table, key)`, if any.
    fn with_live<T>(
        &self,
        table: &str,
        key: &[u8],
        f: impl FnOnce(&Stored) -> StoreResult<T>,
    ) -> StoreResult<Option<T>> {
        let entries = self.read()?;
        match entries.get(&(table.to_string(), key.to_vec())) {
            Some(entry) if !entry.is_expired(Instant::now()) => f(&entry.stored).map(Some),
            _ => Ok(None),
        }
    }

    /// Run `f` on the structure at `(table, key)`, creating it with `init`
    /// if absent or expired. Empty collections are removed afterwards.
    fn with_entry<T>(
        &self,
        table: &str,
        key: &[u8],
        init: impl FnOnce() -> Stored,
        f: impl FnOnce(&mut Stored) -> StoreResult<T>,
    ) -> StoreResult<T> {
        let mut entries = self.write()?;
        let store_key = (table.to_string(), key.to_vec());
        let now = Instant::now();
        if entries.get(&store_key).is_some_and(|e| e.is_expired(now)) {
            entries.remove(&store_key);
        }
        let entry = entries.entry(store_key.clone()).or_insert_with(|| Entry {
            stored: init(),
            expires_at: None,
        });
        let result = f(&mut entry.stored);
        if entry.stored.is_empty() {
            entries.remove(&store_key);
        }
        result
    }

    /// Like [`Self::with_entry`] but never creates the structure.
    fn with_existing<T>(
        &self,
        table: &str,
        key: &[u8],
        absent: T,
        f: impl FnOnce(&mut Stored) -> StoreResult<T>,
    ) -> StoreResult<T> {
        let mut entries = self.write()?;
        let store_key = (table.to_string(), key.to_vec());
        let now = Instant::now();
        let Some(entry) = entries.get_mut(&store_key) else {
            return Ok(absent);
        };
        if entry.is_expired(now) {
            entries.remove(&store_key);
            return Ok(absent);
        }
        let result = f(&mut entry.stored);
        if entry.stored.is_empty() {
            entries.remove(&store_key);
        }
        result
    }
}

fn wrong_type(table: &str, key: &[u8], expected: &'static str) -> StoreError {
    StoreError::WrongType {
        table: table.to_string(),
        key: hex::encode(key),
        expected,
    }
}

macro_rules! expect_kind {
    ($stored:expr, $variant:ident, $table:expr, $key:expr, $name:literal) => {
        match $stored {
            Stored::$variant(inner) => Ok(inner),
            _ => Err(wrong_type($table, $key, $name)),
        }
    };
}

impl Default for InMemoryDatabase {
    fn default() -> Self {
        Self::new()
    }
}

impl Database for InMemoryDatabase {
    fn map_get(&self, table: &str, key: &[u8], field: &[u8]) -> StoreResult<Vec<u8>> {
        self.with_live(table, key, |stored| {
            let map = expect_kind!(stored, Map, table, key, "map")?;
            Ok(map.get(field).cloned())
        })?
        .flatten()
        .ok_or_else(|| StoreError::not_found(table, key))
    }

    fn map_get_all(&self, table: &str, key: &[u8]) -> StoreResult<BTreeMap<Vec<u8>, Vec<u8>>> {
        Ok(self
            .with_live(table, key, |stored| {
                expect_kind!(stored, Map, table, key, "map").cloned()
            })?
            .unwrap_or_default())
    }

    fn map_set(&self, table: &str, key: &[u8], field: &[u8], value: &[u8]) -> StoreResult<()> {
        self.with_entry(
            table,
            key,
            || Stored::Map(BTreeMap::new()),
            |stored| {
                let map = expect_kind!(stored, Map, table, key, "map")?;
                map.insert(field.to_vec(), value.to_vec());
                Ok(())
            },
        )
    }

    fn map_del(&self, table: &str, key: &[u8], field: &[u8]) -> StoreResult<bool> {
        self.with_existing(table, key, false, |stored| {
            let map = expect_kind!(stored, Map, table, key, "map")?;
            Ok(map.remove(field).is_some())
        })
    }

    fn set_add(&self, table: &str, key: &[u8], member: &[u8]) -> StoreResult<bool> {
        self.with_entry(
            table,
            key,
            || Stored::Set(BTreeSet::new()),
            |stored| {
                let set = expect_kind!(stored, Set, table, key, "set")?;
                Ok(set.insert(member.to_vec()))
            },
        )
    }

    fn set_has(&self, table: &str, key: &[u8], member: &[u8]) -> StoreResult<bool> {
        Ok(self
            .with_live(table, key, |stored| {
                let set = expect_kind!(stored, Set, table, key, "set")?;
                Ok(set.contains(member))
            })?
            .unwrap_or(false))
    }

    fn set_del(&self, table: &str, key: &[u8], member: &[u8]) -> StoreResult<bool> {
        self.with_existing(table, key, false, |stored| {
            let set = expect_kind!(stored, Set, table, key, "set")?;
            Ok(set.remove(member))
        })
    }

    fn set_members(&self, table: &str, key: &[u8]) -> StoreResult<Vec<Vec<u8>>> {
        Ok(self
            .with_live(table, key, |stored| {
                let set = expect_kind!(stored, Set, table, key, "set")?;
                Ok(set.iter().cloned().collect())
            })?
            .unwrap_or_default())
    }

    fn zset_add(&self, table: &str, key: &[u8], member: &[u8], score: i64) -> StoreResult<()> {
        self.with_entry(
            table,
            key,
            || Stored::SortedSet(ScoredSet::default()),
            |stored| {
                let zset = expect_kind!(stored, SortedSet, table, key, "sorted set")?;
                zset.insert(member, score);
                Ok(())
            },
        )
    }

    fn zset_score(&self, table: &str, key: &[u8], member: &[u8]) -> StoreResult<i64> {
        self.with_live(table, key, |stored| {
            let zset = expect_kind!(stored, SortedSet, table, key, "sorted set")?;
            Ok(zset.scores.get(member).copied())
        })?
        .flatten()
        .ok_or_else(|| StoreError::not_found(table, member))
    }

    fn zset_del(&self, table: &str, key: &[u8], member: &[u8]) -> StoreResult<bool> {
        self.with_existing(table, key, false, |stored| {
            let zset = expect_kind!(stored, SortedSet, table, key, "sorted set")?;
            Ok(zset.remove(member))
        })
    }

    fn zset_range(
        &self,
        table: &str,
        key: &[u8],
        from: i64,
        to: i64,
    ) -> StoreResult<Vec<SortedSetEntry>> {
        Ok(self
            .with_live(table, key, |stored| {
                let zset = expect_kind!(stored, SortedSet, table, key, "sorted set")?;
                Ok(match zset.rank_bounds(from, to) {
                    Some((start, end)) => zset.entries().skip(start).take(end - start).collect(),
                    None => Vec::new(),
                })
            })?
            .unwrap_or_default())
    }

    fn zset_range_by_score(
        &self,
        table: &str,
        key: &[u8],
        from: i64,
        to: i64,
    ) -> StoreResult<Vec<SortedSetEntry>> {
        Ok(self
            .with_live(table, key, |stored| {
                let zset = expect_kind!(stored, SortedSet, table, key, "sorted set")?;
                Ok(zset
                    .entries()
                    .skip_while(|e| e.score < from)
                    .take_while(|e| e.score <= to)
                    .collect())
            })?
            .unwrap_or_default())
    }

    fn zset_at(&self, table: &str, key: &[u8], index: i64) -> StoreResult<SortedSetEntry> {
        self.zset_range(table, key, index, index)?
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::not_found(table, key))
    }

    fn zset_pop_min(&self, table: &str, key: &[u8], n: usize) -> StoreResult<Vec<SortedSetEntry>> {
        self.with_existing(table, key, Vec::new(), |stored| {
            let zset = expect_kind!(stored, SortedSet, table, key, "sorted set")?;
            let popped: Vec<SortedSetEntry> = zset.entries().take(n).collect();
            for entry in &popped {
                zset.remove(&entry.member);
            }
            Ok(popped)
        })
    }

    fn zset_remove_range_by_score(
        &self,
        table: &str,
        key: &[u8],
        from: i64,
        to: i64,
    ) -> StoreResult<usize> {
        self.with_existing(table, key, 0, |stored| {
            let zset = expect_kind!(stored, SortedSet, table, key, "sorted set")?;
            let doomed: Vec<Vec<u8>> = zset
                .entries()
                .filter(|e| e.score >= from && e.score <= to)
                .map(|e| e.member)
                .collect();
            for member in &doomed {
                zset.remove(member);
            }
            Ok(doomed.len())
        })
    }

    fn value_set(
        &self,
        table: &str,
        key: &[u8],
        data: &[u8],
        ttl: Option<Duration>,
    ) -> StoreResult<()> {
        let mut entries = self.write()?;
        entries.insert(
            (table.to_string(), key.to_vec()),
            Entry {
                stored: Stored::Value(data.to_vec()),
                expires_at: ttl.map(|ttl| Instant::now() + ttl),
            },
        );
        Ok(())
    }

    fn value_get(&self, table: &str, key: &[u8]) -> StoreResult<Vec<u8>> {
        self.with_live(table, key, |stored| {
            expect_kind!(stored, Value, table, key, "value").cloned()
        })?
        .ok_or_else(|| StoreError::not_found(table, key))
    }

    fn value_del(&self, table: &str, key: &[u8]) -> StoreResult<bool> {
        let mut entries = self.write()?;
        let store_key = (table.to_string(), key.to_vec());
        match entries.get(&store_key) {
            Some(entry) if !matches!(entry.stored, Stored::Value(_)) => {
                Err(wrong_type(table, key, "value"))
            }
            Some(entry) => {
                let live = !entry.is_expired(Instant::now());
                entries.remove(&store_key);
                Ok(live)
            }
            None => Ok(false),
        }
    }

    fn delete(&self, table: &str, key: &[u8]) -> StoreResult<bool> {
        let mut entries = self.write()?;
        let now = Instant::now();
        Ok(entries
            .remove(&(table.to_string(), key.to_vec()))
            .is_some_and(|e| !e.is_expired(now)))
    }

    fn expire(&self, table: &str, key: &[u8], ttl: Duration) -> StoreResult<()> {
        let mut entries = self.write()?;
        let now = Instant::now();
        match entries.get_mut(&(table.to_string(), key.to_vec())) {
            Some(entry) if !entry.is_expired(now) => {
                entry.expires_at = Some(now + ttl);
                Ok(())
            }
            _ => Err(StoreError::not_found(table, key)),
        }
    }

    fn lock(&self, name: &str) -> StoreResult<LockGuard> {
        self.ensure_open()?;
        self.locks.acquire(name, self.lock_timeout)
    }

    fn reset(&self) -> StoreResult<()> {
        self.write()?.clear();
        tracing::info!("in-memory store reset");
        Ok(())
    }

    fn open(&self) -> StoreResult<()> {
        self.closed.store(false, Ordering::Release);
        Ok(())
    }

    fn close(&self) -> StoreResult<()> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}

impl std::fmt::Debug for InMemoryDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryDatabase")
            .field("key_count", &self.len())
            .field("lock_timeout", &self.lock_timeout)
            .finish()
    }
}
