use std::collections::BTreeMap;
use std::time::Duration;

use crate::error::StoreResult;
use crate::lock::LockGuard;

/// A member of a sorted set with its score.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SortedSetEntry {
    pub member: Vec<u8>,
    pub score: i64,
}

/// Minimal transactional key-value store.
///
/// Every structure is addressed by `(table, key)`. All implementations must
/// satisfy these invariants:
/// - Every operation is atomic with respect to other operations on the same
///   `(table, key)`. Cross-key atomicity is only available by holding a named
///   [`lock`](Database::lock) for the whole read-modify-write sequence.
/// - Point reads of absent (or expired) data return `StoreError::NotFound`;
///   collection reads (`map_get_all`, `set_members`, ranges) return empty
///   collections instead.
/// - Collections that become empty are removed.
/// - TTLs are advisory cleanup: once elapsed, the key reads as absent.
/// - Lock acquisition waits a bounded time and fails with a retryable error.
pub trait Database: Send + Sync {
    // -- maps ---------------------------------------------------------------

    fn map_get(&self, table: &str, key: &[u8], field: &[u8]) -> StoreResult<Vec<u8>>;

    fn map_get_all(&self, table: &str, key: &[u8]) -> StoreResult<BTreeMap<Vec<u8>, Vec<u8>>>;

    fn map_set(&self, table: &str, key: &[u8], field: &[u8], value: &[u8]) -> StoreResult<()>;

    /// Returns `true` if the field existed.
    fn map_del(&self, table: &str, key: &[u8], field: &[u8]) -> StoreResult<bool>;

    // -- sets ---------------------------------------------------------------

    /// Returns `true` if the member was newly added.
    fn set_add(&self, table: &str, key: &[u8], member: &[u8]) -> StoreResult<bool>;

    fn set_has(&self, table: &str, key: &[u8], member: &[u8]) -> StoreResult<bool>;

    /// Returns `true` if the member existed.
    fn set_del(&self, table: &str, key: &[u8], member: &[u8]) -> StoreResult<bool>;

    fn set_members(&self, table: &str, key: &[u8]) -> StoreResult<Vec<Vec<u8>>>;

    // -- sorted sets --------------------------------------------------------

    /// Insert or re-score a member.
    fn zset_add(&self, table: &str, key: &[u8], member: &[u8], score: i64) -> StoreResult<()>;

    fn zset_score(&self, table: &str, key: &[u8], member: &[u8]) -> StoreResult<i64>;

    /// Returns `true` if the member existed.
    fn zset_del(&self, table: &str, key: &[u8], member: &[u8]) -> StoreResult<bool>;

    /// Members by rank, `from..=to`, ascending score. Negative ranks count
    /// from the end (`-1` is the highest score).
    fn zset_range(&self, table: &str, key: &[u8], from: i64, to: i64)
        -> StoreResult<Vec<SortedSetEntry>>;

    /// Members with `from <= score <= to`, ascending score.
    fn zset_range_by_score(
        &self,
        table: &str,
        key: &[u8],
        from: i64,
        to: i64,
    ) -> StoreResult<Vec<SortedSetEntry>>;

    /// Member at a rank; `NotFound` if out of range.
    fn zset_at(&self, table: &str, key: &[u8], index: i64) -> StoreResult<SortedSetEntry>;

    /// Remove and return up to `n` lowest-scored members.
    fn zset_pop_min(&self, table: &str, key: &[u8], n: usize) -> StoreResult<Vec<SortedSetEntry>>;

    /// Remove members with `from <= score <= to`; returns how many went.
    fn zset_remove_range_by_score(
        &self,
        table: &str,
        key: &[u8],
        from: i64,
        to: i64,
    ) -> StoreResult<usize>;

    // -- values -------------------------------------------------------------

    /// Store a blob. `ttl` replaces any previous expiry; `None` clears it.
    fn value_set(&self, table: &str, key: &[u8], data: &[u8], ttl: Option<Duration>)
        -> StoreResult<()>;

    fn value_get(&self, table: &str, key: &[u8]) -> StoreResult<Vec<u8>>;

    /// Returns `true` if the value existed.
    fn value_del(&self, table: &str, key: &[u8]) -> StoreResult<bool>;

    // -- keys, locks, lifecycle ---------------------------------------------

    /// Drop whatever structure lives at `(table, key)`.
    fn delete(&self, table: &str, key: &[u8]) -> StoreResult<bool>;

    /// Set a time-to-live on an existing key; `NotFound` if absent.
    fn expire(&self, table: &str, key: &[u8], ttl: Duration) -> StoreResult<()>;

    /// Acquire a store-wide named lock.
    fn lock(&self, name: &str) -> StoreResult<LockGuard>;

    /// Remove all data.
    fn reset(&self) -> StoreResult<()>;

    fn open(&self) -> StoreResult<()>;

    fn close(&self) -> StoreResult<()>;
}

impl<'d> dyn Database + 'd {
    pub fn map<'a>(&'a self, table: &'a str, key: &'a [u8]) -> Map<'a, 'd> {
        Map {
            db: self,
            table,
            key,
        }
    }

    pub fn set<'a>(&'a self, table: &'a str, key: &'a [u8]) -> Set<'a, 'd> {
        Set {
            db: self,
            table,
            key,
        }
    }

    pub fn sorted_set<'a>(&'a self, table: &'a str, key: &'a [u8]) -> SortedSet<'a, 'd> {
        SortedSet {
            db: self,
            table,
            key,
        }
    }

    pub fn value<'a>(&'a self, table: &'a str, key: &'a [u8]) -> Value<'a, 'd> {
        Value {
            db: self,
            table,
            key,
        }
    }
}

/// Hash-map handle bound to one `(table, key)`.
pub struct Map<'a, 'd> {
    db: &'a (dyn Database + 'd),
    table: &'a str,
    key: &'a [u8],
}

impl Map<'_, '_> {
    pub fn get(&self, field: &[u8]) -> StoreResult<Vec<u8>> {
        self.db.map_get(self.table, self.key, field)
    }

    pub fn get_all(&self) -> StoreResult<BTreeMap<Vec<u8>, Vec<u8>>> {
        self.db.map_get_all(self.table, self.key)
    }

    pub fn set(&self, field: &[u8], value: &[u8]) -> StoreResult<()> {
        self.db.map_set(self.table, self.key, field, value)
    }

    pub fn del(&self, field: &[u8]) -> StoreResult<bool> {
        self.db.map_del(self.table, self.key, field)
    }

    /// Drop the whole map.
    pub fn remove(&self) -> StoreResult<bool> {
        self.db.delete(self.table, self.key)
    }

    pub fn expire(&self, ttl: Duration) -> StoreResult<()> {
        self.db.expire(self.table, self.key, ttl)
    }
}

/// Unordered set handle bound to one `(table, key)`.
pub struct Set<'a, 'd> {
    db: &'a (dyn Database + 'd),
    table: &'a str,
    key: &'a [u8],
}

impl Set<'_, '_> {
    pub fn add(&self, member: &[u8]) -> StoreResult<bool> {
        self.db.set_add(self.table, self.key, member)
    }

    pub fn has(&self, member: &[u8]) -> StoreResult<bool> {
        self.db.set_has(self.table, self.key, member)
    }

    pub fn del(&self, member: &[u8]) -> StoreResult<bool> {
        self.db.set_del(self.table, self.key, member)
    }

    pub fn members(&self) -> StoreResult<Vec<Vec<u8>>> {
        self.db.set_members(self.table, self.key)
    }
}

/// Sorted set handle bound to one `(table, key)`.
pub struct SortedSet<'a, 'd> {
    db: &'a (dyn Database + 'd),
    table: &'a str,
    key: &'a [u8],
}

impl SortedSet<'_, '_> {
    pub fn add(&self, member: &[u8], score: i64) -> StoreResult<()> {
        self.db.zset_add(self.table, self.key, member, score)
    }

    pub fn score(&self, member: &[u8]) -> StoreResult<i64> {
        self.db.zset_score(self.table, self.key, member)
    }

    pub fn del(&self, member: &[u8]) -> StoreResult<bool> {
        self.db.zset_del(self.table, self.key, member)
    }

    pub fn range(&self, from: i64, to: i64) -> StoreResult<Vec<SortedSetEntry>> {
        self.db.zset_range(self.table, self.key, from, to)
    }

    pub fn range_by_score(&self, from: i64, to: i64) -> StoreResult<Vec<SortedSetEntry>> {
        self.db.zset_range_by_score(self.table, self.key, from, to)
    }

    pub fn at(&self, index: i64) -> StoreResult<SortedSetEntry> {
        self.db.zset_at(self.table, self.key, index)
    }

    pub fn pop_min(&self, n: usize) -> StoreResult<Vec<SortedSetEntry>> {
        self.db.zset_pop_min(self.table, self.key, n)
    }

    pub fn remove_range_by_score(&self, from: i64, to: i64) -> StoreResult<usize> {
        self.db.zset_remove_range_by_score(self.table, self.key, from, to)
    }
}

/// Single-blob handle bound to one `(table, key)`.
pub struct Value<'a, 'd> {
    db: &'a (dyn Database + 'd),
    table: &'a str,
    key: &'a [u8],
}

impl Value<'_, '_> {
    pub fn set(&self, data: &[u8], ttl: Option<Duration>) -> StoreResult<()> {
        self.db.value_set(self.table, self.key, data, ttl)
    }

    pub fn get(&self) -> StoreResult<Vec<u8>> {
        self.db.value_get(self.table, self.key)
    }

    pub fn del(&self) -> StoreResult<bool> {
        self.db.value_del(self.table, self.key)
    }
}

/// Treat `NotFound` as `None`, pass every other error through.
pub trait OptionalExt<T> {
    fn optional(self) -> StoreResult<Option<T>>;
}

impl<T> OptionalExt<T> for StoreResult<T> {
    fn optional(self) -> StoreResult<Option<T>> {
        match self {
            Ok(v) => Ok(Some(v)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }
}
