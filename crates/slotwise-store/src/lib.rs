//! Storage contract for Slotwise.
//!
//! Every piece of state (registered keys, codes, appointments, bookings,
//! distances) lives in a [`Database`]: a small transactional key-value store
//! offering hash maps, sets, sorted sets and single values, each addressed by
//! `(table, key)`, plus TTLs and named store-wide locks.
//!
//! # Storage Backends
//!
//! - [`InMemoryDatabase`] -- `HashMap`-based store for tests, embedding and
//!   single-process deployments
//!
//! New backends prove themselves against the [`conformance`] suite (enable
//! the `conformance` feature to reach it from another crate).
//!
//! # Design Rules
//!
//! 1. Single operations are atomic per `(table, key)`.
//! 2. Multi-step read-modify-write sequences hold a named [`LockGuard`].
//! 3. Locks are released on every exit path when the guard drops.
//! 4. Lock waits are bounded; timeouts are retryable errors.

#[cfg(any(test, feature = "conformance"))]
pub mod conformance;
pub mod error;
pub mod lock;
pub mod memory;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use lock::{LocalLocks, LockGuard, LockHandle};
pub use memory::InMemoryDatabase;
pub use traits::{Database, Map, OptionalExt, Set, SortedSet, SortedSetEntry, Value};
