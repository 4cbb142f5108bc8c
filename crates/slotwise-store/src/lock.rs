//! Named, store-wide mutual exclusion with scoped release.

use std::collections::HashSet;
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use crate::error::{StoreError, StoreResult};

/// Backend-specific handle to a held lock.
pub trait LockHandle: Send {
    /// Name the lock was acquired under.
    fn name(&self) -> &str;

    /// Give the lock back. Called at most once per handle.
    fn release(&mut self) -> StoreResult<()>;
}

/// An acquired named lock.
///
/// The lock is released exactly once: either explicitly via
/// [`LockGuard::release`], or when the guard is dropped on any exit path.
pub struct LockGuard {
    handle: Option<Box<dyn LockHandle>>,
}

impl LockGuard {
    pub fn new(handle: Box<dyn LockHandle>) -> Self {
        Self {
            handle: Some(handle),
        }
    }

    pub fn name(&self) -> &str {
        self.handle.as_ref().map_or("", |h| h.name())
    }

    /// Release now and report any failure to the caller.
    pub fn release(mut self) -> StoreResult<()> {
        match self.handle.take() {
            Some(mut handle) => handle.release(),
            None => Ok(()),
        }
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if let Some(mut handle) = self.handle.take() {
            if let Err(e) = handle.release() {
                tracing::error!(lock = %handle.name(), error = %e, "failed to release lock");
            }
        }
    }
}

impl std::fmt::Debug for LockGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockGuard").field("name", &self.name()).finish()
    }
}

/// Process-local table of held lock names.
///
/// Waiters block on a condition variable for at most the configured timeout.
#[derive(Debug, Default)]
pub struct LocalLocks {
    held: Mutex<HashSet<String>>,
    released: Condvar,
}

impl LocalLocks {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Acquire `name`, waiting at most `timeout`.
    pub fn acquire(self: &Arc<Self>, name: &str, timeout: Duration) -> StoreResult<LockGuard> {
        let deadline = Instant::now() + timeout;
        let mut held = self
            .held
            .lock()
            .map_err(|e| StoreError::Backend(format!("lock table poisoned: {e}")))?;

        while held.contains(name) {
            let now = Instant::now();
            if now >= deadline {
                tracing::warn!(lock = %name, ?timeout, "lock acquisition timed out");
                return Err(StoreError::LockTimeout {
                    name: name.to_string(),
                    waited: timeout,
                });
            }
            let (guard, _) = self
                .released
                .wait_timeout(held, deadline - now)
                .map_err(|e| StoreError::Backend(format!("lock table poisoned: {e}")))?;
            held = guard;
        }

        held.insert(name.to_string());
        Ok(LockGuard::new(Box::new(LocalLockHandle {
            table: Arc::clone(self),
            name: name.to_string(),
        })))
    }

    /// Whether `name` is currently held.
    pub fn is_held(&self, name: &str) -> bool {
        self.held.lock().map(|h| h.contains(name)).unwrap_or(false)
    }
}

struct LocalLockHandle {
    table: Arc<LocalLocks>,
    name: String,
}

impl LockHandle for LocalLockHandle {
    fn name(&self) -> &str {
        &self.name
    }

    fn release(&mut self) -> StoreResult<()> {
        let mut held = self
            .table
            .held
            .lock()
            .map_err(|e| StoreError::Backend(format!("lock table poisoned: {e}")))?;
        held.remove(&self.name);
        self.table.released.notify_all();
        Ok(())
    }
}
