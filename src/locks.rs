//! Per-record action locks.
//!
//! At most one mutating action may be in flight per file id, plus one global
//! upload slot. A second attempt while a lock is held is refused, not queued.
//! Every lock carries a cancellation token for the action it guards.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LockKey {
    Record(String),
    /// Uploads have no record yet, so they share one slot.
    Upload,
}

impl std::fmt::Display for LockKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LockKey::Record(id) => write!(f, "file {id}"),
            LockKey::Upload => f.write_str("upload"),
        }
    }
}

struct HeldLock {
    generation: u64,
    cancel: CancellationToken,
}

#[derive(Default)]
struct LockTable {
    next_generation: u64,
    held: HashMap<LockKey, HeldLock>,
}

impl LockTable {
    fn insert(&mut self, key: LockKey) -> Option<(u64, CancellationToken)> {
        if self.held.contains_key(&key) {
            return None;
        }
        self.next_generation += 1;
        let generation = self.next_generation;
        let cancel = CancellationToken::new();
        self.held.insert(
            key,
            HeldLock {
                generation,
                cancel: cancel.clone(),
            },
        );
        Some((generation, cancel))
    }
}

#[derive(Clone, Default)]
pub struct ActionLocks {
    table: Arc<Mutex<LockTable>>,
}

impl ActionLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn table(&self) -> MutexGuard<'_, LockTable> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Scoped acquisition: the lock is released when the guard drops, on every
    /// exit path including cancellation of the owning future.
    pub fn acquire(&self, key: LockKey) -> Option<ActionGuard> {
        let (generation, cancel) = self.table().insert(key.clone())?;
        Some(ActionGuard {
            table: Arc::clone(&self.table),
            key,
            generation,
            cancel,
        })
    }

    /// Unscoped acquisition for a record. Pair with `release`.
    pub fn try_acquire(&self, id: &str) -> bool {
        self.table()
            .insert(LockKey::Record(id.to_string()))
            .is_some()
    }

    pub fn release(&self, id: &str) {
        self.table().held.remove(&LockKey::Record(id.to_string()));
    }

    pub fn is_busy(&self, id: &str) -> bool {
        self.table()
            .held
            .contains_key(&LockKey::Record(id.to_string()))
    }

    pub fn is_uploading(&self) -> bool {
        self.table().held.contains_key(&LockKey::Upload)
    }

    /// Ids of records with an action in flight, sorted.
    pub fn busy_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .table()
            .held
            .keys()
            .filter_map(|key| match key {
                LockKey::Record(id) => Some(id.clone()),
                LockKey::Upload => None,
            })
            .collect();
        ids.sort();
        ids
    }

    /// Signal cancellation to the action holding `key`. The lock itself is
    /// released by that action's guard once it unwinds.
    pub fn cancel(&self, key: &LockKey) -> bool {
        match self.table().held.get(key) {
            Some(lock) => {
                lock.cancel.cancel();
                true
            }
            None => false,
        }
    }

    /// Cancel every in-flight action and drop all locks immediately.
    /// Guards of abandoned actions become inert.
    pub fn abandon_all(&self) -> usize {
        let drained: Vec<HeldLock> = self.table().held.drain().map(|(_, lock)| lock).collect();
        for lock in &drained {
            lock.cancel.cancel();
        }
        drained.len()
    }
}

/// Proof of a held lock. Dropping it releases the lock unless it was abandoned
/// and taken over in the meantime.
pub struct ActionGuard {
    table: Arc<Mutex<LockTable>>,
    key: LockKey,
    generation: u64,
    cancel: CancellationToken,
}

impl ActionGuard {
    pub fn key(&self) -> &LockKey {
        &self.key
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }
}

impl Drop for ActionGuard {
    fn drop(&mut self) {
        let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
        let ours = table
            .held
            .get(&self.key)
            .is_some_and(|lock| lock.generation == self.generation);
        if ours {
            table.held.remove(&self.key);
        }
    }
}

impl std::fmt::Debug for ActionGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionGuard")
            .field("key", &self.key)
            .field("generation", &self.generation)
            .finish()
    }
}
