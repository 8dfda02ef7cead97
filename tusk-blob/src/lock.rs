use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::UploadId;

type LockTable = DashMap<UploadId, Arc<Mutex<()>>>;

/// Per-upload exclusive locks.
///
/// Holding the guard for an id serializes every read-validate-write-advance
/// sequence against that upload; different ids never wait on each other.
/// A slot lives only while someone holds or waits for it, so the table
/// stays as small as the number of uploads currently being worked on.
#[derive(Clone, Default)]
pub struct SessionLocks {
    locks: Arc<LockTable>,
}

/// Exclusive access to one upload. Dropping it releases the lock.
pub struct SessionGuard {
    locks: Arc<LockTable>,
    id: UploadId,
    guard: Option<OwnedMutexGuard<()>>,
}

impl SessionLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `id`
    pub async fn acquire(&self, id: &UploadId) -> SessionGuard {
        let lock = self.locks.entry(id.clone()).or_default().clone();
        SessionGuard {
            locks: self.locks.clone(),
            id: id.clone(),
            guard: Some(lock.lock_owned().await),
        }
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        // Holders and waiters each own a clone; only the table's is left
        // when nobody else needs the slot.
        self.locks
            .remove_if(&self.id, |_, lock| Arc::strong_count(lock) == 1);
    }
}
