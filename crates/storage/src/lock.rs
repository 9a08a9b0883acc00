use core::fmt::{self, Debug, Formatter};
use std::collections::HashMap;
use std::sync::Arc;

use metashare_primitives::identifier::StorageId;
use parking_lot::lock_api::ArcMutexGuard;
use parking_lot::{Mutex, RawMutex};

/// Serializes mutations per identifier.
#[derive(Debug, Default)]
pub struct IdentifierLocks {
    inner: Mutex<HashMap<StorageId, Arc<Mutex<()>>>>,
}

#[must_use = "the identifier is unlocked when the guard is dropped"]
pub struct IdentifierGuard<'a> {
    locks: &'a IdentifierLocks,
    id: StorageId,
    guard: Option<ArcMutexGuard<RawMutex, ()>>,
}

impl IdentifierLocks {
    /// Blocks until no other guard for `id` is alive.
    pub fn lock(&self, id: StorageId) -> IdentifierGuard<'_> {
        let mutex = Arc::clone(self.inner.lock().entry(id).or_default());

        IdentifierGuard {
            locks: self,
            id,
            guard: Some(mutex.lock_arc()),
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.inner.lock().len()
    }
}

impl Debug for IdentifierGuard<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentifierGuard")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

impl Drop for IdentifierGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());

        let mut locks = self.locks.inner.lock();

        // Only the map still refers to it, nobody is waiting.
        if locks.get(&self.id).is_some_and(|m| Arc::strong_count(m) == 1) {
            let _ignored = locks.remove(&self.id);
        }
    }
}
