//! Per-key async locks so only one call per idempotency key runs at a time.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, Weak};

use tokio::sync::OwnedMutexGuard;

/// Smallest map size at which dead slots are swept.
const MIN_PRUNE_AT: usize = 64;

/// Map of lazily created async mutexes, one per key.
///
/// Entries are held weakly. The looked-up slot is replaced in place when it
/// is dead; the rest of the map is swept only once it has doubled in size
/// since the last sweep, so acquisition stays amortized O(1).
#[derive(Default)]
pub struct KeyedLocks {
    inner: Mutex<Slots>,
}

#[derive(Default)]
struct Slots {
    locks: HashMap<String, Weak<tokio::sync::Mutex<()>>>,
    prune_at: usize,
}

impl Slots {
    fn prune_if_grown(&mut self) {
        if self.locks.len() < self.prune_at.max(MIN_PRUNE_AT) {
            return;
        }
        self.locks.retain(|_, slot| slot.strong_count() > 0);
        self.prune_at = self.locks.len() * 2;
    }
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive ownership of `key`.
    pub async fn acquire(&self, key: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut slots = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            match slots.locks.get(key).and_then(Weak::upgrade) {
                Some(lock) => lock,
                None => {
                    slots.prune_if_grown();
                    let lock = Arc::new(tokio::sync::Mutex::new(()));
                    slots.locks.insert(key.to_string(), Arc::downgrade(&lock));
                    lock
                }
            }
        };
        lock.lock_owned().await
    }

    /// Number of keys currently held or awaited.
    #[cfg(test)]
    fn active_keys(&self) -> usize {
        self.slot_count(|slot| slot.strong_count() > 0)
    }

    #[cfg(test)]
    fn slot_count(&self, keep: impl Fn(&Weak<tokio::sync::Mutex<()>>) -> bool) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .locks
            .values()
            .filter(|slot| keep(slot))
            .count()
    }
}
