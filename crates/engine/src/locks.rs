//! Per-entity single-writer locks.
//!
//! Every transition holds the lock of its reservation and of the vehicle(s)
//! it touches for its whole read-validate-write sequence. Locks are always
//! taken reservation first, then vehicles in ascending id order.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) enum LockKey {
    Reservation(Uuid),
    Vehicle(Uuid),
}

type Slot = Arc<AsyncMutex<()>>;

#[derive(Clone, Debug, Default)]
pub(crate) struct EntityLocks {
    slots: Arc<Mutex<HashMap<LockKey, Slot>>>,
}

impl EntityLocks {
    pub(crate) async fn acquire(&self, key: LockKey) -> OwnedMutexGuard<()> {
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            // Drop slots nobody holds or waits on.
            slots.retain(|_, slot| Arc::strong_count(slot) > 1);
            slots.entry(key).or_default().clone()
        };
        slot.lock_owned().await
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

/// Guards held for the duration of one transition.
#[derive(Debug, Default)]
pub(crate) struct TransitionGuard {
    _held: Vec<OwnedMutexGuard<()>>,
}

impl TransitionGuard {
    pub(crate) fn push(&mut self, guard: OwnedMutexGuard<()>) {
        self._held.push(guard);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn same_key_is_exclusive() {
        let locks = EntityLocks::default();
        let key = LockKey::Reservation(Uuid::new_v4());

        let first = locks.acquire(key).await;
        let blocked = tokio::time::timeout(Duration::from_millis(20), locks.acquire(key)).await;
        assert!(blocked.is_err());

        drop(first);
        let second = tokio::time::timeout(Duration::from_millis(20), locks.acquire(key)).await;
        assert!(second.is_ok());
    }

    #[tokio::test]
    async fn distinct_keys_do_not_block_and_idle_slots_are_pruned() {
        let locks = EntityLocks::default();
        let a = locks.acquire(LockKey::Vehicle(Uuid::new_v4())).await;
        let b = locks.acquire(LockKey::Vehicle(Uuid::new_v4())).await;
        assert_eq!(locks.len(), 2);
        drop((a, b));
        let _c = locks.acquire(LockKey::Reservation(Uuid::new_v4())).await;
        assert_eq!(locks.len(), 1);
    }
}
