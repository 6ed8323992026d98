//! Per-event mutation locks
//!
//! Every change to one event's queue or attendance runs under that event's
//! lock, so concurrent reorders and check-ins for the same event are applied
//! one at a time. Different events never contend. Locks nobody holds or
//! waits on are dropped on the next acquire.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use uuid::Uuid;

#[derive(Default)]
pub struct EventLocks {
    locks: Mutex<HashMap<Uuid, Arc<AsyncMutex<()>>>>,
}

impl EventLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `event_id`
    pub async fn acquire(&self, event_id: Uuid) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self
                .locks
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            locks.retain(|id, lock| *id == event_id || Arc::strong_count(lock) > 1);
            Arc::clone(locks.entry(event_id).or_default())
        };
        lock.lock_owned().await
    }

    /// Number of events currently tracked
    pub fn len(&self) -> usize {
        self.locks
            .lock()
            .map(|locks| locks.len())
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_event_serializes() {
        let locks = Arc::new(EventLocks::new());
        let event_id = Uuid::new_v4();

        let guard = locks.acquire(event_id).await;

        let contender = {
            let locks = Arc::clone(&locks);
            tokio::spawn(async move {
                let _g = locks.acquire(event_id).await;
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), contender)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_different_events_do_not_contend() {
        let locks = EventLocks::new();
        let _a = locks.acquire(Uuid::new_v4()).await;
        let _b = tokio::time::timeout(Duration::from_secs(1), locks.acquire(Uuid::new_v4()))
            .await
            .unwrap();
        assert_eq!(locks.len(), 2);
    }

    #[tokio::test]
    async fn test_idle_locks_are_pruned() {
        let locks = EventLocks::new();
        for _ in 0..5 {
            let _guard = locks.acquire(Uuid::new_v4()).await;
        }
        assert_eq!(locks.len(), 1);

        let held = locks.acquire(Uuid::new_v4()).await;
        let _other = locks.acquire(Uuid::new_v4()).await;
        assert_eq!(locks.len(), 2);
        drop(held);
    }
}
