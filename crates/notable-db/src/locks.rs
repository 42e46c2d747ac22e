//! Per-note async lock registry.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Hands out one async mutex per note id.
///
/// Entries are dropped lazily: on each acquire, locks nobody else holds a
/// reference to are removed from the map.
#[derive(Clone, Debug, Default)]
pub struct NoteLocks {
    inner: Arc<Mutex<HashMap<i64, Arc<AsyncMutex<()>>>>>,
}

impl NoteLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `note_id`. Released when the guard drops.
    pub async fn acquire(&self, note_id: i64) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            map.retain(|_, lock| Arc::strong_count(lock) > 1);
            map.entry(note_id)
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }

    /// Number of notes with a live lock entry.
    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
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
    async fn test_same_note_is_exclusive() {
        let locks = NoteLocks::new();
        let guard = locks.acquire(1).await;

        let contender = locks.clone();
        let blocked =
            tokio::time::timeout(Duration::from_millis(50), contender.acquire(1)).await;
        assert!(blocked.is_err(), "second acquire should wait");

        drop(guard);
        let acquired =
            tokio::time::timeout(Duration::from_millis(500), locks.acquire(1)).await;
        assert!(acquired.is_ok());
    }

    #[tokio::test]
    async fn test_different_notes_do_not_block() {
        let locks = NoteLocks::new();
        let _a = locks.acquire(1).await;
        let b = tokio::time::timeout(Duration::from_millis(50), locks.acquire(2)).await;
        assert!(b.is_ok());
    }

    #[tokio::test]
    async fn test_released_entries_are_pruned() {
        let locks = NoteLocks::new();
        drop(locks.acquire(1).await);
        drop(locks.acquire(2).await);
        // Acquiring 3 prunes the unheld entries for 1 and 2.
        let _held = locks.acquire(3).await;
        assert_eq!(locks.len(), 1);
    }
}
