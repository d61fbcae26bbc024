use dashmap::DashMap;
use std::hash::Hash;
use std::sync::Arc;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type LockTable<K> = DashMap<K, Arc<AsyncMutex<()>>>;

/// One async mutex per key, created on demand.
///
/// Tasks locking the same key run one at a time; different keys never
/// contend. A key's entry is removed once nobody holds or awaits it, so the
/// table only ever contains keys that are in use.
pub struct KeyedLocks<K: Eq + Hash + Clone> {
    table: Arc<LockTable<K>>,
}

impl<K: Eq + Hash + Clone> Default for KeyedLocks<K> {
    fn default() -> Self {
        Self { table: Arc::new(DashMap::new()) }
    }
}

impl<K: Eq + Hash + Clone> Clone for KeyedLocks<K> {
    fn clone(&self) -> Self {
        Self { table: self.table.clone() }
    }
}

impl<K: Eq + Hash + Clone> KeyedLocks<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `key`.
    ///
    /// Dropping the returned future while it waits leaves no entry behind.
    pub async fn lock(&self, key: K) -> KeyedGuard<K> {
        let mutex = self.table.entry(key.clone()).or_default().clone();
        // Declared before the wait so an abandoned wait still prunes the entry
        let mut held = KeyedGuard {
            key,
            guard: None,
            table: self.table.clone(),
        };
        held.guard = Some(mutex.lock_owned().await);
        held
    }

    /// Number of keys currently held or awaited
    pub fn active_keys(&self) -> usize {
        self.table.len()
    }
}

/// Exclusive access to one key, released on drop
pub struct KeyedGuard<K: Eq + Hash + Clone> {
    key: K,
    guard: Option<OwnedMutexGuard<()>>,
    table: Arc<LockTable<K>>,
}

impl<K: Eq + Hash + Clone> Drop for KeyedGuard<K> {
    fn drop(&mut self) {
        // Release first so the strong count below only counts the table and waiters
        drop(self.guard.take());
        self.table.remove_if(&self.key, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_key_is_exclusive() {
        let locks = Arc::new(KeyedLocks::new());
        let inside = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let locks = locks.clone();
            let inside = inside.clone();
            let max_seen = max_seen.clone();
            tasks.push(tokio::spawn(async move {
                let _guard = locks.lock("doc").await;
                let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                max_seen.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                inside.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
        assert_eq!(locks.active_keys(), 0);
    }

    #[tokio::test]
    async fn test_different_keys_do_not_block() {
        let locks = KeyedLocks::new();
        let _a = locks.lock(1u32).await;
        let b = tokio::time::timeout(Duration::from_millis(100), locks.lock(2u32)).await;
        assert!(b.is_ok());
        assert_eq!(locks.active_keys(), 2);
    }

    #[tokio::test]
    async fn test_entry_kept_while_waiter_pending() {
        let locks = Arc::new(KeyedLocks::new());
        let first = locks.lock(7u32).await;

        let waiter = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _second = locks.lock(7u32).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        drop(first);
        assert!(locks.active_keys() <= 1);

        waiter.await.unwrap();
        assert_eq!(locks.active_keys(), 0);
    }

    #[tokio::test]
    async fn test_abandoned_wait_leaves_no_entry() {
        let locks = KeyedLocks::new();
        let first = locks.lock(3u32).await;

        let mut waiter = Box::pin(locks.lock(3u32));
        assert!(futures_util::poll!(&mut waiter).is_pending());

        // The release hands the lock to the waiter, which is then dropped unpolled
        drop(first);
        assert_eq!(locks.active_keys(), 1);
        drop(waiter);
        assert_eq!(locks.active_keys(), 0);
    }

    #[tokio::test]
    async fn test_timed_out_wait_leaves_no_entry() {
        let locks = KeyedLocks::new();
        let first = locks.lock("doc").await;
        let waited = tokio::time::timeout(Duration::from_millis(10), locks.lock("doc")).await;
        assert!(waited.is_err());
        drop(first);
        assert_eq!(locks.active_keys(), 0);
    }
}
