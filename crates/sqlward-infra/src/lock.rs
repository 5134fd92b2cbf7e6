//! Named locks: PostgreSQL advisory locks, or a process-local mutex.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::OwnedMutexGuard;

/// Map a lock name onto the signed 64-bit key space of advisory locks.
pub fn key_to_int(key: &str) -> i64 {
    let digest = md5::compute(key.as_bytes());
    let value = u128::from_be_bytes(digest.0) % (i64::MAX as u128);
    value as i64
}

type LockMap = HashMap<i64, Arc<tokio::sync::Mutex<()>>>;

/// Process-local named mutexes for dialects without advisory locks.
///
/// An entry lives only while someone holds or waits for its lock.
#[derive(Debug, Default)]
pub(crate) struct LocalLocks {
    locks: Mutex<LockMap>,
}

impl LocalLocks {
    fn map(&self) -> std::sync::MutexGuard<'_, LockMap> {
        self.locks.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Wait for the lock on `key`. Released when the guard drops.
    pub(crate) async fn lock(&self, key: i64) -> LocalLockGuard<'_> {
        let mutex = {
            let mut locks = self.map();
            // Entries left behind by waiters that were cancelled.
            locks.retain(|_, m| Arc::strong_count(m) > 1);
            locks.entry(key).or_default().clone()
        };
        let guard = mutex.lock_owned().await;
        LocalLockGuard {
            locks: self,
            key,
            guard: Some(guard),
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.map().len()
    }
}

pub(crate) struct LocalLockGuard<'a> {
    locks: &'a LocalLocks,
    key: i64,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for LocalLockGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        let mut locks = self.locks.map();
        if locks
            .get(&self.key)
            .is_some_and(|m| Arc::strong_count(m) == 1)
        {
            locks.remove(&self.key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_key_to_int_stable_and_positive() {
        let a = key_to_int("jobs:nightly");
        assert_eq!(a, key_to_int("jobs:nightly"));
        assert_ne!(a, key_to_int("jobs:hourly"));
        assert!(a >= 0);
    }

    #[tokio::test]
    async fn test_released_locks_leave_no_entries() {
        let locks = LocalLocks::default();
        for key in 0..100 {
            let _guard = locks.lock(key).await;
            assert_eq!(locks.len(), 1);
        }
        assert_eq!(locks.len(), 0);
    }

    #[tokio::test]
    async fn test_same_key_excludes_other_keys_do_not() {
        let locks = LocalLocks::default();
        let held = locks.lock(1).await;

        let blocked = tokio::time::timeout(Duration::from_millis(20), locks.lock(1)).await;
        assert!(blocked.is_err());
        let other = tokio::time::timeout(Duration::from_millis(20), locks.lock(2)).await;
        assert!(other.is_ok());
        drop(other);

        drop(held);
        let again = tokio::time::timeout(Duration::from_millis(200), locks.lock(1)).await;
        assert!(again.is_ok());
        drop(again);
        assert_eq!(locks.len(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_waiter_entry_is_pruned() {
        let locks = LocalLocks::default();
        let held = locks.lock(7).await;
        let _ = tokio::time::timeout(Duration::from_millis(10), locks.lock(7)).await;
        drop(held);
        assert_eq!(locks.len(), 0);

        let _other = locks.lock(8).await;
        assert_eq!(locks.len(), 1);
    }
}
