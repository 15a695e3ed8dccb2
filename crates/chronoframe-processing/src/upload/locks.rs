//! Optional per-key serialization of uploads.
//!
//! Concurrent writes to the same key otherwise race at the backend with
//! last-writer-wins semantics.

use chronoframe_core::models::StorageKey;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

#[derive(Default)]
pub struct KeyLocks {
    locks: Mutex<HashMap<StorageKey, Weak<AsyncMutex<()>>>>,
}

impl KeyLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `key`. Released when the guard drops.
    pub async fn acquire(&self, key: &StorageKey) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            locks.retain(|_, weak| weak.strong_count() > 0);
            match locks.get(key).and_then(Weak::upgrade) {
                Some(lock) => lock,
                None => {
                    let lock = Arc::new(AsyncMutex::new(()));
                    locks.insert(key.clone(), Arc::downgrade(&lock));
                    lock
                }
            }
        };
        lock.lock_owned().await
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.locks.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_key_is_exclusive() {
        let locks = Arc::new(KeyLocks::new());
        let key = StorageKey::parse("2024/a.jpg").unwrap();

        let guard = locks.acquire(&key).await;

        let contender = {
            let locks = locks.clone();
            let key = key.clone();
            tokio::spawn(async move {
                let _guard = locks.acquire(&key).await;
            })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!contender.is_finished());

        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), contender)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_different_keys_do_not_block_and_entries_are_pruned() {
        let locks = KeyLocks::new();
        let a = StorageKey::parse("a.jpg").unwrap();
        let b = StorageKey::parse("b.jpg").unwrap();

        let guard_a = locks.acquire(&a).await;
        let guard_b = tokio::time::timeout(Duration::from_secs(1), locks.acquire(&b))
            .await
            .unwrap();
        assert_eq!(locks.tracked(), 2);

        drop(guard_a);
        drop(guard_b);
        let _again = locks.acquire(&a).await;
        assert_eq!(locks.tracked(), 1);
    }
}
