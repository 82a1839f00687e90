//! Per-resource mutual exclusion for mutating loan operations.
//!
//! Each loan and each inbound M-Pesa transaction gets its own async mutex,
//! created on first use and dropped once nobody holds or waits on it.
//! Reconciliation takes the transaction lock before the loan lock; every
//! other operation takes only the loan lock, so the order can never invert.
//!
//! These locks serialise requests inside one process. The storage layer still
//! guards every write with a conditional update or a unique constraint.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum LockKey {
    Loan(i64),
    MpesaTransaction(i64),
}

/// Held for the duration of one mutating operation
pub struct ResourceGuard {
    key: LockKey,
    registry: KeyedLocks,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for ResourceGuard {
    fn drop(&mut self) {
        // release first so the registry sees the true holder count
        self.guard.take();
        self.registry.prune(self.key);
    }
}

#[derive(Clone, Default)]
pub struct KeyedLocks {
    slots: Arc<Mutex<HashMap<LockKey, Arc<AsyncMutex<()>>>>>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock_loan(&self, loan_id: i64) -> ResourceGuard {
        self.acquire(LockKey::Loan(loan_id)).await
    }

    pub async fn lock_mpesa_transaction(&self, transaction_id: i64) -> ResourceGuard {
        self.acquire(LockKey::MpesaTransaction(transaction_id)).await
    }

    async fn acquire(&self, key: LockKey) -> ResourceGuard {
        let slot = {
            let mut slots = self
                .slots
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            slots
                .entry(key)
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };
        let guard = slot.lock_owned().await;
        ResourceGuard {
            key,
            registry: self.clone(),
            guard: Some(guard),
        }
    }

    fn prune(&self, key: LockKey) {
        let mut slots = self
            .slots
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        // one reference is the map's own; anything above that is a holder or waiter
        if let Some(slot) = slots.get(&key) {
            if Arc::strong_count(slot) == 1 {
                slots.remove(&key);
            }
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.slots
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_loan_is_serialised() {
        let locks = KeyedLocks::new();
        let inside = Arc::new(AtomicUsize::new(0));
        let max_inside = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let locks = locks.clone();
            let inside = inside.clone();
            let max_inside = max_inside.clone();
            handles.push(tokio::spawn(async move {
                let _guard = locks.lock_loan(1).await;
                let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                max_inside.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                inside.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for handle in handles {
            handle.await.expect("task panicked");
        }

        assert_eq!(max_inside.load(Ordering::SeqCst), 1);
        assert_eq!(locks.len(), 0);
    }

    #[tokio::test]
    async fn test_different_keys_do_not_block() {
        let locks = KeyedLocks::new();
        let _loan = locks.lock_loan(1).await;
        let _other_loan = locks.lock_loan(2).await;
        // same number, different resource kind
        let _tx = locks.lock_mpesa_transaction(1).await;
        assert_eq!(locks.len(), 3);
    }

    #[tokio::test]
    async fn test_slot_is_pruned_after_release() {
        let locks = KeyedLocks::new();
        {
            let _guard = locks.lock_loan(5).await;
            assert_eq!(locks.len(), 1);
        }
        assert_eq!(locks.len(), 0);
    }
}
