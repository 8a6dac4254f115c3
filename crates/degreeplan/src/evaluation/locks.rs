//! Per-plan-degree write locks.

use crate::db::PlanDegreeId;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Serializes recomputation of a single plan degree.
///
/// Uses DashMap for concurrent access without external locking. Distinct plan
/// degrees never contend with each other.
#[derive(Default)]
pub struct EvaluationLocks {
    locks: DashMap<PlanDegreeId, Arc<Mutex<()>>>,
}

impl EvaluationLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Gets or creates the lock for the given plan degree.
    pub fn get(&self, plan_degree_id: PlanDegreeId) -> Arc<Mutex<()>> {
        self.locks
            .entry(plan_degree_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Waits for exclusive access to `plan_degree_id`.
    pub async fn acquire(&self, plan_degree_id: PlanDegreeId) -> OwnedMutexGuard<()> {
        self.get(plan_degree_id).lock_owned().await
    }

    /// Removes the entry for `plan_degree_id` once nobody holds or waits on it.
    ///
    /// Call after dropping the guard returned by [`EvaluationLocks::acquire`].
    pub fn release(&self, plan_degree_id: PlanDegreeId) {
        self.locks
            .remove_if(&plan_degree_id, |_, lock| Arc::strong_count(lock) == 1);
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_plan_degree_shares_lock() {
        let locks = EvaluationLocks::new();
        let a = locks.get(1);
        let b = locks.get(1);
        let c = locks.get(2);

        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
    }

    #[tokio::test]
    async fn test_lock_is_exclusive() {
        let locks = EvaluationLocks::new();
        let guard = locks.acquire(7).await;

        assert!(locks.get(7).try_lock().is_err());
        drop(guard);
        assert!(locks.get(7).try_lock().is_ok());
    }

    #[test]
    fn test_release_keeps_contended_locks() {
        let locks = EvaluationLocks::new();
        let held = locks.get(1);
        let _ = locks.get(2);

        locks.release(1);
        locks.release(2);
        assert_eq!(locks.len(), 1);
        drop(held);
        locks.release(1);
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn test_many_passes_leave_no_entries() {
        let locks = EvaluationLocks::new();
        for id in 0..1000 {
            let guard = locks.acquire(id).await;
            drop(guard);
            locks.release(id);
        }
        assert!(locks.is_empty());
    }
}
