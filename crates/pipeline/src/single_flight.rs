//! Per-job mutual exclusion for refresh and dispatch settlement.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, Weak};

use modelforge_core::types::DbId;
use tokio::sync::OwnedMutexGuard;

/// Lazily created async mutex per job id.
///
/// Entries hold only a weak reference; a job's mutex is freed once the last
/// guard and waiter are gone, and dead entries are pruned on the next lock.
#[derive(Default)]
pub struct JobLocks {
    locks: Mutex<HashMap<DbId, Weak<tokio::sync::Mutex<()>>>>,
}

impl JobLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `job_id`.
    pub async fn lock(&self, job_id: DbId) -> OwnedMutexGuard<()> {
        self.handle(job_id).lock_owned().await
    }

    fn handle(&self, job_id: DbId) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = locks.get(&job_id).and_then(Weak::upgrade) {
            return existing;
        }
        locks.retain(|_, weak| weak.strong_count() > 0);
        let fresh = Arc::new(tokio::sync::Mutex::new(()));
        locks.insert(job_id, Arc::downgrade(&fresh));
        fresh
    }

    /// Number of jobs with a live lock. Used by tests.
    pub fn active(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }
}
