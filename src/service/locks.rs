// service/locks.rs
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

/// The aggregate an operation serialises on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockKey {
    Job(Uuid),
    Provider(Uuid),
}

const PRUNE_THRESHOLD: usize = 1024;

/// In-process mutual exclusion per aggregate. Acquire job before provider.
#[derive(Debug, Default)]
pub struct AggregateLocks {
    locks: DashMap<LockKey, Arc<Mutex<()>>>,
}

impl AggregateLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, key: LockKey) -> OwnedMutexGuard<()> {
        if self.locks.len() > PRUNE_THRESHOLD {
            self.prune_idle();
        }

        let lock = self
            .locks
            .entry(key)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        lock.lock_owned().await
    }

    pub async fn acquire_job(&self, job_id: Uuid) -> OwnedMutexGuard<()> {
        self.acquire(LockKey::Job(job_id)).await
    }

    pub async fn acquire_provider(&self, provider_id: Uuid) -> OwnedMutexGuard<()> {
        self.acquire(LockKey::Provider(provider_id)).await
    }

    /// Forget locks nobody holds or waits on
    pub fn prune_idle(&self) {
        self.locks.retain(|_, lock| Arc::strong_count(lock) > 1);
    }
}
