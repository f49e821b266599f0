use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

type LockMap = DashMap<Uuid, Arc<Mutex<()>>>;

/// Per-task async mutexes. Mutations of one task are serialized; different
/// tasks never contend. An entry lives only while someone holds or waits
/// for its lock.
#[derive(Default)]
pub(crate) struct TaskLocks {
    locks: LockMap,
}

/// Held lock on one task; releasing it drops the map entry when unused
pub(crate) struct TaskLockGuard<'a> {
    locks: &'a LockMap,
    task_id: Uuid,
    guard: Option<OwnedMutexGuard<()>>,
}

impl TaskLocks {
    pub(crate) async fn acquire(&self, task_id: Uuid) -> TaskLockGuard<'_> {
        // Clone out of the shard before awaiting
        let lock = self.locks.entry(task_id).or_default().clone();
        let guard = lock.lock_owned().await;
        TaskLockGuard {
            locks: &self.locks,
            task_id,
            guard: Some(guard),
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.locks.len()
    }
}

impl Drop for TaskLockGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        // Only the map's own reference left: no holder, no waiter
        self.locks
            .remove_if(&self.task_id, |_, lock| Arc::strong_count(lock) == 1);
    }
}
