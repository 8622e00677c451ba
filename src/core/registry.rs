//! Registry of live cancellation handles, keyed by task identifier.

use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::task::AbortHandle;

use crate::core::TaskId;

/// Kind of scheduled operation a handle controls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    /// Fires once after a delay.
    Once,
    /// Fires repeatedly at a fixed period.
    FixedRate,
}

/// Cancellable handle for one in-flight scheduled operation.
///
/// Wraps the abort handle of the operation's driver task together with the
/// finalize flag shared with that driver. Whichever side swaps the flag
/// first owns the dispose-and-release; the loser backs off.
pub struct TaskHandle {
    abort: AbortHandle,
    finalized: Arc<AtomicBool>,
    kind: TaskKind,
}

impl TaskHandle {
    /// Build a handle around a driver's abort handle and shared flag.
    pub fn new(abort: AbortHandle, finalized: Arc<AtomicBool>, kind: TaskKind) -> Self {
        Self {
            abort,
            finalized,
            kind,
        }
    }

    /// Stop the driver. Idempotent; a driver that already finished ignores
    /// it, and no further firings start once the abort lands.
    pub fn dispose(&self) {
        self.abort.abort();
    }

    /// Kind of operation this handle controls.
    pub fn kind(&self) -> TaskKind {
        self.kind
    }

    /// Finalize arbiter shared with the driver.
    pub fn finalized(&self) -> &Arc<AtomicBool> {
        &self.finalized
    }
}

/// Live handle registry.
///
/// One `RwLock<HashMap>` keyed by [`TaskId`]; `remove` is atomic, which
/// makes it the meeting point for a cancel call and a completion callback
/// racing on the same id.
#[derive(Default)]
pub struct HandleRegistry {
    entries: RwLock<HashMap<TaskId, TaskHandle>>,
}

impl HandleRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handle` under `id`.
    pub fn insert(&self, id: TaskId, handle: TaskHandle) {
        self.entries.write().insert(id, handle);
    }

    /// Remove and return the handle under `id`, if any.
    pub fn remove(&self, id: TaskId) -> Option<TaskHandle> {
        self.entries.write().remove(&id)
    }

    /// Remove the handle under `id` only when it shares `token` with the
    /// caller. Completion paths use this so a late callback can never evict
    /// a successor operation that reacquired the same id.
    pub fn remove_matching(&self, id: TaskId, token: &Arc<AtomicBool>) -> Option<TaskHandle> {
        let mut entries = self.entries.write();
        if entries
            .get(&id)
            .is_some_and(|handle| Arc::ptr_eq(&handle.finalized, token))
        {
            entries.remove(&id)
        } else {
            None
        }
    }

    /// Number of live handles.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether no handles are live.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Whether `id` currently has a live handle.
    pub fn contains(&self, id: TaskId) -> bool {
        self.entries.read().contains_key(&id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn idle_handle(flag: &Arc<AtomicBool>, kind: TaskKind) -> TaskHandle {
        let task = tokio::spawn(std::future::pending::<()>());
        let handle = TaskHandle::new(task.abort_handle(), Arc::clone(flag), kind);
        task.abort();
        handle
    }

    #[tokio::test]
    async fn test_insert_remove_and_counts() {
        let registry = HandleRegistry::new();
        assert!(registry.is_empty());

        let flag = Arc::new(AtomicBool::new(false));
        registry.insert(7, idle_handle(&flag, TaskKind::Once).await);
        assert_eq!(registry.len(), 1);
        assert!(registry.contains(7));

        let removed = registry.remove(7).unwrap();
        assert_eq!(removed.kind(), TaskKind::Once);
        assert!(registry.remove(7).is_none());
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_remove_matching_rejects_foreign_token() {
        let registry = HandleRegistry::new();
        let original = Arc::new(AtomicBool::new(false));
        let successor = Arc::new(AtomicBool::new(false));

        registry.insert(3, idle_handle(&successor, TaskKind::FixedRate).await);

        // A stale finalize carrying the earlier task's token must not evict
        // the successor that now owns id 3.
        assert!(registry.remove_matching(3, &original).is_none());
        assert!(registry.contains(3));
        assert!(registry.remove_matching(3, &successor).is_some());
        assert!(!registry.contains(3));
    }
}
