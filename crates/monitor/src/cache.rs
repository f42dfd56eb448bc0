//! Process-local task identity cache.
//!
//! Shared between the file-event consumer (get-or-create on every event)
//! and the approval poller (key enumeration on a timer), so access goes
//! through a mutex. Entries live for the life of the process; losing them
//! on restart is fine because the store stays authoritative.

use std::collections::HashMap;

use tokio::sync::Mutex;

use sidelog_store::{Store, StoreError, TaskRecord};

#[derive(Default)]
pub struct TaskCache {
    inner: Mutex<HashMap<String, TaskRecord>>,
}

impl TaskCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached record for `desired.uid`, or get-or-create it
    /// through the store and cache the result.
    ///
    /// The lock is never held across the store call, and a failed resolve
    /// caches nothing; the next event retries from scratch.
    pub async fn resolve(
        &self,
        store: &dyn Store,
        desired: &TaskRecord,
    ) -> Result<TaskRecord, StoreError> {
        if let Some(hit) = self.inner.lock().await.get(&desired.uid).cloned() {
            return Ok(hit);
        }

        let task = store.get_or_create_task(desired).await?;
        self.inner
            .lock()
            .await
            .insert(desired.uid.clone(), task.clone());
        Ok(task)
    }

    /// Every task uid currently cached, for the approval poller.
    pub async fn uids(&self) -> Vec<String> {
        self.inner.lock().await.keys().cloned().collect()
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
