//! In-memory [`Store`] double shared by this crate's unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use sidelog_store::{
    ApprovalDecision, Cluster, LogLine, ResourceRecord, ResourceSpecRecord, Store, StoreError,
    TaskRecord,
};

fn injected(context: &'static str) -> StoreError {
    StoreError::Api {
        status: 503,
        context,
        message: "injected failure".to_string(),
    }
}

#[derive(Default)]
pub struct MockStore {
    pub clusters: Mutex<HashMap<String, Cluster>>,
    pub resources: Mutex<HashMap<String, ResourceRecord>>,
    pub spec_snapshots: Mutex<Vec<ResourceSpecRecord>>,
    pub tasks: Mutex<HashMap<String, TaskRecord>>,
    pub lines: Mutex<Vec<LogLine>>,
    pub approvals: Mutex<HashMap<String, ApprovalDecision>>,

    /// Count of `get_or_create_task` invocations that reached the store.
    pub task_create_calls: AtomicUsize,
    /// Remaining `get_or_create_task` calls that fail before succeeding.
    pub fail_task_creates: AtomicUsize,
    /// Remaining `bulk_insert_lines` calls that fail before succeeding.
    pub fail_bulk_inserts: AtomicUsize,
    /// Uids whose approval fetch always errors.
    pub fail_approvals_for: Mutex<HashSet<String>>,
}

impl MockStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_approval(&self, uid: &str, approved: bool) {
        self.approvals.lock().unwrap().insert(
            uid.to_string(),
            ApprovalDecision {
                task_uid: uid.to_string(),
                approved,
            },
        );
    }

    pub fn lines_for(&self, task_uid: &str) -> Vec<LogLine> {
        let mut lines: Vec<LogLine> = self
            .lines
            .lock()
            .unwrap()
            .iter()
            .filter(|line| line.task_uid == task_uid)
            .cloned()
            .collect();
        lines.sort_by_key(|line| line.line_no);
        lines
    }

    fn take_failure(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |remaining| {
                remaining.checked_sub(1)
            })
            .is_ok()
    }
}

#[async_trait]
impl Store for MockStore {
    async fn upsert_cluster(&self, name: &str) -> Result<Cluster, StoreError> {
        let mut clusters = self.clusters.lock().unwrap();
        let next_id = clusters.len() as u64 + 1;
        Ok(clusters
            .entry(name.to_string())
            .or_insert_with(|| Cluster {
                id: next_id,
                name: name.to_string(),
                created_at: None,
            })
            .clone())
    }

    async fn get_or_create_resource(
        &self,
        desired: &ResourceRecord,
        spec_snapshot: &str,
    ) -> Result<(ResourceRecord, bool), StoreError> {
        let mut resources = self.resources.lock().unwrap();
        match resources.get_mut(&desired.uid) {
            None => {
                resources.insert(desired.uid.clone(), desired.clone());
                self.spec_snapshots.lock().unwrap().push(ResourceSpecRecord {
                    resource_uid: desired.uid.clone(),
                    generation: desired.current_generation.clone(),
                    spec: spec_snapshot.to_string(),
                });
                Ok((desired.clone(), false))
            }
            Some(existing) if existing.current_generation != desired.current_generation => {
                existing.current_generation = desired.current_generation.clone();
                self.spec_snapshots.lock().unwrap().push(ResourceSpecRecord {
                    resource_uid: desired.uid.clone(),
                    generation: desired.current_generation.clone(),
                    spec: spec_snapshot.to_string(),
                });
                Ok((existing.clone(), true))
            }
            Some(existing) => Ok((existing.clone(), false)),
        }
    }

    async fn get_or_create_task(&self, desired: &TaskRecord) -> Result<TaskRecord, StoreError> {
        self.task_create_calls.fetch_add(1, Ordering::SeqCst);
        if Self::take_failure(&self.fail_task_creates) {
            return Err(injected("create task"));
        }
        Ok(self
            .tasks
            .lock()
            .unwrap()
            .entry(desired.uid.clone())
            .or_insert_with(|| desired.clone())
            .clone())
    }

    async fn persisted_line_numbers(&self, task_uid: &str) -> Result<HashSet<u64>, StoreError> {
        Ok(self
            .lines
            .lock()
            .unwrap()
            .iter()
            .filter(|line| line.task_uid == task_uid)
            .map(|line| line.line_no)
            .collect())
    }

    async fn bulk_insert_lines(&self, lines: &[LogLine]) -> Result<(), StoreError> {
        if Self::take_failure(&self.fail_bulk_inserts) {
            return Err(injected("bulk insert lines"));
        }
        self.lines.lock().unwrap().extend_from_slice(lines);
        Ok(())
    }

    async fn approval_decision(
        &self,
        task_uid: &str,
    ) -> Result<Option<ApprovalDecision>, StoreError> {
        if self.fail_approvals_for.lock().unwrap().contains(task_uid) {
            return Err(injected("approval status"));
        }
        Ok(self.approvals.lock().unwrap().get(task_uid).cloned())
    }
}
