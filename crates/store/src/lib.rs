pub mod error;
pub mod http;
pub mod models;

use std::collections::HashSet;

use async_trait::async_trait;

pub use error::StoreError;
pub use http::StoreClient;
pub use models::{
    ApprovalDecision, Cluster, LogLine, ResourceRecord, ResourceSpecRecord, TaskRecord,
};

/// The persistence collaborator.
///
/// The sidecar only ever talks to the store through this trait, which keeps
/// the monitor testable against an in-memory double. [`StoreClient`] is the
/// HTTP implementation.
#[async_trait]
pub trait Store: Send + Sync {
    /// Find the cluster by name, registering it on first sight.
    async fn upsert_cluster(&self, name: &str) -> Result<Cluster, StoreError>;

    /// Find or create the managed resource. When the stored generation
    /// differs from `desired.current_generation`, exactly one new spec
    /// snapshot is recorded and the resource is brought up to date; the
    /// returned flag reports whether that happened.
    async fn get_or_create_resource(
        &self,
        desired: &ResourceRecord,
        spec_snapshot: &str,
    ) -> Result<(ResourceRecord, bool), StoreError>;

    /// Find or create one task execution record by uid.
    async fn get_or_create_task(&self, desired: &TaskRecord) -> Result<TaskRecord, StoreError>;

    /// Line numbers already persisted for a task.
    async fn persisted_line_numbers(&self, task_uid: &str) -> Result<HashSet<u64>, StoreError>;

    /// Write a batch of new lines. A failure means nothing from the batch
    /// was recorded; the caller retries via the next filesystem event.
    async fn bulk_insert_lines(&self, lines: &[LogLine]) -> Result<(), StoreError>;

    /// The approval decision for a task, if one has been recorded yet.
    async fn approval_decision(
        &self,
        task_uid: &str,
    ) -> Result<Option<ApprovalDecision>, StoreError>;
}
