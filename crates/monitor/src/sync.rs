//! Line-level synchronization: make the store's line set for a task equal
//! the current file content, without ever writing a line number twice.
//!
//! Every qualifying event re-reads the whole file and re-diffs against the
//! store. That costs O(file size) per event and is the deliberate
//! scalability ceiling of this design; it is also what makes a lost event
//! or a failed write self-heal on the next one.

use std::path::Path;
use std::time::Instant;

use thiserror::Error;
use tracing::{debug, info};

use sidelog_store::{LogLine, ResourceRecord, Store, StoreError, TaskRecord};

use crate::cache::TaskCache;
use crate::logfile::LogFileName;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub struct LineSynchronizer {
    resource: ResourceRecord,
}

impl LineSynchronizer {
    pub fn new(resource: ResourceRecord) -> Self {
        Self { resource }
    }

    /// Synchronize one log file; returns how many lines were written.
    ///
    /// Any failure abandons the whole attempt: the batch either lands
    /// entirely or not at all, and a later event repeats the full diff.
    pub async fn sync_path(
        &self,
        store: &dyn Store,
        cache: &TaskCache,
        name: &LogFileName,
        path: &Path,
    ) -> Result<usize, SyncError> {
        let started = Instant::now();

        let task = cache
            .resolve(store, &name.task_record(&self.resource.uid))
            .await?;

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| SyncError::Read {
                path: path.display().to_string(),
                source,
            })?;
        let candidates = number_lines(&content, &task, &self.resource.uid);
        if candidates.is_empty() {
            return Ok(0);
        }

        let persisted = store.persisted_line_numbers(&task.uid).await?;
        let new_lines: Vec<LogLine> = candidates
            .into_iter()
            .filter(|line| !persisted.contains(&line.line_no))
            .collect();
        if new_lines.is_empty() {
            debug!(task = %task.uid, "no new lines");
            return Ok(0);
        }

        store.bulk_insert_lines(&new_lines).await?;
        info!(
            task = %task.uid,
            wrote = new_lines.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "synchronized log lines"
        );
        Ok(new_lines.len())
    }
}

/// Number the file's lines 1-based from the start. Line identity is the
/// number, not the content, so these are only stable for append-only files.
fn number_lines(content: &str, task: &TaskRecord, resource_uid: &str) -> Vec<LogLine> {
    content
        .lines()
        .enumerate()
        .map(|(index, message)| LogLine {
            task_uid: task.uid.clone(),
            resource_uid: resource_uid.to_string(),
            task_type: task.task_type.clone(),
            rerun: task.rerun,
            generation: task.generation.clone(),
            line_no: index as u64 + 1,
            message: message.to_string(),
        })
        .collect()
}

// ── Tests ────────────────────────────────────────────────────────────────────
