//! Approval polling: the one path by which asynchronous human decisions
//! reach the task containers, which only speak filesystem.
//!
//! Tasks that need an approval block until a marker file shows up next to
//! their log. On a fixed interval the poller asks the store for a decision
//! on every cached task uid and materializes what it finds.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use sidelog_store::{ApprovalDecision, Store};

use crate::cache::TaskCache;

pub const APPROVED_MARKER_PREFIX: &str = "_approved_";
pub const CANCELED_MARKER_PREFIX: &str = "_canceled_";

/// Marker file encoding a decision, e.g. `_approved_<uid>`.
pub fn marker_path(dir: &Path, decision: &ApprovalDecision) -> PathBuf {
    let prefix = if decision.approved {
        APPROVED_MARKER_PREFIX
    } else {
        CANCELED_MARKER_PREFIX
    };
    dir.join(format!("{prefix}{}", decision.task_uid))
}

/// Run one polling cycle over every cached task uid; returns the number of
/// marker files written.
///
/// An undecided uid is the common case and simply skipped. A store error
/// for one uid skips only that uid; the cycle finishes for the rest.
/// Existing markers are overwritten without checking; the bodies are empty
/// so an overwrite is harmless.
pub async fn poll_once(store: &dyn Store, cache: &TaskCache, dir: &Path) -> usize {
    let mut written = 0;
    for uid in cache.uids().await {
        let decision = match store.approval_decision(&uid).await {
            Ok(Some(decision)) => decision,
            Ok(None) => continue,
            Err(err) => {
                warn!(%uid, ?err, "approval status fetch failed; skipping uid this cycle");
                continue;
            }
        };

        let marker = marker_path(dir, &decision);
        match tokio::fs::write(&marker, b"").await {
            Ok(()) => {
                written += 1;
                info!(
                    %uid,
                    approved = decision.approved,
                    marker = %marker.display(),
                    "approval decision materialized"
                );
            }
            Err(err) => {
                warn!(marker = %marker.display(), ?err, "failed to write approval marker");
            }
        }
    }
    written
}

/// Spawn the polling loop. Ticks every `interval` until the shutdown
/// signal flips; an in-progress cycle always completes.
pub fn spawn_poller(
    store: Arc<dyn Store>,
    cache: Arc<TaskCache>,
    dir: PathBuf,
    interval: Duration,
    shutdown: &watch::Sender<bool>,
) -> JoinHandle<()> {
    let mut rx = shutdown.subscribe();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = tokio::time::sleep(interval) => {
                    poll_once(store.as_ref(), &cache, &dir).await;
                }
                changed = rx.changed() => {
                    if changed.is_ok() && *rx.borrow() {
                        break;
                    }
                }
            }
        }
    })
}

// ── Tests ────────────────────────────────────────────────────────────────────
