//! Generation-directory watching.
//!
//! The generation directory is created by the task runner, usually after
//! this sidecar starts, so startup first polls for it to exist. Once it
//! does, a non-recursive `notify` watch is registered and a snapshot of the
//! files already present is queued ahead of the live create/write events,
//! giving the consumer one ordered stream.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use notify::event::ModifyKind;
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::warn;

const DIR_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Capacity of the channel bridging the notify callback thread into the
/// async consumer. When it fills, the callback blocks, which pushes the
/// pressure down to the OS event queue. Overflow there drops events, a
/// known and accepted risk.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Poll until `dir` exists, failing once `timeout` has elapsed.
///
/// Never showing up means the task runner was never scheduled against this
/// generation. That is misconfiguration, so the caller treats the error as
/// fatal.
pub async fn wait_for_generation_dir(dir: &Path, timeout: Duration) -> Result<()> {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if let Ok(metadata) = tokio::fs::metadata(dir).await {
            if metadata.is_dir() {
                return Ok(());
            }
        }
        if tokio::time::Instant::now() >= deadline {
            bail!(
                "generation directory {} did not appear within {}s",
                dir.display(),
                timeout.as_secs()
            );
        }
        tokio::time::sleep(DIR_POLL_INTERVAL).await;
    }
}

pub struct GenerationWatcher {
    /// Pre-existing files, drained before any live event.
    backlog: VecDeque<PathBuf>,
    rx: mpsc::Receiver<PathBuf>,
    /// Must be kept alive: dropping the `RecommendedWatcher` deregisters
    /// the OS watch and stops event delivery.
    _watcher: RecommendedWatcher,
}

impl GenerationWatcher {
    /// Register the watch, then snapshot the directory.
    ///
    /// The watch goes first so a file created between the two steps shows
    /// up at least once; it may show up twice, which the idempotent
    /// synchronizer absorbs. Failure here is fatal since without a watch
    /// the sidecar is blind.
    pub fn start(dir: &Path) -> Result<Self> {
        let (tx, rx) = mpsc::channel::<PathBuf>(EVENT_CHANNEL_CAPACITY);

        let bridge_tx = tx.clone();
        let mut watcher = notify::recommended_watcher(
            move |result: notify::Result<notify::Event>| match result {
                Ok(event) if is_relevant(&event.kind) => {
                    for path in event.paths {
                        // Blocks the notify thread when the consumer lags.
                        let _ = bridge_tx.blocking_send(path);
                    }
                }
                Ok(_) => {}
                Err(err) => warn!(?err, "filesystem watch error"),
            },
        )
        .context("failed to create filesystem watcher")?;

        watcher
            .watch(dir, RecursiveMode::NonRecursive)
            .with_context(|| format!("failed to watch {}", dir.display()))?;

        let mut backlog = VecDeque::new();
        let entries = std::fs::read_dir(dir)
            .with_context(|| format!("failed to list {}", dir.display()))?;
        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    warn!(?err, dir = %dir.display(), "unreadable directory entry; skipping");
                    continue;
                }
            };
            match entry.file_type() {
                Ok(file_type) if file_type.is_dir() => continue,
                Ok(_) => backlog.push_back(entry.path()),
                Err(err) => {
                    warn!(?err, path = %entry.path().display(), "stat failed during initial scan; skipping");
                }
            }
        }

        Ok(Self {
            backlog,
            rx,
            _watcher: watcher,
        })
    }

    /// Next path in stream order: the initial snapshot first, then live
    /// events. `None` once the watch side has shut down.
    pub async fn next(&mut self) -> Option<PathBuf> {
        if let Some(path) = self.backlog.pop_front() {
            return Some(path);
        }
        self.rx.recv().await
    }
}

fn is_relevant(kind: &EventKind) -> bool {
    kind.is_create()
        || matches!(
            kind,
            EventKind::Modify(ModifyKind::Data(_)) | EventKind::Modify(ModifyKind::Any)
        )
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;
    use tokio::time::timeout;

    use super::*;

    #[tokio::test]
    async fn wait_succeeds_when_directory_appears_late() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("generations").join("3");

        let create_in = dir.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(120)).await;
            fs::create_dir_all(&create_in).unwrap();
        });

        wait_for_generation_dir(&dir, Duration::from_secs(5))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn wait_times_out_when_directory_never_appears() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("generations").join("3");

        let err = wait_for_generation_dir(&dir, Duration::from_millis(200))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("did not appear"));
    }

    #[tokio::test]
    async fn initial_scan_queues_existing_files_but_not_directories() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("apply.out"), "line\n").unwrap();
        fs::write(tmp.path().join("plan.out"), "line\n").unwrap();
        fs::create_dir(tmp.path().join("subdir")).unwrap();

        let mut watcher = GenerationWatcher::start(tmp.path()).unwrap();
        let mut seen = vec![
            watcher.next().await.unwrap(),
            watcher.next().await.unwrap(),
        ];
        seen.sort();

        assert_eq!(seen[0].file_name().unwrap(), "apply.out");
        assert_eq!(seen[1].file_name().unwrap(), "plan.out");
    }

    #[tokio::test]
    async fn live_writes_are_delivered() {
        let tmp = TempDir::new().unwrap();
        let mut watcher = GenerationWatcher::start(tmp.path()).unwrap();

        // Give the OS watch a moment to become effective.
        tokio::time::sleep(Duration::from_millis(100)).await;
        let path = tmp.path().join("apply.out");
        fs::write(&path, "hello\n").unwrap();

        let seen = timeout(Duration::from_secs(3), watcher.next())
            .await
            .expect("watcher should deliver the create event")
            .unwrap();
        assert_eq!(seen.file_name().unwrap(), "apply.out");
    }

    #[tokio::test]
    async fn watching_a_missing_directory_fails() {
        let tmp = TempDir::new().unwrap();
        let missing = tmp.path().join("nope");
        assert!(GenerationWatcher::start(&missing).is_err());
    }
}
