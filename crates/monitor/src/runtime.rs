//! Startup wiring and the event-consumer loop.
//!
//! After bootstrap two loops run until shutdown: this one, consuming
//! filesystem events strictly one at a time in delivery order, and the
//! approval poller. The task cache is the only state they share.

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::watch;
use tracing::{error, info, warn};

use sidelog_config::SidecarConfig;
use sidelog_store::{ResourceRecord, Store};

use crate::approval;
use crate::cache::TaskCache;
use crate::logfile::LogFileName;
use crate::sync::{LineSynchronizer, SyncError};
use crate::watch::{GenerationWatcher, wait_for_generation_dir};

pub struct Monitor {
    config: SidecarConfig,
    store: Arc<dyn Store>,
    cache: Arc<TaskCache>,
    synchronizer: LineSynchronizer,
}

impl Monitor {
    /// Register the cluster and the managed resource with the store.
    ///
    /// Everything that fails here is a startup failure; misconfiguration
    /// does not self-heal, so the caller exits.
    pub async fn bootstrap(config: SidecarConfig, store: Arc<dyn Store>) -> Result<Self> {
        let cluster = store.upsert_cluster(&config.cluster_name).await?;
        let spec_snapshot = read_spec_snapshot(config.spec_path.as_deref());

        let desired = ResourceRecord {
            uid: config.resource_uid.clone(),
            namespace: config.resource_namespace.clone(),
            name: config.resource_name.clone(),
            current_generation: config.resource_generation.clone(),
            cluster_id: cluster.id,
        };
        let (resource, generation_changed) = store
            .get_or_create_resource(&desired, &spec_snapshot)
            .await?;
        if generation_changed {
            info!(
                generation = %resource.current_generation,
                "resource generation advanced; new spec snapshot recorded"
            );
        }
        info!(
            namespace = %resource.namespace,
            name = %resource.name,
            uid = %resource.uid,
            "managed resource registered"
        );

        Ok(Self {
            config,
            store,
            cache: Arc::new(TaskCache::new()),
            synchronizer: LineSynchronizer::new(resource),
        })
    }

    /// Run both loops until the shutdown signal flips or a fatal store
    /// error surfaces. In-flight work finishes before this returns.
    pub async fn run(self, shutdown: watch::Sender<bool>) -> Result<()> {
        let dir = self.config.generation_dir();
        wait_for_generation_dir(&dir, self.config.dir_timeout).await?;

        let mut watcher = GenerationWatcher::start(&dir)?;
        info!(dir = %dir.display(), "watching generation directory");

        let poller = approval::spawn_poller(
            Arc::clone(&self.store),
            Arc::clone(&self.cache),
            dir.clone(),
            self.config.approval_interval,
            &shutdown,
        );

        let mut shutdown_rx = shutdown.subscribe();
        let result = loop {
            tokio::select! {
                event = watcher.next() => {
                    let Some(path) = event else {
                        break Ok(());
                    };
                    if let Err(err) = self.handle_path(&path).await {
                        match err {
                            SyncError::Store(store_err) if store_err.is_fatal() => {
                                error!(path = %path.display(), err = %store_err, "unrecoverable store error");
                                break Err(store_err.into());
                            }
                            err => {
                                warn!(path = %path.display(), ?err, "synchronization attempt abandoned");
                            }
                        }
                    }
                }
                changed = shutdown_rx.changed() => {
                    if changed.is_ok() && *shutdown_rx.borrow() {
                        info!("shutdown requested; draining");
                        break Ok(());
                    }
                }
            }
        };

        // Make sure the poller sees the signal, then let its in-flight
        // cycle finish.
        let _ = shutdown.send(true);
        let _ = poller.await;
        result
    }

    /// Handle one path from the watch stream.
    async fn handle_path(&self, path: &Path) -> Result<(), SyncError> {
        match tokio::fs::metadata(path).await {
            // Directories get no nested watches and no further handling.
            Ok(metadata) if metadata.is_dir() => return Ok(()),
            Ok(_) => {}
            Err(err) => {
                warn!(path = %path.display(), ?err, "stat failed; skipping event");
                return Ok(());
            }
        }

        // A non-matching name is not an error, just not a log file.
        let Some(name) = LogFileName::parse(path) else {
            return Ok(());
        };

        self.synchronizer
            .sync_path(self.store.as_ref(), &self.cache, &name, path)
            .await?;
        Ok(())
    }
}

fn read_spec_snapshot(path: Option<&Path>) -> String {
    let Some(path) = path else {
        return String::new();
    };
    match std::fs::read_to_string(path) {
        Ok(spec) => spec,
        Err(err) => {
            error!(
                path = %path.display(),
                ?err,
                "could not read the resource spec; continuing with an empty snapshot"
            );
            String::new()
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
