//! # Cache Reaper
//!
//! Removes the whole local cache tree and its index in the background when
//! an account is cleaned up. Runs on its own task and touches only the
//! well-known cache paths, never the watch state.
//!
//! Order:
//! 1. delete the index file if present
//! 2. delete a leftover swap directory if present
//! 3. rename the cache directory to the swap name, then delete it
//!
//! The rename is atomic, so a crash during the recursive delete leaves a
//! partial swap directory (removed by step 2 of the next run) and never a
//! half-deleted primary cache directory.

use bridge_traits::FileSystemAccess;
use core_runtime::events::{CacheEvent, CoreEvent, EventBus};
use core_runtime::layout::CacheLayout;
use std::path::Path;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Counts of what one reaper run did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReapReport {
    pub removed: u32,
    pub failures: u32,
}

#[derive(Clone)]
pub struct CacheReaper {
    fs: Arc<dyn FileSystemAccess>,
    layout: CacheLayout,
    event_bus: EventBus,
}

impl CacheReaper {
    pub fn new(fs: Arc<dyn FileSystemAccess>, layout: CacheLayout, event_bus: EventBus) -> Self {
        Self {
            fs,
            layout,
            event_bus,
        }
    }

    /// Run the removal on a separate task.
    pub fn spawn(&self) -> JoinHandle<ReapReport> {
        let reaper = self.clone();
        tokio::spawn(async move { reaper.reap().await })
    }

    /// Remove the index, the swap directory and the cache tree.
    ///
    /// Failures are logged and counted; running it again is harmless.
    pub async fn reap(&self) -> ReapReport {
        info!("Removing cached files");
        let _ = self.event_bus.emit(CoreEvent::Cache(CacheEvent::ReapStarted));

        let mut report = ReapReport::default();
        let index_file = self.layout.index_file();
        let temp_dir = self.layout.temp_dir();
        let cache_dir = self.layout.cache_dir();

        if self.present(&index_file).await {
            match self.fs.delete_file(&index_file).await {
                Ok(()) => report.removed += 1,
                Err(e) => {
                    warn!("Failed to remove cache index: {}", e);
                    report.failures += 1;
                }
            }
        }

        if self.present(&temp_dir).await {
            self.remove_dir(&temp_dir, &mut report).await;
        }

        if self.present(&cache_dir).await {
            match self.fs.rename(&cache_dir, &temp_dir).await {
                Ok(()) => self.remove_dir(&temp_dir, &mut report).await,
                Err(e) => {
                    warn!("Failed to move cache directory aside: {}", e);
                    report.failures += 1;
                }
            }
        }

        info!(
            removed = report.removed,
            failures = report.failures,
            "Finished removing cached files"
        );
        let _ = self
            .event_bus
            .emit(CoreEvent::Cache(CacheEvent::ReapCompleted {
                removed: report.removed,
                failures: report.failures,
            }));
        report
    }

    async fn present(&self, path: &Path) -> bool {
        self.fs.exists(path).await.unwrap_or_else(|e| {
            warn!(path = ?path, "Failed to check cache path: {}", e);
            false
        })
    }

    async fn remove_dir(&self, path: &Path, report: &mut ReapReport) {
        match self.fs.delete_dir_all(path).await {
            Ok(()) => report.removed += 1,
            Err(e) => {
                warn!(path = ?path, "Failed to remove cache directory: {}", e);
                report.failures += 1;
            }
        }
    }
}

impl std::fmt::Debug for CacheReaper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheReaper")
            .field("layout", &self.layout)
            .finish()
    }
}
