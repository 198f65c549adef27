//! # Change Event Router
//!
//! Classifies a raw "path changed" notification and drives the next step:
//!
//! ```text
//! notification ─► spurious? ──yes──► Suppressed (path stays armed)
//!                    │no
//!                 disarm
//!                    │
//!               registered? ──no──► Stale
//!                    │yes
//!               uploading? ──yes──► AlreadyUploading
//!                    │no
//!               file exists? ──no──► unregister + deferred re-check ► Deferred
//!                    │yes
//!               start upload ─────► UploadStarted
//! ```

use crate::deferred::DeferredDeleteQueue;
use crate::registry::WatchRegistry;
use crate::suppression::SpuriousChangeFilter;
use crate::types::RouteOutcome;
use crate::upload::UploadCoordinator;
use bridge_traits::FileSystemAccess;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Existence check that treats an unreadable path as missing.
pub(crate) async fn file_exists(fs: &dyn FileSystemAccess, path: &Path) -> bool {
    match fs.exists(path).await {
        Ok(exists) => exists,
        Err(e) => {
            warn!(path = ?path, "Failed to check cached file: {}", e);
            false
        }
    }
}

pub struct ChangeEventRouter {
    fs: Arc<dyn FileSystemAccess>,
    suppression: Option<Arc<dyn SpuriousChangeFilter>>,
    recheck_delay: Duration,
}

impl ChangeEventRouter {
    pub fn new(
        fs: Arc<dyn FileSystemAccess>,
        suppression: Option<Arc<dyn SpuriousChangeFilter>>,
        recheck_delay: Duration,
    ) -> Self {
        Self {
            fs,
            suppression,
            recheck_delay,
        }
    }

    #[instrument(skip_all, fields(path = ?local_path))]
    pub async fn route(
        &self,
        local_path: &Path,
        registry: &mut WatchRegistry,
        deferred: &mut DeferredDeleteQueue,
        uploads: &UploadCoordinator,
    ) -> RouteOutcome {
        debug!("Detected cached file change");

        if let Some(filter) = &self.suppression {
            if filter.is_spurious(local_path) {
                debug!("Ignoring change on recently opened media file");
                return RouteOutcome::Suppressed;
            }
        }

        registry.disarm(local_path);

        let info = match registry.lookup(local_path) {
            Ok(info) => info,
            Err(err) => {
                debug!("{}", err);
                return RouteOutcome::Stale;
            }
        };

        if info.uploading {
            debug!("Upload already in flight");
            return RouteOutcome::AlreadyUploading;
        }

        if !file_exists(self.fs.as_ref(), local_path).await {
            debug!("Cached file renamed or removed, scheduling re-check");
            if let Some(entry) = registry.unregister(local_path) {
                deferred.enqueue(entry, self.recheck_delay);
            }
            return RouteOutcome::Deferred;
        }

        uploads.start_upload(info, local_path);
        RouteOutcome::UploadStarted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::suppression::RecentlyOpenedMediaFilter;
    use crate::test_support::{
        FakeTransferEngine, ManualClock, MemoryFs, RecordingNotifier, RecordingWatcher,
    };
    use crate::types::WatchedFileInfo;
    use bridge_traits::{AccountId, FileWatcher};
    use core_runtime::events::EventBus;
    use std::path::PathBuf;
    use tokio::sync::mpsc;

    struct Fixture {
        fs: Arc<MemoryFs>,
        watcher: Arc<RecordingWatcher>,
        registry: WatchRegistry,
        deferred: DeferredDeleteQueue,
        uploads: UploadCoordinator,
        media: Arc<RecentlyOpenedMediaFilter>,
        router: ChangeEventRouter,
        _completions: mpsc::UnboundedReceiver<crate::types::UploadCompletion>,
    }

    fn fixture() -> Fixture {
        let fs = Arc::new(MemoryFs::default());
        let watcher = Arc::new(RecordingWatcher::default());
        let (tx, rx) = mpsc::unbounded_channel();
        let uploads = UploadCoordinator::new(
            Arc::new(FakeTransferEngine::default()),
            Arc::new(RecordingNotifier::default()),
            EventBus::new(16),
            tx,
        );
        let media = Arc::new(RecentlyOpenedMediaFilter::new(
            Arc::new(ManualClock::default()),
            Duration::from_secs(10),
        ));
        let router = ChangeEventRouter::new(
            fs.clone(),
            Some(media.clone() as Arc<dyn SpuriousChangeFilter>),
            Duration::from_secs(5),
        );
        Fixture {
            fs,
            watcher: watcher.clone(),
            registry: WatchRegistry::new(watcher),
            deferred: DeferredDeleteQueue::new(),
            uploads,
            media,
            router,
            _completions: rx,
        }
    }

    fn watch(fx: &mut Fixture, name: &str) -> PathBuf {
        let path = PathBuf::from("/data/file-cache/repo-1").join(name);
        fx.fs.add_file(&path);
        fx.registry.register_entry(
            path.clone(),
            WatchedFileInfo::new(AccountId::new("alice"), "repo-1", format!("/{}", name)),
        );
        path
    }

    async fn route(fx: &mut Fixture, path: &Path) -> RouteOutcome {
        fx.router
            .route(path, &mut fx.registry, &mut fx.deferred, &fx.uploads)
            .await
    }

    #[tokio::test]
    async fn test_existing_file_starts_upload() {
        let mut fx = fixture();
        let path = watch(&mut fx, "notes.txt");

        assert_eq!(route(&mut fx, &path).await, RouteOutcome::UploadStarted);
        assert!(fx.registry.get(&path).unwrap().uploading);
        assert!(!fx.watcher.is_armed(&path));
    }

    #[tokio::test]
    async fn test_second_event_during_upload_is_ignored() {
        let mut fx = fixture();
        let path = watch(&mut fx, "notes.txt");

        route(&mut fx, &path).await;
        assert_eq!(route(&mut fx, &path).await, RouteOutcome::AlreadyUploading);
    }

    #[tokio::test]
    async fn test_missing_file_is_deferred() {
        let mut fx = fixture();
        let path = watch(&mut fx, "notes.txt");
        fx.fs.remove(&path);

        assert_eq!(route(&mut fx, &path).await, RouteOutcome::Deferred);
        assert!(!fx.registry.contains(&path));
        assert!(!fx.watcher.is_armed(&path));
        assert!(fx.deferred.contains("repo-1", "/notes.txt"));
        assert!(fx.deferred.has_pending_timers());
    }

    #[tokio::test]
    async fn test_unregistered_path_is_stale() {
        let mut fx = fixture();
        let path = PathBuf::from("/data/file-cache/repo-1/other.txt");

        assert_eq!(route(&mut fx, &path).await, RouteOutcome::Stale);
        assert!(fx.deferred.is_empty());
    }

    #[tokio::test]
    async fn test_recently_opened_media_is_suppressed_and_stays_armed() {
        let mut fx = fixture();
        let path = watch(&mut fx, "photo.png");
        fx.media.file_opened(&path);

        assert_eq!(route(&mut fx, &path).await, RouteOutcome::Suppressed);
        assert!(fx.watcher.is_armed(&path));
        assert!(!fx.registry.get(&path).unwrap().uploading);
    }
}
