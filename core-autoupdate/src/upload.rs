//! # Upload Coordinator
//!
//! Starts the re-upload of a locally modified cached file on the external
//! transfer engine and applies the terminal result to the registry.
//!
//! Each upload runs in its own task; its single [`UploadCompletion`] is sent
//! back to the event loop, which calls [`UploadCoordinator::finish`].
//!
//! ## Outcomes
//!
//! | Status    | Registry                          | User notification |
//! |-----------|-----------------------------------|-------------------|
//! | Succeeded | re-armed, `uploading` cleared     | "Upload Success"  |
//! | Failed    | entry removed, no retry           | "Upload Failure"  |
//! | Cancelled | entry removed                     | none              |
//!
//! Every upload gets an id stored on the entry while it runs. A completion
//! whose id no longer matches the entry leaves the registry untouched.

use crate::error::AutoUpdateError;
use crate::registry::WatchRegistry;
use crate::types::{file_name, parent_dir, UploadCompletion, UploadStatus, WatchedFileInfo};
use bridge_traits::{TransferEngine, UploadRequest, UserNotification, UserNotifier};
use core_runtime::events::{AutoUpdateEvent, CoreEvent, EventBus, WatchEndReason};
use core_runtime::logging::strip_path;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

pub const UPLOAD_SUCCESS_TITLE: &str = "Upload Success";
pub const UPLOAD_FAILURE_TITLE: &str = "Upload Failure";

pub fn success_message(file_name: &str) -> String {
    format!("File \"{}\"\nuploaded successfully.", file_name)
}

pub fn failure_message(file_name: &str) -> String {
    format!("File \"{}\"\nfailed to upload.", file_name)
}

pub struct UploadCoordinator {
    engine: Arc<dyn TransferEngine>,
    notifier: Arc<dyn UserNotifier>,
    event_bus: EventBus,
    completions: mpsc::UnboundedSender<UploadCompletion>,
    next_upload_id: AtomicU64,
}

impl UploadCoordinator {
    pub fn new(
        engine: Arc<dyn TransferEngine>,
        notifier: Arc<dyn UserNotifier>,
        event_bus: EventBus,
        completions: mpsc::UnboundedSender<UploadCompletion>,
    ) -> Self {
        Self {
            engine,
            notifier,
            event_bus,
            completions,
            next_upload_id: AtomicU64::new(1),
        }
    }

    /// Mark `info` as uploading under a fresh upload id, build the overwrite
    /// upload and start it in the background.
    ///
    /// Returns the request handed to the transfer engine.
    pub fn start_upload(&self, info: &mut WatchedFileInfo, local_path: &Path) -> UploadRequest {
        let upload_id = self.next_upload_id.fetch_add(1, Ordering::Relaxed);
        info.uploading = true;
        info.upload_id = Some(upload_id);

        let request = UploadRequest {
            upload_id,
            account: info.account.clone(),
            repo_id: info.repo_id.clone(),
            parent_dir: parent_dir(&info.path_in_repo),
            path_in_repo: info.path_in_repo.clone(),
            local_path: local_path.to_path_buf(),
            remote_name: file_name(local_path),
            overwrite: true,
        };

        info!(
            upload_id,
            repo_id = %request.repo_id,
            file = %request.remote_name,
            "Uploading new version of cached file"
        );
        let _ = self
            .event_bus
            .emit(CoreEvent::AutoUpdate(AutoUpdateEvent::UploadStarted {
                repo_id: request.repo_id.clone(),
                path_in_repo: request.path_in_repo.clone(),
            }));

        let engine = Arc::clone(&self.engine);
        let completions = self.completions.clone();
        let task_request = request.clone();
        tokio::spawn(async move {
            let status = match engine.upload(task_request.clone()).await {
                Ok(()) => UploadStatus::Succeeded,
                Err(e) if e.is_cancelled() => UploadStatus::Cancelled,
                Err(e) => UploadStatus::Failed(e.to_string()),
            };
            let completion = UploadCompletion {
                upload_id: task_request.upload_id,
                repo_id: task_request.repo_id,
                path_in_repo: task_request.path_in_repo,
                local_path: task_request.local_path,
                status,
            };
            if completions.send(completion).is_err() {
                debug!("Upload finished after the event loop stopped");
            }
        });

        request
    }

    /// Apply a terminal upload result.
    ///
    /// The registry is only touched when the entry for the path is still
    /// waiting on this very upload. A completion for an upload that was
    /// superseded (the entry was dropped and registered again since) still
    /// reports its result but leaves the current entry alone.
    pub async fn finish(&self, completion: UploadCompletion, registry: &mut WatchRegistry) {
        let local_path = completion.local_path.as_path();
        let name = file_name(local_path);
        let current = registry
            .get(local_path)
            .is_some_and(|entry| entry.upload_id == Some(completion.upload_id));
        if !current {
            debug!(upload_id = completion.upload_id, file = %name, "Completion for superseded upload");
        }

        match &completion.status {
            UploadStatus::Succeeded => {
                info!(file = %strip_path(&local_path.to_string_lossy()), "Uploaded new version of cached file");
                if current {
                    if let Some(entry) = registry.get_mut(local_path) {
                        entry.uploading = false;
                        entry.upload_id = None;
                    }
                    registry.arm(local_path);
                }
                let _ = self
                    .event_bus
                    .emit(CoreEvent::AutoUpdate(AutoUpdateEvent::FileUpdated {
                        repo_id: completion.repo_id.clone(),
                        path_in_repo: completion.path_in_repo.clone(),
                    }));
                self.notify(UPLOAD_SUCCESS_TITLE, success_message(&name), &completion.repo_id)
                    .await;
            }
            UploadStatus::Failed(message) => {
                let err = AutoUpdateError::UploadFailure {
                    path: local_path.to_path_buf(),
                    message: message.clone(),
                };
                warn!("{}", err);
                let _ = self
                    .event_bus
                    .emit(CoreEvent::AutoUpdate(AutoUpdateEvent::UploadFailed {
                        repo_id: completion.repo_id.clone(),
                        path_in_repo: completion.path_in_repo.clone(),
                        message: message.clone(),
                    }));
                if current {
                    registry.unregister(local_path);
                    self.emit_watch_ended(&completion, WatchEndReason::UploadFailed);
                }
                self.notify(UPLOAD_FAILURE_TITLE, failure_message(&name), &completion.repo_id)
                    .await;
            }
            UploadStatus::Cancelled => {
                debug!(file = %name, "Upload cancelled");
                if current {
                    registry.unregister(local_path);
                    self.emit_watch_ended(&completion, WatchEndReason::UploadFailed);
                }
            }
        }
    }

    fn emit_watch_ended(&self, completion: &UploadCompletion, reason: WatchEndReason) {
        let _ = self
            .event_bus
            .emit(CoreEvent::AutoUpdate(AutoUpdateEvent::WatchEnded {
                repo_id: completion.repo_id.clone(),
                path_in_repo: completion.path_in_repo.clone(),
                reason,
            }));
    }

    async fn notify(&self, title: &str, body: String, repo_id: &str) {
        let notification = UserNotification::new(title, body, repo_id);
        if let Err(e) = self.notifier.notify(notification).await {
            warn!("Failed to show upload notification: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FakeTransferEngine, RecordingNotifier, RecordingWatcher, UploadScript};
    use bridge_traits::{AccountId, FileWatcher};
    use std::path::PathBuf;

    struct Fixture {
        engine: Arc<FakeTransferEngine>,
        notifier: Arc<RecordingNotifier>,
        watcher: Arc<RecordingWatcher>,
        bus: EventBus,
        coordinator: UploadCoordinator,
        completions: mpsc::UnboundedReceiver<UploadCompletion>,
    }

    fn fixture() -> Fixture {
        let engine = Arc::new(FakeTransferEngine::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let bus = EventBus::new(16);
        let (tx, rx) = mpsc::unbounded_channel();
        let coordinator = UploadCoordinator::new(engine.clone(), notifier.clone(), bus.clone(), tx);
        Fixture {
            engine,
            notifier,
            watcher: Arc::new(RecordingWatcher::default()),
            bus,
            coordinator,
            completions: rx,
        }
    }

    fn report() -> (PathBuf, WatchedFileInfo) {
        (
            PathBuf::from("/data/file-cache/repo-x/docs/report.docx"),
            WatchedFileInfo::new(AccountId::new("alice"), "repo-x", "/docs/report.docx"),
        )
    }

    fn completion(upload_id: u64, path: &Path, status: UploadStatus) -> UploadCompletion {
        UploadCompletion {
            upload_id,
            repo_id: "repo-x".to_string(),
            path_in_repo: "/docs/report.docx".to_string(),
            local_path: path.to_path_buf(),
            status,
        }
    }

    /// Registers `info` with upload `upload_id` in flight.
    fn uploading(registry: &mut WatchRegistry, path: &Path, info: WatchedFileInfo, upload_id: u64) {
        registry.register_entry(path.to_path_buf(), info);
        let entry = registry.get_mut(path).unwrap();
        entry.uploading = true;
        entry.upload_id = Some(upload_id);
        registry.disarm(path);
    }

    #[tokio::test]
    async fn test_start_upload_builds_overwrite_request() {
        let mut fx = fixture();
        let (path, mut info) = report();

        let request = fx.coordinator.start_upload(&mut info, &path);

        assert_eq!(request.parent_dir, "/docs");
        assert_eq!(request.remote_name, "report.docx");
        assert!(request.overwrite);
        assert!(info.uploading);
        assert_eq!(info.upload_id, Some(request.upload_id));

        let completion = fx.completions.recv().await.unwrap();
        assert!(completion.is_success());
        assert_eq!(completion.upload_id, request.upload_id);
        assert_eq!(completion.local_path, path);
        assert_eq!(fx.engine.requests.lock().as_slice(), &[request]);
    }

    #[tokio::test]
    async fn test_upload_ids_are_unique() {
        let fx = fixture();
        let (path, mut info) = report();

        let first = fx.coordinator.start_upload(&mut info, &path);
        let second = fx.coordinator.start_upload(&mut info, &path);

        assert_ne!(first.upload_id, second.upload_id);
        assert_eq!(info.upload_id, Some(second.upload_id));
    }

    #[tokio::test]
    async fn test_failed_upload_reports_failure_status() {
        let mut fx = fixture();
        fx.engine.script(UploadScript::Fail);
        let (path, mut info) = report();

        fx.coordinator.start_upload(&mut info, &path);

        let completion = fx.completions.recv().await.unwrap();
        assert!(matches!(completion.status, UploadStatus::Failed(_)));
    }

    #[tokio::test]
    async fn test_finish_success_rearms_and_notifies() {
        let fx = fixture();
        let mut events = fx.bus.subscribe();
        let mut registry = WatchRegistry::new(fx.watcher.clone());
        let (path, info) = report();
        uploading(&mut registry, &path, info, 1);

        fx.coordinator
            .finish(completion(1, &path, UploadStatus::Succeeded), &mut registry)
            .await;

        let entry = registry.get(&path).unwrap();
        assert!(!entry.uploading);
        assert_eq!(entry.upload_id, None);
        assert!(fx.watcher.is_armed(&path));
        assert_eq!(
            events.recv().await.unwrap(),
            CoreEvent::AutoUpdate(AutoUpdateEvent::FileUpdated {
                repo_id: "repo-x".to_string(),
                path_in_repo: "/docs/report.docx".to_string(),
            })
        );
        let sent = fx.notifier.sent.lock();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].title, "Upload Success");
        assert_eq!(sent[0].body, "File \"report.docx\"\nuploaded successfully.");
        assert_eq!(sent[0].context_id, "repo-x");
    }

    #[tokio::test]
    async fn test_finish_success_for_removed_watch_does_not_rearm() {
        let fx = fixture();
        let mut registry = WatchRegistry::new(fx.watcher.clone());
        let (path, _) = report();

        fx.coordinator
            .finish(completion(1, &path, UploadStatus::Succeeded), &mut registry)
            .await;

        assert!(!registry.contains(&path));
        assert!(!fx.watcher.is_armed(&path));
        assert_eq!(fx.notifier.sent.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_superseded_success_leaves_newer_upload_in_flight() {
        let fx = fixture();
        let mut registry = WatchRegistry::new(fx.watcher.clone());
        let (path, info) = report();
        uploading(&mut registry, &path, info, 2);

        fx.coordinator
            .finish(completion(1, &path, UploadStatus::Succeeded), &mut registry)
            .await;

        let entry = registry.get(&path).unwrap();
        assert!(entry.uploading);
        assert_eq!(entry.upload_id, Some(2));
        assert!(!fx.watcher.is_armed(&path));
    }

    #[tokio::test]
    async fn test_superseded_cancel_keeps_newer_watch() {
        let fx = fixture();
        let mut registry = WatchRegistry::new(fx.watcher.clone());
        let (path, info) = report();
        uploading(&mut registry, &path, info, 2);

        fx.coordinator
            .finish(completion(1, &path, UploadStatus::Cancelled), &mut registry)
            .await;
        assert!(registry.contains(&path));

        fx.coordinator
            .finish(completion(2, &path, UploadStatus::Succeeded), &mut registry)
            .await;
        assert!(!registry.get(&path).unwrap().uploading);
        assert!(fx.watcher.is_armed(&path));
    }

    #[tokio::test]
    async fn test_superseded_failure_notifies_but_keeps_watch() {
        let fx = fixture();
        let mut registry = WatchRegistry::new(fx.watcher.clone());
        let (path, info) = report();
        uploading(&mut registry, &path, info, 2);

        fx.coordinator
            .finish(
                completion(1, &path, UploadStatus::Failed("timeout".to_string())),
                &mut registry,
            )
            .await;

        assert!(registry.contains(&path));
        assert_eq!(fx.notifier.sent.lock()[0].title, "Upload Failure");
    }

    #[tokio::test]
    async fn test_finish_failure_removes_watch() {
        let fx = fixture();
        let mut registry = WatchRegistry::new(fx.watcher.clone());
        let (path, info) = report();
        uploading(&mut registry, &path, info, 1);

        fx.coordinator
            .finish(
                completion(1, &path, UploadStatus::Failed("quota exceeded".to_string())),
                &mut registry,
            )
            .await;

        assert!(!registry.contains(&path));
        assert!(!fx.watcher.is_armed(&path));
        let sent = fx.notifier.sent.lock();
        assert_eq!(sent[0].title, "Upload Failure");
        assert_eq!(sent[0].body, "File \"report.docx\"\nfailed to upload.");
    }

    #[tokio::test]
    async fn test_finish_cancelled_is_silent() {
        let fx = fixture();
        let mut registry = WatchRegistry::new(fx.watcher.clone());
        let (path, info) = report();
        uploading(&mut registry, &path, info, 1);

        fx.coordinator
            .finish(completion(1, &path, UploadStatus::Cancelled), &mut registry)
            .await;

        assert!(!registry.contains(&path));
        assert!(fx.notifier.sent.lock().is_empty());
    }
}
