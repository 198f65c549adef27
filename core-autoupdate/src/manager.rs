//! # Auto-Update Manager
//!
//! Owns the watch registry, the deferred delete queue and the in-flight
//! uploads, and drives them from a single event loop.
//!
//! ## Overview
//!
//! All state lives in [`AutoUpdateManager`] and is only touched from
//! [`AutoUpdateManager::run`]. The loop multiplexes four sources:
//! - commands from [`AutoUpdateHandle`]s (watch requests, change events, clean-up)
//! - upload completions sent back by upload tasks
//! - re-check timers of the deferred delete queue
//! - the shutdown token
//!
//! Events for one path are therefore handled strictly in arrival order, and
//! no lock is held across the registry and the queue.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_autoupdate::AutoUpdateManager;
//! use core_runtime::events::EventBus;
//! use tokio_util::sync::CancellationToken;
//!
//! let (manager, handle) = AutoUpdateManager::new(&config, EventBus::default());
//! let shutdown = CancellationToken::new();
//! tokio::spawn(manager.run(shutdown.clone()));
//!
//! handle.start().await?;
//! handle
//!     .watch_cached_file(account, "repo-1", "/docs/report.docx")
//!     .await?;
//!
//! // From the platform watcher callback:
//! handle.notify_file_changed(local_path);
//! ```

use crate::deferred::DeferredDeleteQueue;
use crate::error::{AutoUpdateError, Result};
use crate::reaper::{CacheReaper, ReapReport};
use crate::registry::WatchRegistry;
use crate::router::{file_exists, ChangeEventRouter};
use crate::suppression::{RecentlyOpenedMediaFilter, SpuriousChangeFilter};
use crate::types::{
    RecheckOutcome, RouteOutcome, UploadCompletion, WatchOutcome, WatchedFileInfo,
};
use crate::upload::UploadCoordinator;
use bridge_traits::{AccountContext, AccountId, FileSystemAccess, TransferEngine};
use core_runtime::config::AutoUpdateConfig;
use core_runtime::events::{AutoUpdateEvent, CoreEvent, EventBus, WatchEndReason};
use core_runtime::layout::CachePathResolver;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

// ============================================================================
// Commands
// ============================================================================

enum Command {
    Watch {
        account: AccountId,
        repo_id: String,
        path_in_repo: String,
        reply: oneshot::Sender<Result<WatchOutcome>>,
    },
    RemoveWatch {
        local_path: PathBuf,
        reply: oneshot::Sender<bool>,
    },
    FileChanged {
        local_path: PathBuf,
        reply: Option<oneshot::Sender<RouteOutcome>>,
    },
    CleanAccount {
        account: AccountId,
        reply: oneshot::Sender<usize>,
    },
    CleanCurrentAccount {
        reply: oneshot::Sender<()>,
    },
    Start {
        reply: oneshot::Sender<()>,
    },
    IsWatching {
        local_path: PathBuf,
        reply: oneshot::Sender<bool>,
    },
    WatchedPaths {
        reply: oneshot::Sender<Vec<PathBuf>>,
    },
    WatchInfo {
        local_path: PathBuf,
        reply: oneshot::Sender<Option<WatchedFileInfo>>,
    },
    PendingRecheckCount {
        reply: oneshot::Sender<usize>,
    },
}

// ============================================================================
// Manager
// ============================================================================

pub struct AutoUpdateManager {
    registry: WatchRegistry,
    deferred: DeferredDeleteQueue,
    router: ChangeEventRouter,
    uploads: UploadCoordinator,
    reaper: CacheReaper,
    fs: Arc<dyn FileSystemAccess>,
    resolver: Arc<dyn CachePathResolver>,
    transfer_engine: Arc<dyn TransferEngine>,
    account_context: Arc<dyn AccountContext>,
    media_filter: Option<Arc<RecentlyOpenedMediaFilter>>,
    event_bus: EventBus,
    clean_on_start: bool,
    commands: mpsc::Receiver<Command>,
    completions: mpsc::UnboundedReceiver<UploadCompletion>,
}

impl AutoUpdateManager {
    /// Build the manager and the handle that feeds its event loop.
    pub fn new(config: &AutoUpdateConfig, event_bus: EventBus) -> (Self, AutoUpdateHandle) {
        let (command_tx, command_rx) = mpsc::channel(config.command_buffer_size);
        let (completion_tx, completion_rx) = mpsc::unbounded_channel();

        let media_filter = config
            .features
            .suppress_recently_opened_media
            .then(|| {
                Arc::new(RecentlyOpenedMediaFilter::new(
                    Arc::clone(&config.clock),
                    config.recent_open_window,
                ))
            });
        let suppression = media_filter
            .clone()
            .map(|filter| filter as Arc<dyn SpuriousChangeFilter>);

        let manager = Self {
            registry: WatchRegistry::new(Arc::clone(&config.file_watcher)),
            deferred: DeferredDeleteQueue::new(),
            router: ChangeEventRouter::new(
                Arc::clone(&config.file_system),
                suppression,
                config.recreate_check_delay,
            ),
            uploads: UploadCoordinator::new(
                Arc::clone(&config.transfer_engine),
                Arc::clone(&config.notifier),
                event_bus.clone(),
                completion_tx,
            ),
            reaper: CacheReaper::new(
                Arc::clone(&config.file_system),
                config.cache_layout(),
                event_bus.clone(),
            ),
            fs: Arc::clone(&config.file_system),
            resolver: Arc::clone(&config.cache_path_resolver),
            transfer_engine: Arc::clone(&config.transfer_engine),
            account_context: Arc::clone(&config.account_context),
            media_filter: media_filter.clone(),
            event_bus,
            clean_on_start: config.features.clean_on_start,
            commands: command_rx,
            completions: completion_rx,
        };

        let handle = AutoUpdateHandle {
            sender: command_tx,
            media_filter,
        };

        (manager, handle)
    }

    /// Start watching the cached copy of `(repo_id, path_in_repo)`.
    ///
    /// Fails with [`AutoUpdateError::NotCached`] when the local file does not
    /// exist. An object waiting for a re-creation check is left alone.
    pub async fn watch_cached_file(
        &mut self,
        account: AccountId,
        repo_id: &str,
        path_in_repo: &str,
    ) -> Result<WatchOutcome> {
        let local_path = self.resolver.local_cache_path(repo_id, path_in_repo);
        debug!(path = ?local_path, "Watch cached file");

        if !file_exists(self.fs.as_ref(), &local_path).await {
            let err = AutoUpdateError::NotCached { path: local_path };
            warn!("Unable to watch: {}", err);
            return Err(err);
        }

        if self.deferred.contains(repo_id, path_in_repo) {
            debug!(path = ?local_path, "Re-creation check pending, not watching");
            return Ok(WatchOutcome::PendingRecheck);
        }

        self.registry.register_entry(
            local_path.clone(),
            WatchedFileInfo::new(account, repo_id, path_in_repo),
        );
        self.emit(AutoUpdateEvent::WatchStarted {
            repo_id: repo_id.to_string(),
            path_in_repo: path_in_repo.to_string(),
        });

        Ok(WatchOutcome::Watching { local_path })
    }

    /// Stop watching `local_path`. Returns whether it was watched.
    pub fn remove_watch(&mut self, local_path: &Path) -> bool {
        match self.registry.unregister(local_path) {
            Some(info) => {
                self.emit(AutoUpdateEvent::WatchEnded {
                    repo_id: info.repo_id,
                    path_in_repo: info.path_in_repo,
                    reason: WatchEndReason::Removed,
                });
                true
            }
            None => false,
        }
    }

    /// Handle one raw change notification.
    pub async fn on_file_changed(&mut self, local_path: &Path) -> RouteOutcome {
        self.router
            .route(
                local_path,
                &mut self.registry,
                &mut self.deferred,
                &self.uploads,
            )
            .await
    }

    /// Handle one re-check timer: take the oldest deferred entry and see
    /// whether its file came back.
    pub async fn check_file_recreated(&mut self) -> RecheckOutcome {
        let Some(info) = self.deferred.pop_oldest() else {
            debug!("Re-check fired with nothing deferred");
            return RecheckOutcome::Idle;
        };

        let local_path = self
            .resolver
            .local_cache_path(&info.repo_id, &info.path_in_repo);

        if !file_exists(self.fs.as_ref(), &local_path).await {
            debug!(path = ?local_path, "Cached file was removed");
            self.emit(AutoUpdateEvent::WatchEnded {
                repo_id: info.repo_id.clone(),
                path_in_repo: info.path_in_repo.clone(),
                reason: WatchEndReason::Deleted,
            });
            return RecheckOutcome::Dropped {
                repo_id: info.repo_id,
                path_in_repo: info.path_in_repo,
            };
        }

        info!(path = ?local_path, "Detected re-created cached file");
        self.emit(AutoUpdateEvent::RecreateDetected {
            repo_id: info.repo_id.clone(),
            path_in_repo: info.path_in_repo.clone(),
        });
        self.registry.register_entry(local_path.clone(), info);

        RecheckOutcome::Recreated(self.on_file_changed(&local_path).await)
    }

    /// Apply the terminal result of an upload.
    pub async fn on_upload_finished(&mut self, completion: UploadCompletion) {
        self.uploads.finish(completion, &mut self.registry).await;
    }

    /// Wait for the next upload to finish and apply it.
    ///
    /// For hosts and tests that drive the manager without [`run`](Self::run).
    pub async fn wait_for_upload(&mut self) -> Option<UploadCompletion> {
        let completion = self.completions.recv().await?;
        self.on_upload_finished(completion.clone()).await;
        Some(completion)
    }

    /// Cancel `account`'s transfers and drop its watches.
    ///
    /// Deferred entries and their pending re-checks are left alone.
    pub async fn clean_account(&mut self, account: &AccountId) -> usize {
        if let Err(e) = self.transfer_engine.cancel_account_transfers(account).await {
            warn!(account = %account, "Failed to cancel transfers: {}", e);
        }

        let paths = self.registry.snapshot_for_account(account);
        for path in &paths {
            if let Some(info) = self.registry.unregister(path) {
                self.emit(AutoUpdateEvent::WatchEnded {
                    repo_id: info.repo_id,
                    path_in_repo: info.path_in_repo,
                    reason: WatchEndReason::AccountCleaned,
                });
            }
        }

        info!(account = %account, removed = paths.len(), "Cleaned account watches");
        paths.len()
    }

    /// Cancel all downloads, drop the current account's watches, then start
    /// the cache reaper in the background.
    pub async fn clean_current_account(&mut self) -> JoinHandle<ReapReport> {
        debug!("Cancelling all download tasks");
        if let Err(e) = self.transfer_engine.cancel_all_downloads().await {
            warn!("Failed to cancel downloads: {}", e);
        }

        match self.account_context.current_account() {
            Some(account) => {
                self.clean_account(&account).await;
            }
            None => debug!("No current account, skipping watch clean-up"),
        }

        self.reaper.spawn()
    }

    /// Startup clean-up, when enabled.
    pub async fn start(&mut self) -> Option<JoinHandle<ReapReport>> {
        if !self.clean_on_start {
            debug!("Clean on start disabled");
            return None;
        }
        Some(self.clean_current_account().await)
    }

    pub fn is_watching(&self, local_path: &Path) -> bool {
        self.registry.contains(local_path)
    }

    pub fn watched_paths(&self) -> Vec<PathBuf> {
        self.registry.paths()
    }

    pub fn watch_info(&self, local_path: &Path) -> Option<WatchedFileInfo> {
        self.registry.get(local_path).cloned()
    }

    pub fn pending_recheck_count(&self) -> usize {
        self.deferred.len()
    }

    /// The recently-opened media filter, when suppression is enabled.
    pub fn media_filter(&self) -> Option<Arc<RecentlyOpenedMediaFilter>> {
        self.media_filter.clone()
    }

    /// Run the event loop until `shutdown` fires or every handle is dropped.
    pub async fn run(mut self, shutdown: CancellationToken) {
        info!("Auto-update loop started");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                command = self.commands.recv() => match command {
                    Some(command) => self.handle_command(command).await,
                    None => break,
                },
                Some(completion) = self.completions.recv() => {
                    self.on_upload_finished(completion).await;
                }
                Some(()) = self.deferred.next_due(), if self.deferred.has_pending_timers() => {
                    self.check_file_recreated().await;
                }
            }
        }

        info!(
            watched = self.registry.len(),
            deferred = self.deferred.len(),
            "Auto-update loop stopped"
        );
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Watch {
                account,
                repo_id,
                path_in_repo,
                reply,
            } => {
                let result = self
                    .watch_cached_file(account, &repo_id, &path_in_repo)
                    .await;
                let _ = reply.send(result);
            }
            Command::RemoveWatch { local_path, reply } => {
                let _ = reply.send(self.remove_watch(&local_path));
            }
            Command::FileChanged { local_path, reply } => {
                let outcome = self.on_file_changed(&local_path).await;
                if let Some(reply) = reply {
                    let _ = reply.send(outcome);
                }
            }
            Command::CleanAccount { account, reply } => {
                let _ = reply.send(self.clean_account(&account).await);
            }
            Command::CleanCurrentAccount { reply } => {
                self.clean_current_account().await;
                let _ = reply.send(());
            }
            Command::Start { reply } => {
                self.start().await;
                let _ = reply.send(());
            }
            Command::IsWatching { local_path, reply } => {
                let _ = reply.send(self.is_watching(&local_path));
            }
            Command::WatchedPaths { reply } => {
                let _ = reply.send(self.watched_paths());
            }
            Command::WatchInfo { local_path, reply } => {
                let _ = reply.send(self.watch_info(&local_path));
            }
            Command::PendingRecheckCount { reply } => {
                let _ = reply.send(self.pending_recheck_count());
            }
        }
    }

    fn emit(&self, event: AutoUpdateEvent) {
        let _ = self.event_bus.emit(CoreEvent::AutoUpdate(event));
    }
}

impl std::fmt::Debug for AutoUpdateManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AutoUpdateManager")
            .field("registry", &self.registry)
            .field("deferred", &self.deferred)
            .field("clean_on_start", &self.clean_on_start)
            .finish()
    }
}

// ============================================================================
// Handle
// ============================================================================

/// Cloneable front door to a running [`AutoUpdateManager`].
///
/// Every call fails with [`AutoUpdateError::ServiceStopped`] once the event
/// loop has exited.
#[derive(Clone)]
pub struct AutoUpdateHandle {
    sender: mpsc::Sender<Command>,
    media_filter: Option<Arc<RecentlyOpenedMediaFilter>>,
}

impl AutoUpdateHandle {
    async fn request<T>(&self, command: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (reply, response) = oneshot::channel();
        self.sender
            .send(command(reply))
            .await
            .map_err(|_| AutoUpdateError::ServiceStopped)?;
        response.await.map_err(|_| AutoUpdateError::ServiceStopped)
    }

    pub async fn watch_cached_file(
        &self,
        account: AccountId,
        repo_id: impl Into<String>,
        path_in_repo: impl Into<String>,
    ) -> Result<WatchOutcome> {
        let repo_id = repo_id.into();
        let path_in_repo = path_in_repo.into();
        self.request(|reply| Command::Watch {
            account,
            repo_id,
            path_in_repo,
            reply,
        })
        .await?
    }

    pub async fn remove_watch(&self, local_path: impl Into<PathBuf>) -> Result<bool> {
        let local_path = local_path.into();
        self.request(|reply| Command::RemoveWatch { local_path, reply })
            .await
    }

    /// Route a change event and wait for the outcome.
    pub async fn file_changed(&self, local_path: impl Into<PathBuf>) -> Result<RouteOutcome> {
        let local_path = local_path.into();
        self.request(|reply| Command::FileChanged {
            local_path,
            reply: Some(reply),
        })
        .await
    }

    /// Queue a change event without waiting. Safe to call from a
    /// non-async watcher callback; the event is dropped when the queue is full.
    pub fn notify_file_changed(&self, local_path: PathBuf) {
        let command = Command::FileChanged {
            local_path,
            reply: None,
        };
        match self.sender.try_send(command) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(Command::FileChanged { local_path, .. })) => {
                warn!(path = ?local_path, "Change event dropped, command queue full");
            }
            Err(_) => debug!("Change event after shutdown"),
        }
    }

    pub async fn clean_account(&self, account: AccountId) -> Result<usize> {
        self.request(|reply| Command::CleanAccount { account, reply })
            .await
    }

    /// Returns once the watches are gone; the reaper keeps running in the background.
    pub async fn clean_current_account(&self) -> Result<()> {
        self.request(|reply| Command::CleanCurrentAccount { reply })
            .await
    }

    pub async fn start(&self) -> Result<()> {
        self.request(|reply| Command::Start { reply }).await
    }

    pub async fn is_watching(&self, local_path: impl Into<PathBuf>) -> Result<bool> {
        let local_path = local_path.into();
        self.request(|reply| Command::IsWatching { local_path, reply })
            .await
    }

    pub async fn watched_paths(&self) -> Result<Vec<PathBuf>> {
        self.request(|reply| Command::WatchedPaths { reply }).await
    }

    pub async fn watch_info(
        &self,
        local_path: impl Into<PathBuf>,
    ) -> Result<Option<WatchedFileInfo>> {
        let local_path = local_path.into();
        self.request(|reply| Command::WatchInfo { local_path, reply })
            .await
    }

    pub async fn pending_recheck_count(&self) -> Result<usize> {
        self.request(|reply| Command::PendingRecheckCount { reply })
            .await
    }

    /// Record that the host opened `path` in a viewer.
    pub fn file_opened(&self, path: &Path) {
        if let Some(filter) = &self.media_filter {
            filter.file_opened(path);
        }
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

impl std::fmt::Debug for AutoUpdateHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AutoUpdateHandle")
            .field("closed", &self.sender.is_closed())
            .finish()
    }
}
