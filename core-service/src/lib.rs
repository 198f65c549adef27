//! Core service façade and bootstrap helpers.
//!
//! This crate wires host-provided bridge implementations (transfer engine,
//! account context, and optionally filesystem, watcher and notifier) into the
//! auto-update core and runs its event loop. Desktop apps typically enable the
//! `desktop-shims` feature, which fills the optional bridges from
//! `bridge-desktop`.
//!
//! ```no_run
//! # async fn example(
//! #     engine: std::sync::Arc<dyn bridge_traits::TransferEngine>,
//! #     accounts: std::sync::Arc<dyn bridge_traits::AccountContext>,
//! # ) -> core_service::Result<()> {
//! use core_service::{AutoUpdateDependencies, AutoUpdateService};
//!
//! let deps = AutoUpdateDependencies::new(engine, accounts);
//! let service = AutoUpdateService::bootstrap("/var/lib/myapp", deps).await?;
//!
//! service
//!     .handle()
//!     .watch_cached_file("alice".into(), "repo-1", "/docs/report.docx")
//!     .await?;
//!
//! service.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod error;

pub use error::{CoreError, Result};

use std::path::{Path, PathBuf};
use std::sync::Arc;

use bridge_traits::{AccountContext, FileSystemAccess, FileWatcher, TransferEngine, UserNotifier};
use core_autoupdate::{AutoUpdateHandle, AutoUpdateManager};
use core_runtime::config::{AutoUpdateConfig, AutoUpdateConfigBuilder};
use core_runtime::events::{EventBus, EventStream};
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Aggregated handle to the bridge dependencies the core requires.
///
/// The transfer engine and account context always come from the host. The
/// remaining bridges fall back to the desktop implementations when
/// `desktop-shims` is enabled.
pub struct AutoUpdateDependencies {
    pub transfer_engine: Arc<dyn TransferEngine>,
    pub account_context: Arc<dyn AccountContext>,
    pub file_system: Option<Arc<dyn FileSystemAccess>>,
    pub file_watcher: Option<Arc<dyn FileWatcher>>,
    pub notifier: Option<Arc<dyn UserNotifier>>,
}

impl AutoUpdateDependencies {
    /// Construct a dependency bundle from the mandatory bridge handles.
    pub fn new(
        transfer_engine: Arc<dyn TransferEngine>,
        account_context: Arc<dyn AccountContext>,
    ) -> Self {
        Self {
            transfer_engine,
            account_context,
            file_system: None,
            file_watcher: None,
            notifier: None,
        }
    }

    pub fn with_file_system(mut self, file_system: Arc<dyn FileSystemAccess>) -> Self {
        self.file_system = Some(file_system);
        self
    }

    pub fn with_file_watcher(mut self, file_watcher: Arc<dyn FileWatcher>) -> Self {
        self.file_watcher = Some(file_watcher);
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn UserNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Hand the bridges to a config builder.
    pub fn apply(self, builder: AutoUpdateConfigBuilder) -> AutoUpdateConfigBuilder {
        let mut builder = builder
            .transfer_engine(self.transfer_engine)
            .account_context(self.account_context);
        if let Some(fs) = self.file_system {
            builder = builder.file_system(fs);
        }
        if let Some(watcher) = self.file_watcher {
            builder = builder.file_watcher(watcher);
        }
        if let Some(notifier) = self.notifier {
            builder = builder.notifier(notifier);
        }
        builder
    }
}

/// Primary façade exposed to host applications.
///
/// Owns the running event loop. Dropping the service without calling
/// [`shutdown`](Self::shutdown) cancels the loop but does not wait for it.
pub struct AutoUpdateService {
    handle: AutoUpdateHandle,
    event_bus: EventBus,
    watcher: Arc<dyn FileWatcher>,
    shutdown: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl AutoUpdateService {
    /// Build a config under `data_dir` from `deps` and start the service.
    pub async fn bootstrap(
        data_dir: impl Into<PathBuf>,
        deps: AutoUpdateDependencies,
    ) -> Result<Self> {
        let config = deps
            .apply(AutoUpdateConfig::builder().data_dir(data_dir))
            .build()?;
        Self::start(config).await
    }

    /// Like [`bootstrap`](Self::bootstrap) with the platform data directory.
    #[cfg(feature = "desktop-shims")]
    pub async fn bootstrap_desktop(deps: AutoUpdateDependencies) -> Result<Self> {
        let config = deps.apply(AutoUpdateConfig::builder()).build()?;
        Self::start(config).await
    }

    /// Spawn the event loop, route watcher callbacks into it and run the
    /// startup clean-up.
    ///
    /// Must be called from within a tokio runtime.
    pub async fn start(config: AutoUpdateConfig) -> Result<Self> {
        let event_bus = EventBus::new(config.event_buffer_size);
        let (manager, handle) = AutoUpdateManager::new(&config, event_bus.clone());

        let shutdown = CancellationToken::new();
        let task = tokio::spawn(manager.run(shutdown.clone()));

        let change_handle = handle.clone();
        config
            .file_watcher
            .set_change_handler(Arc::new(move |path| change_handle.notify_file_changed(path)));

        handle.start().await?;

        info!(data_dir = ?config.data_dir, "Auto-update service started");

        Ok(Self {
            handle,
            event_bus,
            watcher: Arc::clone(&config.file_watcher),
            shutdown,
            task: Mutex::new(Some(task)),
        })
    }

    /// Cloneable handle for watch requests and queries.
    pub fn handle(&self) -> AutoUpdateHandle {
        self.handle.clone()
    }

    /// Subscribe to auto-update and cache events.
    pub fn events(&self) -> EventStream {
        EventStream::new(self.event_bus.subscribe())
    }

    /// Record that the host opened `path` in a viewer.
    pub fn file_opened(&self, path: &Path) {
        self.handle.file_opened(path);
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_closed()
    }

    /// Stop the event loop and wait for it to exit.
    ///
    /// Uploads still in flight keep running on the transfer engine; their
    /// results are discarded.
    pub async fn shutdown(&self) {
        self.watcher.set_change_handler(Arc::new(|_| {}));
        self.shutdown.cancel();

        let task = self.task.lock().take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                warn!("Auto-update loop ended abnormally: {}", e);
            }
            info!("Auto-update service stopped");
        }
    }
}

impl Drop for AutoUpdateService {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

impl std::fmt::Debug for AutoUpdateService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AutoUpdateService")
            .field("running", &self.is_running())
            .finish()
    }
}
