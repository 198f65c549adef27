//! # Auto-Update Configuration Module
//!
//! Provides configuration management for the cached-file auto-update core.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct an
//! `AutoUpdateConfig` that holds every bridge the core talks to plus the
//! tunables of the change-detection engine. It enforces fail-fast validation
//! so a missing capability is reported at startup rather than on the first
//! file change.
//!
//! ## Required Dependencies
//!
//! - `TransferEngine` - Executes uploads and bulk cancellation
//! - `AccountContext` - Identifies the current account for clean-up
//!
//! ## Optional Dependencies (with platform defaults)
//!
//! - `FileSystemAccess` - Existence checks and cache deletion (desktop default: tokio fs)
//! - `FileWatcher` - Per-path change notifications (desktop default: `notify`)
//! - `UserNotifier` - Success/failure messages (desktop default: log only)
//! - `CachePathResolver` - Local cache path of a remote object (default: [`CacheLayout`])
//! - `Clock` - Time source (default: system clock)
//!
//! When the `desktop-shims` feature is enabled, desktop-ready defaults for
//! the data directory, filesystem, watcher and notifier are injected automatically if not
//! provided.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::AutoUpdateConfig;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let config = AutoUpdateConfig::builder()
//!     .data_dir("/home/alice/.cloud-client")
//!     .transfer_engine(Arc::new(MyTransferEngine))
//!     .account_context(Arc::new(MyAccounts))
//!     .recreate_check_delay(Duration::from_secs(5))
//!     .build()?;
//! ```

use crate::error::{Error, Result};
use crate::layout::{CacheLayout, CachePathResolver};
use bridge_traits::{
    AccountContext, Clock, FileSystemAccess, FileWatcher, SystemClock, TransferEngine,
    UserNotifier,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Default delay before a vanished watched file is checked again.
pub const DEFAULT_RECREATE_CHECK_DELAY: Duration = Duration::from_millis(5000);

/// Default window during which a freshly opened image/PDF ignores change events.
pub const DEFAULT_RECENT_OPEN_WINDOW: Duration = Duration::from_secs(10);

/// Upper bound for both time windows.
pub const MAX_WINDOW: Duration = Duration::from_secs(600);

/// Configuration for the auto-update core.
///
/// Use [`AutoUpdateConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct AutoUpdateConfig {
    /// Root directory holding the cache tree, its swap directory and its index
    pub data_dir: PathBuf,

    /// Delay before a deleted watched file is checked for re-creation
    pub recreate_check_delay: Duration,

    /// How long a freshly opened image/PDF suppresses change events
    pub recent_open_window: Duration,

    /// Capacity of the event bus channel
    pub event_buffer_size: usize,

    /// Capacity of the command channel feeding the event loop
    pub command_buffer_size: usize,

    /// File system access abstraction
    pub file_system: Arc<dyn FileSystemAccess>,

    /// Per-path change notification primitive
    pub file_watcher: Arc<dyn FileWatcher>,

    /// Upload execution engine (required)
    pub transfer_engine: Arc<dyn TransferEngine>,

    /// User notification surface
    pub notifier: Arc<dyn UserNotifier>,

    /// Current account source (required)
    pub account_context: Arc<dyn AccountContext>,

    /// Remote object to local cache path mapping
    pub cache_path_resolver: Arc<dyn CachePathResolver>,

    /// Time source
    pub clock: Arc<dyn Clock>,

    /// Feature flags
    pub features: FeatureFlags,
}

impl std::fmt::Debug for AutoUpdateConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AutoUpdateConfig")
            .field("data_dir", &self.data_dir)
            .field("recreate_check_delay", &self.recreate_check_delay)
            .field("recent_open_window", &self.recent_open_window)
            .field("event_buffer_size", &self.event_buffer_size)
            .field("command_buffer_size", &self.command_buffer_size)
            .field("file_system", &"FileSystemAccess { ... }")
            .field("file_watcher", &"FileWatcher { ... }")
            .field("transfer_engine", &"TransferEngine { ... }")
            .field("notifier", &"UserNotifier { ... }")
            .field("account_context", &"AccountContext { ... }")
            .field("cache_path_resolver", &"CachePathResolver { ... }")
            .field("features", &self.features)
            .finish()
    }
}

/// Feature flags control optional behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureFlags {
    /// Ignore change events on images/PDFs opened within `recent_open_window`.
    ///
    /// Some viewers touch files they display without modifying them.
    pub suppress_recently_opened_media: bool,

    /// Run the account clean-up (and cache reaper) when the service starts
    pub clean_on_start: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            suppress_recently_opened_media: cfg!(target_os = "macos"),
            clean_on_start: true,
        }
    }
}

impl AutoUpdateConfig {
    /// Creates a new builder for constructing an `AutoUpdateConfig`.
    pub fn builder() -> AutoUpdateConfigBuilder {
        AutoUpdateConfigBuilder::default()
    }

    /// The default cache layout under `data_dir`.
    pub fn cache_layout(&self) -> CacheLayout {
        CacheLayout::new(self.data_dir.clone())
    }

    /// Validates the configuration and returns an error if invalid.
    ///
    /// This checks:
    /// - Data directory is not empty
    /// - Time windows are non-zero and at most ten minutes
    /// - Channel capacities are non-zero
    pub fn validate(&self) -> Result<()> {
        if self.data_dir.as_os_str().is_empty() {
            return Err(Error::Config("Data directory cannot be empty".to_string()));
        }

        if self.recreate_check_delay.is_zero() {
            return Err(Error::Config(
                "Recreate check delay must be greater than 0".to_string(),
            ));
        }

        if self.recreate_check_delay > MAX_WINDOW {
            return Err(Error::Config(format!(
                "Recreate check delay exceeds maximum of {} seconds",
                MAX_WINDOW.as_secs()
            )));
        }

        if self.recent_open_window > MAX_WINDOW {
            return Err(Error::Config(format!(
                "Recent open window exceeds maximum of {} seconds",
                MAX_WINDOW.as_secs()
            )));
        }

        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "Event buffer size must be greater than 0".to_string(),
            ));
        }

        if self.command_buffer_size == 0 {
            return Err(Error::Config(
                "Command buffer size must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

fn capability_missing(capability: &str, message: &str) -> Error {
    Error::CapabilityMissing {
        capability: capability.to_string(),
        message: message.to_string(),
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_data_dir() -> Result<PathBuf> {
    Ok(bridge_desktop::default_data_dir())
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_data_dir() -> Result<PathBuf> {
    Err(Error::Config(
        "Data directory is required. Use .data_dir() to set it.".to_string(),
    ))
}

#[cfg(feature = "desktop-shims")]
fn provide_default_file_system() -> Result<Arc<dyn FileSystemAccess>> {
    Ok(Arc::new(bridge_desktop::TokioFileSystem::new()))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_file_system() -> Result<Arc<dyn FileSystemAccess>> {
    Err(capability_missing(
        "FileSystemAccess",
        "FileSystemAccess implementation is required to inspect cached files. \
         Desktop: ensure the 'desktop-shims' feature is enabled to use the default TokioFileSystem.",
    ))
}

#[cfg(feature = "desktop-shims")]
fn provide_default_file_watcher() -> Result<Arc<dyn FileWatcher>> {
    let watcher = bridge_desktop::NotifyFileWatcher::new().map_err(|e| {
        Error::Internal(format!("Failed to initialize default FileWatcher: {}", e))
    })?;
    Ok(Arc::new(watcher))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_file_watcher() -> Result<Arc<dyn FileWatcher>> {
    Err(capability_missing(
        "FileWatcher",
        "FileWatcher implementation is required for change detection. \
         Desktop: ensure the 'desktop-shims' feature is enabled to use the default NotifyFileWatcher.",
    ))
}

#[cfg(feature = "desktop-shims")]
fn provide_default_notifier() -> Result<Arc<dyn UserNotifier>> {
    Ok(Arc::new(bridge_desktop::TracingNotifier))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_notifier() -> Result<Arc<dyn UserNotifier>> {
    Err(capability_missing(
        "UserNotifier",
        "UserNotifier implementation is required to report upload results. \
         Desktop: ensure the 'desktop-shims' feature is enabled to use the default TracingNotifier.",
    ))
}

/// Builder for constructing [`AutoUpdateConfig`] instances.
#[derive(Default)]
pub struct AutoUpdateConfigBuilder {
    data_dir: Option<PathBuf>,
    recreate_check_delay: Option<Duration>,
    recent_open_window: Option<Duration>,
    event_buffer_size: Option<usize>,
    command_buffer_size: Option<usize>,
    file_system: Option<Arc<dyn FileSystemAccess>>,
    file_watcher: Option<Arc<dyn FileWatcher>>,
    transfer_engine: Option<Arc<dyn TransferEngine>>,
    notifier: Option<Arc<dyn UserNotifier>>,
    account_context: Option<Arc<dyn AccountContext>>,
    cache_path_resolver: Option<Arc<dyn CachePathResolver>>,
    clock: Option<Arc<dyn Clock>>,
    features: Option<FeatureFlags>,
}

impl AutoUpdateConfigBuilder {
    /// Sets the data directory holding the cache tree and its index.
    pub fn data_dir<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.data_dir = Some(path.into());
        self
    }

    /// Sets the delay before a vanished file is checked again (default 5s).
    pub fn recreate_check_delay(mut self, delay: Duration) -> Self {
        self.recreate_check_delay = Some(delay);
        self
    }

    /// Sets the recently-opened media window (default 10s).
    pub fn recent_open_window(mut self, window: Duration) -> Self {
        self.recent_open_window = Some(window);
        self
    }

    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    pub fn command_buffer_size(mut self, size: usize) -> Self {
        self.command_buffer_size = Some(size);
        self
    }

    pub fn file_system(mut self, fs: Arc<dyn FileSystemAccess>) -> Self {
        self.file_system = Some(fs);
        self
    }

    pub fn file_watcher(mut self, watcher: Arc<dyn FileWatcher>) -> Self {
        self.file_watcher = Some(watcher);
        self
    }

    pub fn transfer_engine(mut self, engine: Arc<dyn TransferEngine>) -> Self {
        self.transfer_engine = Some(engine);
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn UserNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn account_context(mut self, context: Arc<dyn AccountContext>) -> Self {
        self.account_context = Some(context);
        self
    }

    /// Overrides the default [`CacheLayout`] path mapping.
    pub fn cache_path_resolver(mut self, resolver: Arc<dyn CachePathResolver>) -> Self {
        self.cache_path_resolver = Some(resolver);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Enables or disables the recently-opened media suppression.
    pub fn suppress_recently_opened_media(mut self, enabled: bool) -> Self {
        let mut features = self.features.unwrap_or_default();
        features.suppress_recently_opened_media = enabled;
        self.features = Some(features);
        self
    }

    /// Enables or disables clean-up on start.
    pub fn clean_on_start(mut self, enabled: bool) -> Self {
        let mut features = self.features.unwrap_or_default();
        features.clean_on_start = enabled;
        self.features = Some(features);
        self
    }

    pub fn features(mut self, features: FeatureFlags) -> Self {
        self.features = Some(features);
        self
    }

    /// Builds the final `AutoUpdateConfig` instance.
    ///
    /// # Returns
    ///
    /// Returns an error if:
    /// - The data directory is missing and no desktop default is available
    /// - Required bridges are missing (TransferEngine, AccountContext)
    /// - Optional bridges are missing and no desktop default is available
    /// - Configuration values are invalid
    pub fn build(self) -> Result<AutoUpdateConfig> {
        let data_dir = match self.data_dir {
            Some(dir) => dir,
            None => provide_default_data_dir()?,
        };

        let transfer_engine = self.transfer_engine.ok_or_else(|| {
            capability_missing(
                "TransferEngine",
                "TransferEngine implementation is required to upload modified files. \
                 Inject the host's transfer manager adapter.",
            )
        })?;

        let account_context = self.account_context.ok_or_else(|| {
            capability_missing(
                "AccountContext",
                "AccountContext implementation is required to scope cache clean-up \
                 to the current account.",
            )
        })?;

        let file_system = match self.file_system {
            Some(fs) => fs,
            None => provide_default_file_system()?,
        };

        let file_watcher = match self.file_watcher {
            Some(watcher) => watcher,
            None => provide_default_file_watcher()?,
        };

        let notifier = match self.notifier {
            Some(notifier) => notifier,
            None => provide_default_notifier()?,
        };

        let cache_path_resolver = self
            .cache_path_resolver
            .unwrap_or_else(|| Arc::new(CacheLayout::new(data_dir.clone())));

        let config = AutoUpdateConfig {
            data_dir,
            recreate_check_delay: self
                .recreate_check_delay
                .unwrap_or(DEFAULT_RECREATE_CHECK_DELAY),
            recent_open_window: self.recent_open_window.unwrap_or(DEFAULT_RECENT_OPEN_WINDOW),
            event_buffer_size: self
                .event_buffer_size
                .unwrap_or(crate::events::DEFAULT_EVENT_BUFFER_SIZE),
            command_buffer_size: self.command_buffer_size.unwrap_or(256),
            file_system,
            file_watcher,
            transfer_engine,
            notifier,
            account_context,
            cache_path_resolver,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            features: self.features.unwrap_or_default(),
        };

        config.validate()?;

        Ok(config)
    }
}
