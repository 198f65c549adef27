//! Filesystem Change Notifications
//!
//! Abstracts the per-path notification primitive the host platform provides
//! (inotify, FSEvents, ReadDirectoryChangesW, ...). The core arms a path when
//! it starts watching a cached file and disarms it while an event for that
//! path is being handled.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::Result;

/// Callback invoked with the affected path whenever an armed path changes.
///
/// Implementations may deliver false positives (metadata-only touches) and
/// may coalesce bursts; the core tolerates both.
pub type ChangeHandler = Arc<dyn Fn(PathBuf) + Send + Sync>;

/// Per-path change notification trait
///
/// # Contract
///
/// - `arm` on an already armed path succeeds without side effects.
/// - `disarm` on a path that is not armed succeeds without side effects.
/// - Failures are reported, but callers treat them as best-effort.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::watcher::FileWatcher;
///
/// fn start_watching(watcher: &dyn FileWatcher, path: &Path) {
///     if let Err(e) = watcher.arm(path) {
///         tracing::warn!("failed to watch {}: {}", path.display(), e);
///     }
/// }
/// ```
pub trait FileWatcher: Send + Sync {
    /// Enable change notifications for `path`
    fn arm(&self, path: &Path) -> Result<()>;

    /// Disable change notifications for `path`
    fn disarm(&self, path: &Path) -> Result<()>;

    /// Whether notifications are currently enabled for `path`
    fn is_armed(&self, path: &Path) -> bool;

    /// Install the callback that receives change events
    ///
    /// Replaces any previously installed handler.
    fn set_change_handler(&self, handler: ChangeHandler);
}
