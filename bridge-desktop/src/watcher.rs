//! File Watcher Implementation using `notify`

use bridge_traits::{
    error::{BridgeError, Result},
    watcher::{ChangeHandler, FileWatcher},
};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// Armed paths keyed by every spelling the backend may report them under.
///
/// Backends such as FSEvents report canonical paths (`/private/var/...`)
/// while the core arms the path it computed from the cache layout.
#[derive(Default)]
struct ArmedPaths {
    by_key: HashMap<PathBuf, PathBuf>,
}

impl ArmedPaths {
    fn insert(&mut self, path: &Path) {
        self.by_key.insert(path.to_path_buf(), path.to_path_buf());
        if let Ok(canonical) = path.canonicalize() {
            self.by_key.insert(canonical, path.to_path_buf());
        }
    }

    fn remove(&mut self, path: &Path) -> bool {
        let before = self.by_key.len();
        self.by_key.retain(|_, original| original != path);
        self.by_key.len() != before
    }

    fn contains(&self, path: &Path) -> bool {
        self.by_key.values().any(|original| original == path)
    }

    fn resolve(&self, reported: &Path) -> Option<PathBuf> {
        self.by_key.get(reported).cloned()
    }
}

/// Desktop [`FileWatcher`] backed by the platform's recommended `notify` backend.
///
/// Each armed path gets a non-recursive watch. Access events are dropped;
/// creates, modifications and removals are forwarded to the change handler
/// under the path that was armed.
///
/// The change handler runs on the backend's event thread and must not block
/// on work that itself calls [`FileWatcher::arm`] or [`FileWatcher::disarm`].
pub struct NotifyFileWatcher {
    watcher: Mutex<RecommendedWatcher>,
    armed: Arc<Mutex<ArmedPaths>>,
    handler: Arc<Mutex<Option<ChangeHandler>>>,
}

impl NotifyFileWatcher {
    pub fn new() -> Result<Self> {
        let armed = Arc::new(Mutex::new(ArmedPaths::default()));
        let handler: Arc<Mutex<Option<ChangeHandler>>> = Arc::new(Mutex::new(None));

        let callback_armed = Arc::clone(&armed);
        let callback_handler = Arc::clone(&handler);

        let watcher = RecommendedWatcher::new(
            move |res: std::result::Result<Event, notify::Error>| match res {
                Ok(event) => dispatch(event, &callback_armed, &callback_handler),
                Err(e) => warn!("File watch error: {}", e),
            },
            Config::default(),
        )
        .map_err(|e| BridgeError::NotAvailable(format!("Failed to create watcher: {}", e)))?;

        Ok(Self {
            watcher: Mutex::new(watcher),
            armed,
            handler,
        })
    }
}

fn dispatch(
    event: Event,
    armed: &Mutex<ArmedPaths>,
    handler: &Mutex<Option<ChangeHandler>>,
) {
    if !is_content_change(&event.kind) {
        return;
    }

    let targets: Vec<PathBuf> = {
        let armed = armed.lock();
        event
            .paths
            .iter()
            .filter_map(|reported| armed.resolve(reported))
            .collect()
    };
    if targets.is_empty() {
        return;
    }

    let Some(handler) = handler.lock().clone() else {
        debug!("Change event dropped, no handler installed");
        return;
    };

    for path in targets {
        handler(path);
    }
}

fn is_content_change(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_) | EventKind::Any
    )
}

impl FileWatcher for NotifyFileWatcher {
    fn arm(&self, path: &Path) -> Result<()> {
        if self.is_armed(path) {
            return Ok(());
        }

        // The armed set must not be locked here: the backend thread that
        // acknowledges the watch also runs `dispatch`.
        self.watcher
            .lock()
            .watch(path, RecursiveMode::NonRecursive)
            .map_err(|e| BridgeError::Watch {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;

        self.armed.lock().insert(path);
        debug!(path = ?path, "Armed file watch");
        Ok(())
    }

    fn disarm(&self, path: &Path) -> Result<()> {
        if !self.armed.lock().remove(path) {
            return Ok(());
        }

        match self.watcher.lock().unwatch(path) {
            Ok(()) => {}
            // The OS drops the watch by itself once the file is deleted.
            Err(e) if matches!(e.kind, notify::ErrorKind::WatchNotFound) => {}
            Err(e) => {
                return Err(BridgeError::Watch {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                })
            }
        }

        debug!(path = ?path, "Disarmed file watch");
        Ok(())
    }

    fn is_armed(&self, path: &Path) -> bool {
        self.armed.lock().contains(path)
    }

    fn set_change_handler(&self, handler: ChangeHandler) {
        *self.handler.lock() = Some(handler);
    }
}
