//! # Watch Registry
//!
//! Maps a local cache path to the remote object it mirrors and keeps the
//! file watcher's armed set in step with the map: a path is armed iff it is
//! registered, except while a change event for it is being handled.

use crate::error::AutoUpdateError;
use crate::types::WatchedFileInfo;
use bridge_traits::{AccountId, FileWatcher};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

pub struct WatchRegistry {
    entries: HashMap<PathBuf, WatchedFileInfo>,
    watcher: Arc<dyn FileWatcher>,
}

impl WatchRegistry {
    pub fn new(watcher: Arc<dyn FileWatcher>) -> Self {
        Self {
            entries: HashMap::new(),
            watcher,
        }
    }

    /// Insert or overwrite the entry for `local_path` and arm it.
    ///
    /// An entry with an upload in flight keeps its `uploading` flag and stays
    /// disarmed; the upload completion re-arms it.
    pub fn register_entry(&mut self, local_path: PathBuf, mut info: WatchedFileInfo) {
        let in_flight = self
            .entries
            .get(&local_path)
            .filter(|existing| existing.uploading)
            .and_then(|existing| existing.upload_id);
        let upload_in_flight = in_flight.is_some();
        info.uploading = upload_in_flight;
        info.upload_id = in_flight;

        if !upload_in_flight {
            self.arm(&local_path);
        }
        debug!(path = ?local_path, repo_id = %info.repo_id, "Registered watch");
        self.entries.insert(local_path, info);
    }

    /// Remove the entry and disarm its path. Returns the removed entry.
    pub fn unregister(&mut self, local_path: &Path) -> Option<WatchedFileInfo> {
        let removed = self.entries.remove(local_path);
        self.disarm(local_path);
        if removed.is_some() {
            debug!(path = ?local_path, "Unregistered watch");
        }
        removed
    }

    /// Local paths registered for `account`, copied so callers can remove while iterating.
    pub fn snapshot_for_account(&self, account: &AccountId) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self
            .entries
            .iter()
            .filter(|(_, info)| &info.account == account)
            .map(|(path, _)| path.clone())
            .collect();
        paths.sort();
        paths
    }

    pub fn get(&self, local_path: &Path) -> Option<&WatchedFileInfo> {
        self.entries.get(local_path)
    }

    pub fn get_mut(&mut self, local_path: &Path) -> Option<&mut WatchedFileInfo> {
        self.entries.get_mut(local_path)
    }

    /// Like [`get_mut`](Self::get_mut) but reports a missing path as a stale event.
    pub fn lookup(&mut self, local_path: &Path) -> Result<&mut WatchedFileInfo, AutoUpdateError> {
        self.entries
            .get_mut(local_path)
            .ok_or_else(|| AutoUpdateError::StaleEvent {
                path: local_path.to_path_buf(),
            })
    }

    pub fn contains(&self, local_path: &Path) -> bool {
        self.entries.contains_key(local_path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All registered local paths, sorted.
    pub fn paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self.entries.keys().cloned().collect();
        paths.sort();
        paths
    }

    /// Arm `local_path`. Failures are logged; the caller carries on.
    pub fn arm(&self, local_path: &Path) -> bool {
        match self.watcher.arm(local_path) {
            Ok(()) => true,
            Err(source) => {
                let err = AutoUpdateError::WatchArmFailure {
                    path: local_path.to_path_buf(),
                    source,
                };
                warn!("{}", err);
                false
            }
        }
    }

    /// Disarm `local_path`. Failures are logged; the caller carries on.
    pub fn disarm(&self, local_path: &Path) -> bool {
        match self.watcher.disarm(local_path) {
            Ok(()) => true,
            Err(source) => {
                let err = AutoUpdateError::WatchDisarmFailure {
                    path: local_path.to_path_buf(),
                    source,
                };
                warn!("{}", err);
                false
            }
        }
    }
}

impl std::fmt::Debug for WatchRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchRegistry")
            .field("entries", &self.entries.len())
            .finish()
    }
}
