//! # Watch Types
//!
//! Value types shared by the registry, the deferred queue, the router and
//! the upload coordinator, plus the outcome enums returned to callers.

use bridge_traits::AccountId;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

// ============================================================================
// Watched File
// ============================================================================

/// What a watched local file mirrors.
///
/// The local path is derived from `repo_id` and `path_in_repo` through the
/// cache path resolver and is the registry key, not a field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchedFileInfo {
    pub account: AccountId,
    pub repo_id: String,
    pub path_in_repo: String,
    /// True strictly between upload start and its completion
    pub uploading: bool,
    /// Id of the upload in flight; completions carrying another id are stale
    #[serde(default)]
    pub upload_id: Option<u64>,
}

impl WatchedFileInfo {
    pub fn new(
        account: AccountId,
        repo_id: impl Into<String>,
        path_in_repo: impl Into<String>,
    ) -> Self {
        Self {
            account,
            repo_id: repo_id.into(),
            path_in_repo: path_in_repo.into(),
            uploading: false,
            upload_id: None,
        }
    }

    /// Whether this entry mirrors the remote object `(repo_id, path_in_repo)`.
    pub fn mirrors(&self, repo_id: &str, path_in_repo: &str) -> bool {
        self.repo_id == repo_id && self.path_in_repo == path_in_repo
    }
}

// ============================================================================
// Outcomes
// ============================================================================

/// Result of a successful `watch_cached_file` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchOutcome {
    /// The file is registered and armed
    Watching { local_path: PathBuf },
    /// The object is waiting for a re-creation check; nothing was changed
    PendingRecheck,
}

/// How a single change notification was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    /// Dropped by the spurious-change filter; the path stays armed
    Suppressed,
    /// The path is not registered
    Stale,
    /// An upload for the path is already in flight
    AlreadyUploading,
    /// The file is gone; a re-creation check is scheduled
    Deferred,
    /// An upload of the new content was started
    UploadStarted,
}

/// What a re-creation check found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecheckOutcome {
    /// No deferred entry was waiting
    Idle,
    /// The file did not come back; the entry was dropped for good
    Dropped { repo_id: String, path_in_repo: String },
    /// The file came back, was registered again and routed as a fresh change
    Recreated(RouteOutcome),
}

// ============================================================================
// Upload Completion
// ============================================================================

/// Terminal state of an upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadStatus {
    Succeeded,
    Failed(String),
    /// Cancelled by an account clean-up
    Cancelled,
}

/// Delivered exactly once per started upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadCompletion {
    pub upload_id: u64,
    pub repo_id: String,
    pub path_in_repo: String,
    pub local_path: PathBuf,
    pub status: UploadStatus,
}

impl UploadCompletion {
    pub fn is_success(&self) -> bool {
        self.status == UploadStatus::Succeeded
    }
}

// ============================================================================
// Path Helpers
// ============================================================================

/// Parent directory of a repository path, `/` for top-level entries.
pub fn parent_dir(path_in_repo: &str) -> String {
    let trimmed = path_in_repo.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(0) | None => "/".to_string(),
        Some(idx) => trimmed[..idx].to_string(),
    }
}

/// File name of a local path, used as the remote name of an upload.
pub fn file_name(local_path: &Path) -> String {
    local_path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}
