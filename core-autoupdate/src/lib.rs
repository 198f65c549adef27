//! # Cached File Auto-Update
//!
//! Watches locally cached copies of remote files and re-uploads them when
//! they are modified in place.
//!
//! ## Overview
//!
//! This module manages:
//! - The registry of watched cache paths and the remote objects they mirror
//! - Routing of raw change notifications (modify, delete, rename-and-replace)
//! - Deferred re-checks that tell a real delete from an editor's atomic save
//! - Overwrite uploads and their success/failure notifications
//! - Account clean-up and background removal of the cache tree
//!
//! ## Components
//!
//! - **Watch Registry** (`registry`): local path to remote object, kept in step with the watcher
//! - **Deferred Delete Queue** (`deferred`): vanished entries with their re-check timers
//! - **Change Event Router** (`router`): classifies one change notification
//! - **Upload Coordinator** (`upload`): starts uploads and applies their results
//! - **Cache Reaper** (`reaper`): removes the cache tree and index
//! - **Auto-Update Manager** (`manager`): the event loop that owns all of the above

pub mod deferred;
pub mod error;
pub mod manager;
pub mod reaper;
pub mod registry;
pub mod router;
pub mod suppression;
pub mod types;
pub mod upload;

#[cfg(test)]
mod test_support;

pub use error::{AutoUpdateError, Result};
pub use manager::{AutoUpdateHandle, AutoUpdateManager};
pub use reaper::{CacheReaper, ReapReport};
pub use registry::WatchRegistry;
pub use suppression::{is_image_or_pdf, RecentlyOpenedMediaFilter, SpuriousChangeFilter};
pub use types::{
    RecheckOutcome, RouteOutcome, UploadCompletion, UploadStatus, WatchOutcome, WatchedFileInfo,
};
pub use upload::{UPLOAD_FAILURE_TITLE, UPLOAD_SUCCESS_TITLE};
