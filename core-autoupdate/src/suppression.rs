//! # Spurious Change Suppression
//!
//! Some viewers (Preview on macOS in particular) touch images and PDFs they
//! merely display. [`RecentlyOpenedMediaFilter`] remembers when such files
//! were opened and reports change events inside a short window as spurious.

use bridge_traits::Clock;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Predicate consulted before a change event is routed.
pub trait SpuriousChangeFilter: Send + Sync {
    fn is_spurious(&self, local_path: &Path) -> bool;
}

const IMAGE_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "jpe", "gif", "bmp", "tif", "tiff", "webp", "heic", "heif", "ico",
    "svg", "psd", "raw", "cr2", "nef", "dng", "tga",
];

/// Whether the file name maps to an `image/*` or `application/pdf` MIME type.
pub fn is_image_or_pdf(path: &Path) -> bool {
    let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
        return false;
    };
    let ext = ext.to_ascii_lowercase();
    ext == "pdf" || IMAGE_EXTENSIONS.contains(&ext.as_str())
}

pub struct RecentlyOpenedMediaFilter {
    clock: Arc<dyn Clock>,
    window: Duration,
    opened: Mutex<HashMap<PathBuf, DateTime<Utc>>>,
}

impl RecentlyOpenedMediaFilter {
    pub fn new(clock: Arc<dyn Clock>, window: Duration) -> Self {
        Self {
            clock,
            window,
            opened: Mutex::new(HashMap::new()),
        }
    }

    /// Record that the host opened `path`. Ignored unless it is an image or PDF.
    pub fn file_opened(&self, path: &Path) {
        if !is_image_or_pdf(path) {
            return;
        }
        debug!(path = ?path, "Recording opened media file");
        let now = self.clock.now();
        let mut opened = self.opened.lock();
        opened.retain(|_, opened_at| self.within_window(*opened_at));
        opened.insert(path.to_path_buf(), now);
    }

    pub fn is_recently_opened(&self, path: &Path) -> bool {
        let mut opened = self.opened.lock();
        match opened.get(path).copied() {
            Some(opened_at) if self.within_window(opened_at) => true,
            Some(_) => {
                opened.remove(path);
                false
            }
            None => false,
        }
    }

    /// Number of opens still remembered.
    pub fn tracked_count(&self) -> usize {
        self.opened.lock().len()
    }

    fn within_window(&self, opened_at: DateTime<Utc>) -> bool {
        chrono::Duration::from_std(self.window)
            .is_ok_and(|window| self.clock.elapsed_since(opened_at) < window)
    }
}

impl SpuriousChangeFilter for RecentlyOpenedMediaFilter {
    fn is_spurious(&self, local_path: &Path) -> bool {
        self.is_recently_opened(local_path)
    }
}

impl std::fmt::Debug for RecentlyOpenedMediaFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecentlyOpenedMediaFilter")
            .field("window", &self.window)
            .field("tracked", &self.tracked_count())
            .finish()
    }
}
