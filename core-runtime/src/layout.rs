//! # Cache Layout
//!
//! Well-known names of the on-disk cache under the configured data directory:
//!
//! ```text
//! <data_dir>/
//! ├── file-cache/        primary cache tree, <repo_id>/<path in repo>
//! ├── file-cache-tmp/    swap name used while the tree is being deleted
//! └── file-cache.db      cache index
//! ```

use std::path::{Path, PathBuf};

/// Name of the primary cache directory.
pub const FILE_CACHE_DIR_NAME: &str = "file-cache";

/// Name the cache directory is renamed to before it is deleted.
pub const FILE_CACHE_TEMP_DIR_NAME: &str = "file-cache-tmp";

/// Name of the cache index file.
pub const FILE_CACHE_DB_FILE_NAME: &str = "file-cache.db";

/// Maps a remote object to the local file that caches it.
///
/// Must be a pure function of its inputs.
pub trait CachePathResolver: Send + Sync {
    fn local_cache_path(&self, repo_id: &str, path_in_repo: &str) -> PathBuf;
}

/// Default cache layout rooted at the application data directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheLayout {
    root: PathBuf,
}

impl CacheLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.root.join(FILE_CACHE_DIR_NAME)
    }

    pub fn temp_dir(&self) -> PathBuf {
        self.root.join(FILE_CACHE_TEMP_DIR_NAME)
    }

    pub fn index_file(&self) -> PathBuf {
        self.root.join(FILE_CACHE_DB_FILE_NAME)
    }
}

impl CachePathResolver for CacheLayout {
    /// `.` and `..` segments are dropped, so the result always stays under
    /// [`cache_dir`](Self::cache_dir).
    fn local_cache_path(&self, repo_id: &str, path_in_repo: &str) -> PathBuf {
        let mut path = self.cache_dir();
        path.extend(plain_segments(repo_id));
        path.extend(plain_segments(path_in_repo));
        path
    }
}

fn plain_segments(path: &str) -> impl Iterator<Item = &str> {
    path.split(['/', '\\'])
        .filter(|segment| !matches!(*segment, "" | "." | ".."))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_well_known_names() {
        let layout = CacheLayout::new("/data");
        assert_eq!(layout.cache_dir(), PathBuf::from("/data/file-cache"));
        assert_eq!(layout.temp_dir(), PathBuf::from("/data/file-cache-tmp"));
        assert_eq!(layout.index_file(), PathBuf::from("/data/file-cache.db"));
    }

    #[test]
    fn test_local_cache_path_strips_leading_slash() {
        let layout = CacheLayout::new("/data");
        assert_eq!(
            layout.local_cache_path("repo-1", "/docs/report.docx"),
            PathBuf::from("/data/file-cache/repo-1/docs/report.docx")
        );
        assert_eq!(
            layout.local_cache_path("repo-1", "report.docx"),
            PathBuf::from("/data/file-cache/repo-1/report.docx")
        );
    }

    #[test]
    fn test_local_cache_path_stays_under_cache_dir() {
        let layout = CacheLayout::new("/data");
        assert_eq!(
            layout.local_cache_path("repo-1", "/../../etc/passwd"),
            PathBuf::from("/data/file-cache/repo-1/etc/passwd")
        );
        assert_eq!(
            layout.local_cache_path("../repo-1", "./docs/../a.txt"),
            PathBuf::from("/data/file-cache/repo-1/docs/a.txt")
        );
        assert!(layout
            .local_cache_path("..\\..", "x.txt")
            .starts_with(layout.cache_dir()));
    }
}
