//! Storage and File System Abstractions
//!
//! Provides the platform-agnostic file operations the auto-update engine needs:
//! existence checks on watched cache files and the destructive operations used
//! by the cache reaper.

use async_trait::async_trait;
use std::path::Path;

use crate::error::Result;

/// File metadata information
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMetadata {
    pub size: u64,
    pub modified_at: Option<i64>,
    pub is_directory: bool,
}

/// File system access trait
///
/// Abstracts file I/O operations so the core never touches `std::fs` directly:
/// - Desktop: Direct filesystem access through `tokio::fs`
/// - Tests: In-memory trees that can be mutated between events
///
/// # Example
///
/// ```ignore
/// use bridge_traits::storage::FileSystemAccess;
///
/// async fn still_cached(fs: &dyn FileSystemAccess, path: &Path) -> Result<bool> {
///     fs.exists(path).await
/// }
/// ```
#[async_trait]
pub trait FileSystemAccess: Send + Sync {
    /// Check if a file or directory exists
    async fn exists(&self, path: &Path) -> Result<bool>;

    /// Get metadata for a file or directory
    async fn metadata(&self, path: &Path) -> Result<FileMetadata>;

    /// Delete a single file
    async fn delete_file(&self, path: &Path) -> Result<()>;

    /// Delete a directory and all its contents
    async fn delete_dir_all(&self, path: &Path) -> Result<()>;

    /// Rename a file or directory
    ///
    /// Implementations should use the platform's atomic rename where the
    /// source and destination live on the same volume.
    async fn rename(&self, from: &Path, to: &Path) -> Result<()>;

    /// Check whether `path` exists and is a directory
    async fn is_directory(&self, path: &Path) -> Result<bool> {
        if !self.exists(path).await? {
            return Ok(false);
        }
        Ok(self.metadata(path).await?.is_directory)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BridgeError;
    use mockall::mock;

    mock! {
        Fs {}

        #[async_trait]
        impl FileSystemAccess for Fs {
            async fn exists(&self, path: &Path) -> Result<bool>;
            async fn metadata(&self, path: &Path) -> Result<FileMetadata>;
            async fn delete_file(&self, path: &Path) -> Result<()>;
            async fn delete_dir_all(&self, path: &Path) -> Result<()>;
            async fn rename(&self, from: &Path, to: &Path) -> Result<()>;
        }
    }

    #[tokio::test]
    async fn test_is_directory_missing_path() {
        let mut fs = MockFs::new();
        fs.expect_exists().returning(|_| Ok(false));
        fs.expect_metadata().never();

        assert!(!fs.is_directory(Path::new("/cache/file-cache")).await.unwrap());
    }

    #[tokio::test]
    async fn test_is_directory_uses_metadata() {
        let mut fs = MockFs::new();
        fs.expect_exists().returning(|_| Ok(true));
        fs.expect_metadata().returning(|_| {
            Ok(FileMetadata {
                size: 0,
                modified_at: None,
                is_directory: true,
            })
        });

        assert!(fs.is_directory(Path::new("/cache/file-cache")).await.unwrap());
    }

    #[tokio::test]
    async fn test_is_directory_propagates_errors() {
        let mut fs = MockFs::new();
        fs.expect_exists()
            .returning(|_| Err(BridgeError::OperationFailed("denied".to_string())));

        assert!(fs.is_directory(Path::new("/locked")).await.is_err());
    }
}
