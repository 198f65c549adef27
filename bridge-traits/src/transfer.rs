//! Transfer Engine Abstraction
//!
//! The engine that actually moves bytes to the server lives outside the core.
//! The core only describes what to upload and waits for the terminal result.

use async_trait::async_trait;
use std::path::PathBuf;

use crate::{account::AccountId, error::Result};

/// Description of a single-file upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRequest {
    /// Unique per started upload, for correlating engine logs
    pub upload_id: u64,
    /// Account the upload is performed as
    pub account: AccountId,
    /// Remote repository identifier
    pub repo_id: String,
    /// Remote directory that receives the file
    pub parent_dir: String,
    /// Full path of the file inside the repository
    pub path_in_repo: String,
    /// Local file whose content is uploaded
    pub local_path: PathBuf,
    /// Name of the file on the remote side
    pub remote_name: String,
    /// Replace the existing remote version instead of creating a conflict copy
    pub overwrite: bool,
}

/// Transfer engine trait
///
/// # Contract
///
/// `upload` resolves exactly once, when the transfer reaches a terminal state:
/// - `Ok(())` when the new version is stored remotely
/// - `Err(BridgeError::Cancelled)` when a bulk cancel interrupted it
/// - any other error when the transfer failed
///
/// Cancellation calls only affect in-flight transfers.
#[async_trait]
pub trait TransferEngine: Send + Sync {
    /// Upload a file and wait for the terminal result
    async fn upload(&self, request: UploadRequest) -> Result<()>;

    /// Cancel every in-flight transfer started on behalf of `account`
    async fn cancel_account_transfers(&self, account: &AccountId) -> Result<()>;

    /// Cancel every in-flight download regardless of account
    async fn cancel_all_downloads(&self) -> Result<()>;
}
