//! In-memory bridges shared by the unit tests.

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    AccountContext, AccountId, ChangeHandler, Clock, FileMetadata, FileSystemAccess, FileWatcher,
    TransferEngine, UploadRequest, UserNotification, UserNotifier,
};
use chrono::{DateTime, TimeZone, Utc};
use core_runtime::config::AutoUpdateConfig;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Filesystem tree held in memory. Directories are implied by the files
/// added under them.
#[derive(Default)]
pub struct MemoryFs {
    entries: Mutex<BTreeMap<PathBuf, bool>>,
    undeletable: Mutex<HashSet<PathBuf>>,
}

impl MemoryFs {
    pub fn add_file(&self, path: impl AsRef<Path>) {
        let path = path.as_ref();
        let mut entries = self.entries.lock();
        for ancestor in path.ancestors().skip(1) {
            if ancestor.as_os_str().is_empty() {
                continue;
            }
            entries.insert(ancestor.to_path_buf(), true);
        }
        entries.insert(path.to_path_buf(), false);
    }

    pub fn add_dir(&self, path: impl AsRef<Path>) {
        self.entries.lock().insert(path.as_ref().to_path_buf(), true);
    }

    pub fn remove(&self, path: impl AsRef<Path>) {
        let path = path.as_ref();
        self.entries.lock().retain(|p, _| !p.starts_with(path));
    }

    pub fn contains(&self, path: impl AsRef<Path>) -> bool {
        self.entries.lock().contains_key(path.as_ref())
    }

    /// Make every delete of `path` fail.
    pub fn make_undeletable(&self, path: impl AsRef<Path>) {
        self.undeletable.lock().insert(path.as_ref().to_path_buf());
    }

    fn check_deletable(&self, path: &Path) -> Result<()> {
        if self.undeletable.lock().contains(path) {
            return Err(BridgeError::OperationFailed(format!(
                "permission denied: {}",
                path.display()
            )));
        }
        Ok(())
    }

    fn not_found(path: &Path) -> BridgeError {
        BridgeError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            path.display().to_string(),
        ))
    }
}

#[async_trait]
impl FileSystemAccess for MemoryFs {
    async fn exists(&self, path: &Path) -> Result<bool> {
        Ok(self.contains(path))
    }

    async fn metadata(&self, path: &Path) -> Result<FileMetadata> {
        let is_directory = *self
            .entries
            .lock()
            .get(path)
            .ok_or_else(|| Self::not_found(path))?;
        Ok(FileMetadata {
            size: 0,
            modified_at: None,
            is_directory,
        })
    }

    async fn delete_file(&self, path: &Path) -> Result<()> {
        self.check_deletable(path)?;
        match self.entries.lock().remove(path) {
            Some(false) => Ok(()),
            _ => Err(Self::not_found(path)),
        }
    }

    async fn delete_dir_all(&self, path: &Path) -> Result<()> {
        self.check_deletable(path)?;
        if !self.contains(path) {
            return Err(Self::not_found(path));
        }
        self.remove(path);
        Ok(())
    }

    async fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        let mut entries = self.entries.lock();
        if !entries.contains_key(from) {
            return Err(Self::not_found(from));
        }
        let moved: Vec<(PathBuf, bool)> = entries
            .iter()
            .filter(|(p, _)| p.starts_with(from))
            .map(|(p, is_dir)| (p.clone(), *is_dir))
            .collect();
        for (old, is_dir) in moved {
            entries.remove(&old);
            let suffix = old.strip_prefix(from).unwrap_or(Path::new(""));
            entries.insert(to.join(suffix), is_dir);
        }
        Ok(())
    }
}

/// Watcher that records the armed set and lets tests fire events.
#[derive(Default)]
pub struct RecordingWatcher {
    armed: Mutex<HashSet<PathBuf>>,
    failing: Mutex<HashSet<PathBuf>>,
    handler: Mutex<Option<ChangeHandler>>,
}

impl RecordingWatcher {
    pub fn fail_arm(&self, path: &Path) {
        self.failing.lock().insert(path.to_path_buf());
    }

    pub fn armed_paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self.armed.lock().iter().cloned().collect();
        paths.sort();
        paths
    }

    /// Deliver a change event the way the platform backend would.
    pub fn fire(&self, path: &Path) {
        let handler = self.handler.lock().clone();
        if let Some(handler) = handler {
            handler(path.to_path_buf());
        }
    }
}

impl FileWatcher for RecordingWatcher {
    fn arm(&self, path: &Path) -> Result<()> {
        if self.failing.lock().contains(path) {
            return Err(BridgeError::Watch {
                path: path.to_path_buf(),
                message: "inotify limit reached".to_string(),
            });
        }
        self.armed.lock().insert(path.to_path_buf());
        Ok(())
    }

    fn disarm(&self, path: &Path) -> Result<()> {
        self.armed.lock().remove(path);
        Ok(())
    }

    fn is_armed(&self, path: &Path) -> bool {
        self.armed.lock().contains(path)
    }

    fn set_change_handler(&self, handler: ChangeHandler) {
        *self.handler.lock() = Some(handler);
    }
}

/// Scripted result of the next uploads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UploadScript {
    #[default]
    Succeed,
    Fail,
    Cancel,
}

#[derive(Default)]
pub struct FakeTransferEngine {
    pub requests: Mutex<Vec<UploadRequest>>,
    pub cancelled_accounts: Mutex<Vec<AccountId>>,
    pub cancel_all_calls: Mutex<usize>,
    script: Mutex<UploadScript>,
}

impl FakeTransferEngine {
    pub fn script(&self, script: UploadScript) {
        *self.script.lock() = script;
    }

    pub fn upload_count(&self) -> usize {
        self.requests.lock().len()
    }
}

#[async_trait]
impl TransferEngine for FakeTransferEngine {
    async fn upload(&self, request: UploadRequest) -> Result<()> {
        self.requests.lock().push(request);
        let script = *self.script.lock();
        match script {
            UploadScript::Succeed => Ok(()),
            UploadScript::Fail => Err(BridgeError::OperationFailed("quota exceeded".to_string())),
            UploadScript::Cancel => Err(BridgeError::Cancelled),
        }
    }

    async fn cancel_account_transfers(&self, account: &AccountId) -> Result<()> {
        self.cancelled_accounts.lock().push(account.clone());
        Ok(())
    }

    async fn cancel_all_downloads(&self) -> Result<()> {
        *self.cancel_all_calls.lock() += 1;
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<UserNotification>>,
}

#[async_trait]
impl UserNotifier for RecordingNotifier {
    async fn notify(&self, notification: UserNotification) -> Result<()> {
        self.sent.lock().push(notification);
        Ok(())
    }
}

pub struct FixedAccount(pub Mutex<Option<AccountId>>);

impl FixedAccount {
    pub fn new(account: &str) -> Self {
        Self(Mutex::new(Some(AccountId::new(account))))
    }
}

impl AccountContext for FixedAccount {
    fn current_account(&self) -> Option<AccountId> {
        self.0.lock().clone()
    }
}

pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self {
            now: Mutex::new(Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()),
        }
    }
}

impl ManualClock {
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock();
        *now += chrono::Duration::from_std(by).unwrap();
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

/// All fakes behind one config.
pub struct Harness {
    pub fs: Arc<MemoryFs>,
    pub watcher: Arc<RecordingWatcher>,
    pub engine: Arc<FakeTransferEngine>,
    pub notifier: Arc<RecordingNotifier>,
    pub accounts: Arc<FixedAccount>,
    pub clock: Arc<ManualClock>,
}

pub const DATA_DIR: &str = "/data";

impl Harness {
    pub fn new() -> Self {
        Self {
            fs: Arc::new(MemoryFs::default()),
            watcher: Arc::new(RecordingWatcher::default()),
            engine: Arc::new(FakeTransferEngine::default()),
            notifier: Arc::new(RecordingNotifier::default()),
            accounts: Arc::new(FixedAccount::new("alice")),
            clock: Arc::new(ManualClock::default()),
        }
    }

    pub fn config(&self) -> AutoUpdateConfig {
        AutoUpdateConfig::builder()
            .data_dir(DATA_DIR)
            .file_system(self.fs.clone())
            .file_watcher(self.watcher.clone())
            .transfer_engine(self.engine.clone())
            .notifier(self.notifier.clone())
            .account_context(self.accounts.clone())
            .clock(self.clock.clone())
            .recreate_check_delay(Duration::from_millis(5000))
            .suppress_recently_opened_media(true)
            .build()
            .unwrap()
    }

    /// Local cache path of `path_in_repo` in `repo_id` under [`DATA_DIR`].
    pub fn cache_path(repo_id: &str, path_in_repo: &str) -> PathBuf {
        let mut path = PathBuf::from(DATA_DIR).join("file-cache").join(repo_id);
        for part in path_in_repo.split('/').filter(|p| !p.is_empty()) {
            path.push(part);
        }
        path
    }
}
