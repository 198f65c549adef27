//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop platforms
//! (macOS, Windows, Linux):
//! - `FileSystemAccess` using `tokio::fs`
//! - `FileWatcher` using the `notify` crate's recommended backend
//! - `UserNotifier` that only logs, for shells without a toast surface
//!
//! `TransferEngine` and `AccountContext` have no desktop default; they are
//! owned by the host's sync engine.
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{NotifyFileWatcher, TokioFileSystem};
//! use std::sync::Arc;
//!
//! let config = AutoUpdateConfig::builder()
//!     .data_dir(bridge_desktop::default_data_dir())
//!     .file_system(Arc::new(TokioFileSystem::new()))
//!     .file_watcher(Arc::new(NotifyFileWatcher::new()?))
//!     .transfer_engine(engine)
//!     .account_context(accounts)
//!     .build()?;
//! ```

mod filesystem;
mod notifier;
mod watcher;

pub use filesystem::{default_data_dir, TokioFileSystem};
pub use notifier::TracingNotifier;
pub use watcher::NotifyFileWatcher;
