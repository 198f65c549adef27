//! # Host Bridge Traits
//!
//! Platform abstraction traits that must be implemented by each host platform.
//!
//! ## Overview
//!
//! This crate defines the contract between the auto-update core and the host
//! application. Each trait is a capability the core requires but does not own:
//! the notification primitive of the operating system, the transfer engine that
//! talks to the server, the tray/toast surface, and so on.
//!
//! ## Traits
//!
//! ### Filesystem
//! - [`FileSystemAccess`](storage::FileSystemAccess) - Existence checks and cache deletion
//! - [`FileWatcher`](watcher::FileWatcher) - Per-path arm/disarm change notifications
//!
//! ### Remote & Shell
//! - [`TransferEngine`](transfer::TransferEngine) - Upload execution and bulk cancel
//! - [`UserNotifier`](notification::UserNotifier) - User-visible success/failure messages
//! - [`AccountContext`](account::AccountContext) - Currently selected account
//!
//! ### Utilities
//! - [`Clock`](time::Clock) - Time source for deterministic testing
//! - [`LoggerSink`](logging::LoggerSink) - Forward structured logs to host logging
//!
//! ## Error Handling
//!
//! All bridge traits use [`BridgeError`](error::BridgeError). Implementations
//! should convert platform errors and keep the offending path in the message.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` so a single implementation can be
//! shared between the event loop and the background reaper.

pub mod account;
pub mod error;
pub mod logging;
pub mod notification;
pub mod storage;
pub mod time;
pub mod transfer;
pub mod watcher;

pub use error::BridgeError;

// Re-export commonly used types
pub use account::{AccountContext, AccountId};
pub use logging::{LogEntry, LogLevel, LoggerSink};
pub use notification::{UserNotification, UserNotifier};
pub use storage::{FileMetadata, FileSystemAccess};
pub use time::{Clock, SystemClock};
pub use transfer::{TransferEngine, UploadRequest};
pub use watcher::{ChangeHandler, FileWatcher};
