//! # Event Bus System
//!
//! Provides decoupled event delivery for the auto-update core using
//! `tokio::sync::broadcast`.
//!
//! ## Overview
//!
//! The event bus system consists of:
//! - **Event Types**: Strongly-typed enums for the auto-update and cache domains
//! - **EventBus**: Central broadcast channel for publishing events
//! - **EventStream**: Wrapper for consuming events with filtering
//!
//! Hosts subscribe to refresh their UI when a cached file was re-uploaded
//! (`AutoUpdateEvent::FileUpdated`) or to surface cache clean-up progress.
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{AutoUpdateEvent, CoreEvent, EventBus};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let event_bus = EventBus::new(100);
//! let mut stream = event_bus.subscribe();
//!
//! event_bus
//!     .emit(CoreEvent::AutoUpdate(AutoUpdateEvent::FileUpdated {
//!         repo_id: "repo-1".to_string(),
//!         path_in_repo: "/report.docx".to_string(),
//!     }))
//!     .ok();
//!
//! let event = stream.recv().await.unwrap();
//! assert_eq!(event.description(), "Cached file uploaded");
//! # }
//! ```
//!
//! ## Error Handling
//!
//! - **`RecvError::Lagged(n)`**: the subscriber missed `n` events; it can keep receiving.
//! - **`RecvError::Closed`**: all senders were dropped, treat as shutdown.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event enum published through the event bus.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Watch and re-upload events
    AutoUpdate(AutoUpdateEvent),
    /// Cache directory maintenance events
    Cache(CacheEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::AutoUpdate(e) => e.description(),
            CoreEvent::Cache(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::AutoUpdate(AutoUpdateEvent::UploadFailed { .. }) => EventSeverity::Error,
            CoreEvent::Cache(CacheEvent::ReapCompleted { failures, .. }) if *failures > 0 => {
                EventSeverity::Warning
            }
            CoreEvent::AutoUpdate(AutoUpdateEvent::FileUpdated { .. }) => EventSeverity::Info,
            CoreEvent::Cache(CacheEvent::ReapCompleted { .. }) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

// ============================================================================
// Auto-Update Events
// ============================================================================

/// Why a watch on a cached file ended.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum WatchEndReason {
    /// The host asked to stop watching
    Removed,
    /// The file vanished and did not come back within the re-check delay
    Deleted,
    /// The upload of a new version failed
    UploadFailed,
    /// The owning account was cleaned up
    AccountCleaned,
}

/// Events related to watched cached files.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum AutoUpdateEvent {
    /// A cached file is now watched for local edits.
    WatchStarted {
        repo_id: String,
        path_in_repo: String,
    },
    /// A watch ended.
    WatchEnded {
        repo_id: String,
        path_in_repo: String,
        reason: WatchEndReason,
    },
    /// A vanished cached file re-appeared within the re-check delay.
    RecreateDetected {
        repo_id: String,
        path_in_repo: String,
    },
    /// An upload of a locally modified file started.
    UploadStarted {
        repo_id: String,
        path_in_repo: String,
    },
    /// The new version of a cached file was uploaded.
    FileUpdated {
        repo_id: String,
        path_in_repo: String,
    },
    /// Uploading the new version failed; the file is no longer watched.
    UploadFailed {
        repo_id: String,
        path_in_repo: String,
        message: String,
    },
}

impl AutoUpdateEvent {
    fn description(&self) -> &str {
        match self {
            AutoUpdateEvent::WatchStarted { .. } => "Watching cached file",
            AutoUpdateEvent::WatchEnded { .. } => "Stopped watching cached file",
            AutoUpdateEvent::RecreateDetected { .. } => "Cached file re-created",
            AutoUpdateEvent::UploadStarted { .. } => "Uploading modified cached file",
            AutoUpdateEvent::FileUpdated { .. } => "Cached file uploaded",
            AutoUpdateEvent::UploadFailed { .. } => "Cached file upload failed",
        }
    }
}

// ============================================================================
// Cache Events
// ============================================================================

/// Events related to the on-disk cache tree.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum CacheEvent {
    /// Cache removal started.
    ReapStarted,
    /// Cache removal finished.
    ReapCompleted {
        /// Number of entries (index file, directories) removed.
        removed: u32,
        /// Number of deletions that failed and were skipped.
        failures: u32,
    },
}

impl CacheEvent {
    fn description(&self) -> &str {
        match self {
            CacheEvent::ReapStarted => "Removing cached files",
            CacheEvent::ReapCompleted { .. } => "Cached files removed",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central event bus for publishing and subscribing to core events.
///
/// Cloning the bus yields another sender on the same channel.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus with the specified buffer capacity.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is 0.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an error
    /// if there are none. Publishers usually ignore the error.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscription to the event bus.
    ///
    /// The receiver only observes events emitted after this call.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    /// Returns the current number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// Event stream with optional filtering.
///
/// ```rust
/// use core_runtime::events::{CoreEvent, EventBus, EventStream};
///
/// let bus = EventBus::new(16);
/// let uploads = EventStream::new(bus.subscribe())
///     .filter(|event| matches!(event, CoreEvent::AutoUpdate(_)));
/// ```
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Only yield events for which `predicate` returns true.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    /// Receives the next event matching the filter.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.matches(&event) {
                return Ok(event);
            }
        }
    }

    /// Returns the next buffered matching event without waiting.
    ///
    /// `None` means nothing matching is buffered right now.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        use tokio::sync::broadcast::error::TryRecvError;

        loop {
            match self.receiver.try_recv() {
                Ok(event) if self.matches(&event) => return Some(Ok(event)),
                Ok(_) => continue,
                Err(TryRecvError::Empty) => return None,
                Err(TryRecvError::Lagged(n)) => return Some(Err(RecvError::Lagged(n))),
                Err(TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }

    fn matches(&self, event: &CoreEvent) -> bool {
        self.filter.as_ref().map_or(true, |f| f(event))
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}
