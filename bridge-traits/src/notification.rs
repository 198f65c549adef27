//! User-Visible Notifications
//!
//! Tray balloons, toasts and similar surfaces are owned by the host shell.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A message shown to the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserNotification {
    pub title: String,
    pub body: String,
    /// Identifier the shell uses to route a click (the repository id)
    pub context_id: String,
}

impl UserNotification {
    pub fn new(
        title: impl Into<String>,
        body: impl Into<String>,
        context_id: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            context_id: context_id.into(),
        }
    }
}

/// Notification surface trait
///
/// - **Windows**: tray balloon / toast
/// - **macOS**: Notification Center
/// - **Linux**: freedesktop notifications
#[async_trait]
pub trait UserNotifier: Send + Sync {
    /// Show a notification to the user
    async fn notify(&self, notification: UserNotification) -> Result<()>;
}
