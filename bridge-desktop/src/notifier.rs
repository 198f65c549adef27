//! Log-only User Notifier

use async_trait::async_trait;
use bridge_traits::{
    error::Result,
    notification::{UserNotification, UserNotifier},
};
use tracing::info;

/// [`UserNotifier`] that writes notifications to the log.
///
/// Used when the host shell has no notification surface wired up yet.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

#[async_trait]
impl UserNotifier for TracingNotifier {
    async fn notify(&self, notification: UserNotification) -> Result<()> {
        info!(
            title = %notification.title,
            context_id = %notification.context_id,
            "{}",
            notification.body.replace('\n', " ")
        );
        Ok(())
    }
}
