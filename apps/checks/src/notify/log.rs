use async_trait::async_trait;

use super::{NotificationTransport, NotifyError};

/// Transport used when no SMS gateway is configured: alerts only reach the log
pub struct LogTransport;

#[async_trait]
impl NotificationTransport for LogTransport {
    async fn send(&self, recipient: &str, message: &str) -> Result<(), NotifyError> {
        tracing::info!(recipient, message, "Alert (no SMS gateway configured)");
        Ok(())
    }

    fn name(&self) -> &str {
        "log"
    }
}
