use std::sync::Arc;

use super::NotificationTransport;
use crate::monitoring::types::Check;

/// Status-change message sent to a check's owner
pub fn format_alert(check: &Check) -> String {
    format!(
        "Alert: Your check for {} {}://{} is currently {}.",
        check.method.as_str().to_uppercase(),
        check.protocol,
        check.url,
        check.state
    )
}

/// Formats alerts and hands them to the transport.
///
/// Failed deliveries are logged and dropped; the next state change is the
/// next chance to notify.
#[derive(Clone)]
pub struct AlertDispatcher {
    transport: Arc<dyn NotificationTransport>,
}

impl AlertDispatcher {
    pub fn new(transport: Arc<dyn NotificationTransport>) -> Self {
        Self { transport }
    }

    /// Notify the owner of `check` (already carrying its new state).
    /// Returns whether the transport accepted the message.
    pub async fn dispatch(&self, check: &Check) -> bool {
        let message = format_alert(check);

        match self.transport.send(&check.owner_phone, &message).await {
            Ok(()) => {
                tracing::info!(
                    check_id = %check.id,
                    transport = self.transport.name(),
                    state = %check.state,
                    "User was alerted to a status change"
                );
                true
            }
            Err(e) => {
                tracing::warn!(
                    check_id = %check.id,
                    transport = self.transport.name(),
                    error = %e,
                    "Could not alert user to a status change"
                );
                false
            }
        }
    }
}
