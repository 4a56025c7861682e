//! Alert delivery.
//!
//! The engine hands finished messages to a [`NotificationTransport`]; the
//! transport decides how a message reaches the owner's phone.

pub mod alert;
pub mod log;
pub mod sms;

pub use alert::AlertDispatcher;
pub use log::LogTransport;
pub use sms::TwilioSms;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Invalid notification parameters: {0}")]
    InvalidParameters(&'static str),

    #[error("Gateway rejected the message with status {status}")]
    Rejected { status: u16 },

    #[error("Gateway request failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// Delivers a text message to a phone number, single attempt
#[async_trait]
pub trait NotificationTransport: Send + Sync {
    async fn send(&self, recipient: &str, message: &str) -> Result<(), NotifyError>;

    /// Transport name used in diagnostics
    fn name(&self) -> &str;
}
