//! Outbound email
//!
//! The reset flow only needs `send`; transports plug in behind [`Mailer`].

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Email {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("Mail transport rejected message to {to}: {reason}")]
    Rejected { to: String, reason: String },

    #[error("Mail transport unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: Email) -> Result<(), DeliveryError>;
}

/// Writes outgoing mail to the debug log instead of delivering it
#[derive(Debug, Clone)]
pub struct LogMailer {
    from: String,
}

impl LogMailer {
    pub fn new(from: impl Into<String>) -> Self {
        Self { from: from.into() }
    }
}

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: Email) -> Result<(), DeliveryError> {
        tracing::debug!(
            from = %self.from,
            to = %email.to,
            subject = %email.subject,
            body = %email.body,
            "outgoing email"
        );
        Ok(())
    }
}

#[cfg(any(test, feature = "test-utils"))]
pub use recording::RecordingMailer;

#[cfg(any(test, feature = "test-utils"))]
mod recording {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    /// Keeps every message in memory; can be switched to fail deliveries
    #[derive(Debug, Default)]
    pub struct RecordingMailer {
        sent: Mutex<Vec<Email>>,
        failing: AtomicBool,
    }

    impl RecordingMailer {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn set_failing(&self, failing: bool) {
            self.failing.store(failing, Ordering::SeqCst);
        }

        pub fn sent(&self) -> Vec<Email> {
            self.sent.lock().map(|sent| sent.clone()).unwrap_or_default()
        }

        pub fn last(&self) -> Option<Email> {
            self.sent().pop()
        }
    }

    #[async_trait]
    impl Mailer for RecordingMailer {
        async fn send(&self, email: Email) -> Result<(), DeliveryError> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(DeliveryError::Unavailable("delivery disabled".to_string()));
            }
            if let Ok(mut sent) = self.sent.lock() {
                sent.push(email);
            }
            Ok(())
        }
    }
}
