//! Outbound mail seam.
//!
//! The pipeline composes subjects and bodies; actual delivery goes through
//! the `Mailer` trait, one attempt per call. Consumers do not retry sends
//! themselves: a failed send leaves the message unacknowledged and the
//! queue's redelivery policy governs what happens next.

use async_trait::async_trait;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("mail delivery failed: {0}")]
    Delivery(String),
}

/// One outbound email.
#[derive(Debug, Clone)]
pub struct Mail {
    pub to: String,
    pub from: String,
    pub subject: String,
    pub html_body: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, mail: &Mail) -> Result<(), MailError>;
}

/// Writes deliveries to the log instead of a real transport. Stands in for
/// the external mail service in local runs.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, mail: &Mail) -> Result<(), MailError> {
        info!(
            to = %mail.to,
            subject = %mail.subject,
            body = %mail.html_body,
            "email sent"
        );
        Ok(())
    }
}

/// Captures deliveries for inspection; can be primed to fail a number of
/// sends first, to exercise redelivery paths.
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<Mail>>,
    failures_remaining: AtomicUsize,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_first(failures: usize) -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            failures_remaining: AtomicUsize::new(failures),
        }
    }

    pub fn sent(&self) -> Vec<Mail> {
        self.sent.lock().expect("mailer mutex poisoned").clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, mail: &Mail) -> Result<(), MailError> {
        let remaining = self.failures_remaining.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures_remaining.store(remaining - 1, Ordering::SeqCst);
            return Err(MailError::Delivery("transport unavailable".to_string()));
        }
        self.sent
            .lock()
            .expect("mailer mutex poisoned")
            .push(mail.clone());
        Ok(())
    }
}
