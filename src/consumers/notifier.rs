//! Emails when the catalog gains or loses an image.
//!
//! Fed by the catalog change stream (via the catalog-events topic), not by
//! raw storage notifications, so a mail goes out only for committed catalog
//! writes.

use crate::consumers::{Disposition, QueueConsumer};
use crate::models::event::{Event, EventKind};
use crate::models::message::Message;
use crate::services::mailer::{Mail, Mailer};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{error, info, warn};

pub struct Notifier {
    mailer: Arc<dyn Mailer>,
    to: String,
    from: String,
}

impl Notifier {
    pub fn new(mailer: Arc<dyn Mailer>, to: impl Into<String>, from: impl Into<String>) -> Self {
        Self {
            mailer,
            to: to.into(),
            from: from.into(),
        }
    }

    fn compose(&self, event: &Event) -> Option<Mail> {
        let (subject, body) = match event.kind {
            EventKind::Created => (
                "New Image Added",
                format!(
                    "A new image has been added to the database: {}",
                    event.object_key
                ),
            ),
            EventKind::Removed => (
                "Image Deleted",
                format!(
                    "An image has been deleted from the database: {}",
                    event.object_key
                ),
            ),
            _ => return None,
        };
        Some(Mail {
            to: self.to.clone(),
            from: self.from.clone(),
            subject: subject.to_string(),
            html_body: body,
        })
    }
}

#[async_trait]
impl QueueConsumer for Notifier {
    fn name(&self) -> &'static str {
        "notifier"
    }

    async fn process(&self, message: &Message) -> Disposition {
        let Some(mail) = self.compose(&message.event) else {
            warn!(kind = ?message.event.kind, "notifier received an unexpected event, dropping");
            return Disposition::Ack;
        };

        match self.mailer.send(&mail).await {
            Ok(()) => {
                info!(subject = %mail.subject, object_key = %message.event.object_key, "notification sent");
                Disposition::Ack
            }
            Err(err) => {
                error!(error = %err, "notification send failed");
                Disposition::Retry
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::mailer::RecordingMailer;

    #[tokio::test]
    async fn insert_sends_added_mail() {
        let mailer = Arc::new(RecordingMailer::new());
        let notifier = Notifier::new(mailer.clone(), "user@example.com", "noreply@example.com");

        let message = Message::new(Event::created("catalog", "beach pic.png"));
        assert_eq!(notifier.process(&message).await, Disposition::Ack);

        let sent = mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].subject, "New Image Added");
        assert!(sent[0].html_body.contains("beach pic.png"));
    }

    #[tokio::test]
    async fn remove_sends_deleted_mail() {
        let mailer = Arc::new(RecordingMailer::new());
        let notifier = Notifier::new(mailer.clone(), "user@example.com", "noreply@example.com");

        let message = Message::new(Event::removed("catalog", "old.jpg"));
        notifier.process(&message).await;

        assert_eq!(mailer.sent()[0].subject, "Image Deleted");
    }

    #[tokio::test]
    async fn send_failure_leaves_message_for_redelivery() {
        let mailer = Arc::new(RecordingMailer::failing_first(1));
        let notifier = Notifier::new(mailer.clone(), "user@example.com", "noreply@example.com");

        let message = Message::new(Event::created("catalog", "a.png"));
        assert_eq!(notifier.process(&message).await, Disposition::Retry);
        // Redelivery succeeds once the transport recovers.
        assert_eq!(notifier.process(&message).await, Disposition::Ack);
        assert_eq!(mailer.sent().len(), 1);
    }

    #[tokio::test]
    async fn unexpected_event_is_dropped_not_retried() {
        let mailer = Arc::new(RecordingMailer::new());
        let notifier = Notifier::new(mailer.clone(), "user@example.com", "noreply@example.com");

        let message = Message::new(Event::caption_updated("a.png", "text", "Caption"));
        assert_eq!(notifier.process(&message).await, Disposition::Ack);
        assert!(mailer.sent().is_empty());
    }
}
