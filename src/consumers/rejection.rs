//! Drains the dead-letter queue and mails the uploader or the operator.
//!
//! Two kinds of traffic land here: deliberate validation rejections published
//! by the processor, and poison messages that exhausted their receive budget
//! on some other queue. The first gets a rejection notice, the second a
//! processing-failure notice for operator inspection.

use crate::consumers::{Disposition, QueueConsumer};
use crate::models::event::EventKind;
use crate::models::message::Message;
use crate::services::mailer::{Mail, Mailer};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{error, info};

pub struct RejectionHandler {
    mailer: Arc<dyn Mailer>,
    to: String,
    from: String,
}

impl RejectionHandler {
    pub fn new(mailer: Arc<dyn Mailer>, to: impl Into<String>, from: impl Into<String>) -> Self {
        Self {
            mailer,
            to: to.into(),
            from: from.into(),
        }
    }

    fn compose(&self, message: &Message) -> Mail {
        let key = &message.event.object_key;
        let (subject, body) = if message.event.kind == EventKind::Rejected {
            (
                "Image Upload Rejection",
                format!(
                    "<p>Image upload rejected for file: {key}. \
                     Please only upload .png, .jpg or .jpeg.</p>"
                ),
            )
        } else {
            (
                "Image Processing Failed",
                format!(
                    "<p>Processing of file {key} was abandoned after {} delivery \
                     attempts. The message is awaiting inspection.</p>",
                    message.receive_count
                ),
            )
        };
        Mail {
            to: self.to.clone(),
            from: self.from.clone(),
            subject: subject.to_string(),
            html_body: body,
        }
    }
}

#[async_trait]
impl QueueConsumer for RejectionHandler {
    fn name(&self) -> &'static str {
        "rejection-handler"
    }

    async fn process(&self, message: &Message) -> Disposition {
        let mail = self.compose(message);
        match self.mailer.send(&mail).await {
            Ok(()) => {
                info!(
                    subject = %mail.subject,
                    object_key = %message.event.object_key,
                    "rejection notice sent"
                );
                Disposition::Ack
            }
            Err(err) => {
                error!(error = %err, "rejection notice send failed");
                Disposition::Retry
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::event::Event;
    use crate::services::mailer::RecordingMailer;

    fn handler(mailer: Arc<RecordingMailer>) -> RejectionHandler {
        RejectionHandler::new(mailer, "uploader@example.com", "noreply@example.com")
    }

    #[tokio::test]
    async fn rejected_event_mails_the_uploader() {
        let mailer = Arc::new(RecordingMailer::new());
        let handler = handler(mailer.clone());

        let message = Message::new(Event::rejected(
            "images",
            "notes.txt",
            "unsupported file extension",
        ));
        assert_eq!(handler.process(&message).await, Disposition::Ack);

        let sent = mailer.sent();
        assert_eq!(sent[0].subject, "Image Upload Rejection");
        assert!(sent[0].html_body.contains("notes.txt"));
        assert!(sent[0].html_body.contains("not") || sent[0].html_body.contains("only upload"));
    }

    #[tokio::test]
    async fn dead_lettered_upload_mails_a_failure_notice() {
        let mailer = Arc::new(RecordingMailer::new());
        let handler = handler(mailer.clone());

        let mut message = Message::new(Event::created("images", "poison.png"));
        message.receive_count = 3;
        handler.process(&message).await;

        let sent = mailer.sent();
        assert_eq!(sent[0].subject, "Image Processing Failed");
        assert!(sent[0].html_body.contains("poison.png"));
        assert!(sent[0].html_body.contains('3'));
    }

    #[tokio::test]
    async fn send_failure_leaves_message_for_redelivery() {
        let mailer = Arc::new(RecordingMailer::failing_first(1));
        let handler = handler(mailer.clone());

        let message = Message::new(Event::rejected("images", "notes.txt", "bad"));
        assert_eq!(handler.process(&message).await, Disposition::Retry);
        assert_eq!(handler.process(&message).await, Disposition::Ack);
    }
}
