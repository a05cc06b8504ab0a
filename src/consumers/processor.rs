//! Validates and catalogs new uploads, or routes them to the rejection path.

use crate::broker::topic::Topic;
use crate::consumers::{Disposition, QueueConsumer};
use crate::models::event::{Event, EventKind};
use crate::models::message::Message;
use crate::services::catalog_service::CatalogService;
use crate::services::object_store::ObjectStore;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Upload extensions accepted into the catalog, matched case-insensitively
/// against the substring after the final `.` of the object key.
const ACCEPTED_EXTENSIONS: [&str; 3] = ["png", "jpeg", "jpg"];

pub struct Processor {
    catalog: CatalogService,
    store: Arc<dyn ObjectStore>,
    rejections: Arc<Topic>,
}

impl Processor {
    pub fn new(
        catalog: CatalogService,
        store: Arc<dyn ObjectStore>,
        rejections: Arc<Topic>,
    ) -> Self {
        Self {
            catalog,
            store,
            rejections,
        }
    }

    fn accepted_extension(key: &str) -> bool {
        key.rsplit_once('.').is_some_and(|(_, extension)| {
            ACCEPTED_EXTENSIONS
                .iter()
                .any(|accepted| extension.eq_ignore_ascii_case(accepted))
        })
    }
}

#[async_trait]
impl QueueConsumer for Processor {
    fn name(&self) -> &'static str {
        "processor"
    }

    async fn process(&self, message: &Message) -> Disposition {
        let event = &message.event;
        if event.kind != EventKind::Created {
            warn!(kind = ?event.kind, "processor received a non-upload event, dropping");
            return Disposition::Ack;
        }
        let key = &event.object_key;

        // Validation rejection is deliberate routing, not an error: the
        // message is acknowledged and a rejection event takes over.
        if !Self::accepted_extension(key) {
            info!(object_key = %key, "unsupported file type, routing to rejection path");
            let rejection = Event::rejected(
                event.source.clone(),
                key.clone(),
                "unsupported file extension",
            );
            self.rejections.publish(&rejection).await;
            return Disposition::Ack;
        }

        let payload = match self.store.fetch(&event.source, key).await {
            Ok(payload) => payload,
            Err(err) => {
                error!(object_key = %key, error = %err, "object fetch failed");
                return Disposition::Retry;
            }
        };

        if let Err(err) = self.catalog.put(key).await {
            error!(object_key = %key, error = %err, "catalog write failed");
            return Disposition::Retry;
        }

        info!(object_key = %key, size = payload.len(), "upload catalogued");
        Disposition::Ack
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::queue::{Queue, QueuePolicy};
    use crate::broker::topic::Subscription;
    use crate::services::object_store::InMemoryObjectStore;
    use sqlx::sqlite::SqlitePoolOptions;
    use std::time::Duration;

    struct Fixture {
        processor: Processor,
        catalog: CatalogService,
        store: Arc<InMemoryObjectStore>,
        rejection_queue: Arc<Queue>,
    }

    async fn fixture() -> Fixture {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("in-memory sqlite");
        let catalog = CatalogService::new(Arc::new(pool));
        catalog.apply_schema().await.expect("schema");

        let rejection_queue = Queue::new(
            "rejections",
            QueuePolicy {
                visibility_timeout: Duration::from_secs(30),
                max_receive_count: 3,
            },
        );
        let rejections =
            Arc::new(Topic::new("rejection").subscribe(Subscription::queue(rejection_queue.clone())));
        let store = Arc::new(InMemoryObjectStore::new());

        Fixture {
            processor: Processor::new(catalog.clone(), store.clone(), rejections),
            catalog,
            store,
            rejection_queue,
        }
    }

    fn upload(key: &str) -> Message {
        Message::new(Event::created("images", key))
    }

    #[test]
    fn extension_table() {
        assert!(Processor::accepted_extension("photo.PNG"));
        assert!(Processor::accepted_extension("img.jpeg"));
        assert!(Processor::accepted_extension("pic.jpg"));
        assert!(!Processor::accepted_extension("doc.pdf"));
        assert!(!Processor::accepted_extension("archive.zip"));
        assert!(!Processor::accepted_extension("no-extension"));
    }

    #[tokio::test]
    async fn valid_upload_is_catalogued_and_acked() {
        let f = fixture().await;
        f.store.insert("images", "beach pic.png", "bytes");

        let disposition = f.processor.process(&upload("beach pic.png")).await;

        assert_eq!(disposition, Disposition::Ack);
        assert!(f.catalog.get("beach pic.png").await.unwrap().is_some());
        assert_eq!(f.rejection_queue.depth(), 0);
    }

    #[tokio::test]
    async fn reprocessing_the_same_upload_is_idempotent() {
        let f = fixture().await;
        f.store.insert("images", "twice.jpg", "bytes");

        assert_eq!(f.processor.process(&upload("twice.jpg")).await, Disposition::Ack);
        assert_eq!(f.processor.process(&upload("twice.jpg")).await, Disposition::Ack);

        assert!(f.catalog.get("twice.jpg").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn unsupported_extension_publishes_rejection_and_acks() {
        let f = fixture().await;

        let disposition = f.processor.process(&upload("notes.txt")).await;

        assert_eq!(disposition, Disposition::Ack);
        assert!(f.catalog.get("notes.txt").await.unwrap().is_none());

        let rejected = f
            .rejection_queue
            .receive_batch(1, Duration::from_millis(10))
            .await;
        assert_eq!(rejected.len(), 1);
        assert_eq!(rejected[0].event.kind, EventKind::Rejected);
        assert_eq!(rejected[0].event.object_key, "notes.txt");
    }

    #[tokio::test]
    async fn fetch_failure_leaves_message_for_redelivery() {
        let f = fixture().await;
        // Nothing inserted into the store: fetch will fail.

        let disposition = f.processor.process(&upload("missing.png")).await;

        assert_eq!(disposition, Disposition::Retry);
        assert!(f.catalog.get("missing.png").await.unwrap().is_none());
        assert_eq!(f.rejection_queue.depth(), 0);
    }
}
