//! Startup wiring: the topic/queue/subscription graph and the consumer tasks.
//!
//! The whole graph is registered here once, before any traffic flows, and is
//! immutable afterwards. Collaborator clients (object store, mailer) are
//! constructed once per process and passed in explicitly.

use crate::broker::filter::AttributeFilter;
use crate::broker::queue::{Queue, QueuePolicy};
use crate::broker::topic::{DeliveryReceipt, EventConsumer, Subscription, Topic};
use crate::consumers::deleter::Deleter;
use crate::consumers::notifier::Notifier;
use crate::consumers::processor::Processor;
use crate::consumers::rejection::RejectionHandler;
use crate::consumers::update_applier::UpdateApplier;
use crate::consumers::{BatchConfig, spawn_consumer};
use crate::models::event::{ATTR_COMMENT_TYPE, Event, EventKind};
use crate::services::catalog_service::{CatalogChange, CatalogChangeKind, CatalogService};
use crate::services::mailer::Mailer;
use crate::services::object_store::ObjectStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::warn;

/// Tunables for the queue and consumer graph.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub batch_size: usize,
    pub max_batch_window: Duration,
    pub visibility_timeout: Duration,
    /// Delivery budget before a message is dead-lettered.
    pub max_receive_count: u32,
    /// Smaller budget for the caption queue, whose NotFound failures are
    /// deterministic and not worth many retries.
    pub caption_max_receive_count: u32,
    pub email_to: String,
    pub email_from: String,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            batch_size: 5,
            max_batch_window: Duration::from_secs(10),
            visibility_timeout: Duration::from_secs(30),
            max_receive_count: 3,
            caption_max_receive_count: 2,
            email_to: "uploader@example.com".to_string(),
            email_from: "noreply@example.com".to_string(),
        }
    }
}

/// The assembled event graph. Dropping it leaves the consumer tasks running;
/// call `shutdown` to stop them.
pub struct Pipeline {
    pub new_image_topic: Arc<Topic>,
    pub image_events_topic: Arc<Topic>,
    pub rejection_topic: Arc<Topic>,
    pub catalog: CatalogService,
    /// All queues in the graph, for observability.
    pub queues: Vec<Arc<Queue>>,
    tasks: Vec<JoinHandle<()>>,
}

impl Pipeline {
    /// Route a canonical event to the topic its kind belongs on, mirroring
    /// the bucket-notification wiring: uploads to `new-image`, removals and
    /// caption updates to `image-events`, rejections to `rejection`.
    pub async fn route_event(&self, event: &Event) -> Vec<DeliveryReceipt> {
        let topic = match event.kind {
            EventKind::Created => &self.new_image_topic,
            EventKind::Removed | EventKind::CaptionUpdated => &self.image_events_topic,
            EventKind::Rejected => &self.rejection_topic,
        };
        topic.publish(event).await
    }

    pub fn shutdown(&self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

/// Build the full graph and spawn its consumer tasks.
pub fn build(
    catalog: CatalogService,
    store: Arc<dyn ObjectStore>,
    mailer: Arc<dyn Mailer>,
    settings: &PipelineSettings,
) -> Pipeline {
    let policy = QueuePolicy {
        visibility_timeout: settings.visibility_timeout,
        max_receive_count: settings.max_receive_count,
    };

    // The DLQ has no dead-letter of its own: exhausted messages there stay
    // until an operator (or the rejection handler) drains them.
    let rejection_dlq = Queue::new("image-rejection-dlq", policy);
    let process_queue = Queue::with_dead_letter("image-process", policy, rejection_dlq.clone());
    let notify_queue = Queue::new("catalog-notify", policy);
    let caption_queue = Queue::with_dead_letter(
        "caption-update",
        QueuePolicy {
            visibility_timeout: settings.visibility_timeout,
            max_receive_count: settings.caption_max_receive_count,
        },
        rejection_dlq.clone(),
    );

    let rejection_topic =
        Arc::new(Topic::new("rejection").subscribe(Subscription::queue(rejection_dlq.clone())));

    let new_image_topic =
        Arc::new(Topic::new("new-image").subscribe(Subscription::queue(process_queue.clone())));

    let deleter: Arc<dyn EventConsumer> = Arc::new(Deleter::new(catalog.clone()));
    let image_events_topic = Arc::new(
        Topic::new("image-events")
            .subscribe(Subscription::consumer(deleter))
            .subscribe(
                Subscription::queue(caption_queue.clone())
                    .with_filter(AttributeFilter::new(ATTR_COMMENT_TYPE, ["Caption"])),
            ),
    );

    // The catalog change stream is the single notify trigger: mails go out
    // for committed catalog writes, not for raw storage events.
    let catalog_events_topic =
        Arc::new(Topic::new("catalog-events").subscribe(Subscription::queue(notify_queue.clone())));
    let changes = catalog.subscribe_changes();

    let batch = BatchConfig {
        batch_size: settings.batch_size,
        max_batch_window: settings.max_batch_window,
    };

    let tasks = vec![
        spawn_consumer(
            process_queue.clone(),
            Arc::new(Processor::new(
                catalog.clone(),
                store,
                rejection_topic.clone(),
            )),
            batch,
        ),
        spawn_consumer(
            notify_queue.clone(),
            Arc::new(Notifier::new(
                mailer.clone(),
                settings.email_to.clone(),
                settings.email_from.clone(),
            )),
            batch,
        ),
        spawn_consumer(
            rejection_dlq.clone(),
            Arc::new(RejectionHandler::new(
                mailer,
                settings.email_to.clone(),
                settings.email_from.clone(),
            )),
            batch,
        ),
        spawn_consumer(
            caption_queue.clone(),
            Arc::new(UpdateApplier::new(catalog.clone())),
            batch,
        ),
        spawn_change_pump(changes, catalog_events_topic),
    ];

    Pipeline {
        new_image_topic,
        image_events_topic,
        rejection_topic,
        catalog,
        queues: vec![process_queue, notify_queue, caption_queue, rejection_dlq],
        tasks,
    }
}

/// Pump committed catalog changes into the catalog-events topic, closing the
/// write-to-notify loop.
fn spawn_change_pump(
    mut changes: broadcast::Receiver<CatalogChange>,
    topic: Arc<Topic>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match changes.recv().await {
                Ok(change) => {
                    let event = match change.kind {
                        CatalogChangeKind::Insert => Event::created("catalog", change.file_name),
                        CatalogChangeKind::Remove => Event::removed("catalog", change.file_name),
                    };
                    topic.publish(&event).await;
                }
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!(missed, "catalog change stream lagged, notifications dropped");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}
