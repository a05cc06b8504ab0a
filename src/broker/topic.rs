//! Fan-out topics with static, attribute-filtered subscriptions.

use crate::broker::filter::AttributeFilter;
use crate::broker::queue::Queue;
use crate::models::{event::Event, message::Message};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, error};

/// A consumer invoked directly by a topic, without a queue in between.
///
/// A failing handler affects only its own subscription; sibling deliveries of
/// the same publish have already happened or still will.
#[async_trait]
pub trait EventConsumer: Send + Sync {
    fn name(&self) -> &str;
    async fn handle(&self, event: &Event) -> anyhow::Result<()>;
}

pub enum SubscriptionTarget {
    Queue(Arc<Queue>),
    Consumer(Arc<dyn EventConsumer>),
}

/// A single registration on a topic: a target plus an optional attribute
/// filter. No filter means match-all.
pub struct Subscription {
    name: String,
    target: SubscriptionTarget,
    filter: Option<AttributeFilter>,
}

impl Subscription {
    pub fn queue(queue: Arc<Queue>) -> Self {
        Self {
            name: queue.name().to_string(),
            target: SubscriptionTarget::Queue(queue),
            filter: None,
        }
    }

    pub fn consumer(consumer: Arc<dyn EventConsumer>) -> Self {
        Self {
            name: consumer.name().to_string(),
            target: SubscriptionTarget::Consumer(consumer),
            filter: None,
        }
    }

    pub fn with_filter(mut self, filter: AttributeFilter) -> Self {
        self.filter = Some(filter);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// A copy of the event reached the subscription's target.
    Delivered,
    /// The subscription's filter did not match; dropped for this
    /// subscription only.
    Filtered,
    /// A direct consumer returned an error. Queue targets cannot fail.
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct DeliveryReceipt {
    pub subscription: String,
    pub outcome: DeliveryOutcome,
}

/// A fan-out broker over a fixed subscription table.
///
/// Built once at startup and immutable afterwards; `publish` delivers one copy
/// of the event to every subscription whose filter matches, independently per
/// subscriber and never transactionally across them.
pub struct Topic {
    name: String,
    subscriptions: Vec<Subscription>,
}

impl Topic {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            subscriptions: Vec::new(),
        }
    }

    pub fn subscribe(mut self, subscription: Subscription) -> Self {
        self.subscriptions.push(subscription);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn publish(&self, event: &Event) -> Vec<DeliveryReceipt> {
        let mut receipts = Vec::with_capacity(self.subscriptions.len());

        for subscription in &self.subscriptions {
            let matches = subscription
                .filter
                .as_ref()
                .is_none_or(|filter| filter.matches(&event.attributes));

            let outcome = if !matches {
                DeliveryOutcome::Filtered
            } else {
                match &subscription.target {
                    SubscriptionTarget::Queue(queue) => {
                        queue.enqueue(Message::new(event.clone()));
                        DeliveryOutcome::Delivered
                    }
                    SubscriptionTarget::Consumer(consumer) => match consumer.handle(event).await {
                        Ok(()) => DeliveryOutcome::Delivered,
                        Err(err) => {
                            error!(
                                topic = %self.name,
                                subscription = %subscription.name,
                                error = %err,
                                "direct delivery failed"
                            );
                            DeliveryOutcome::Failed(err.to_string())
                        }
                    },
                }
            };

            receipts.push(DeliveryReceipt {
                subscription: subscription.name.clone(),
                outcome,
            });
        }

        let delivered = receipts
            .iter()
            .filter(|r| r.outcome == DeliveryOutcome::Delivered)
            .count();
        debug!(
            topic = %self.name,
            kind = ?event.kind,
            object_key = %event.object_key,
            delivered,
            filtered = receipts.len() - delivered,
            "published"
        );

        receipts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::queue::QueuePolicy;
    use crate::models::event::ATTR_COMMENT_TYPE;
    use std::sync::Mutex;
    use std::time::Duration;

    fn queue(name: &str) -> Arc<Queue> {
        Queue::new(
            name,
            QueuePolicy {
                visibility_timeout: Duration::from_secs(30),
                max_receive_count: 3,
            },
        )
    }

    struct Recording {
        seen: Mutex<Vec<String>>,
        fail: bool,
    }

    #[async_trait]
    impl EventConsumer for Recording {
        fn name(&self) -> &str {
            "recording"
        }

        async fn handle(&self, event: &Event) -> anyhow::Result<()> {
            if self.fail {
                anyhow::bail!("handler down");
            }
            self.seen
                .lock()
                .unwrap()
                .push(event.object_key.clone());
            Ok(())
        }
    }

    #[tokio::test]
    async fn delivers_one_copy_to_every_matching_subscription() {
        let first = queue("first");
        let second = queue("second");
        let topic = Topic::new("events")
            .subscribe(Subscription::queue(first.clone()))
            .subscribe(Subscription::queue(second.clone()));

        let receipts = topic.publish(&Event::created("images", "a.png")).await;

        assert!(receipts.iter().all(|r| r.outcome == DeliveryOutcome::Delivered));
        assert_eq!(first.depth(), 1);
        assert_eq!(second.depth(), 1);
    }

    #[tokio::test]
    async fn filter_drops_for_that_subscription_only() {
        let filtered = queue("filtered");
        let unfiltered = queue("unfiltered");
        let topic = Topic::new("events")
            .subscribe(
                Subscription::queue(filtered.clone())
                    .with_filter(AttributeFilter::new(ATTR_COMMENT_TYPE, ["Caption"])),
            )
            .subscribe(Subscription::queue(unfiltered.clone()));

        let plain = Event::created("images", "a.png");
        topic.publish(&plain).await;
        assert_eq!(filtered.depth(), 0);
        assert_eq!(unfiltered.depth(), 1);

        let caption = Event::caption_updated("a.png", "sunset", "Caption");
        let receipts = topic.publish(&caption).await;
        assert_eq!(receipts[0].outcome, DeliveryOutcome::Delivered);
        assert_eq!(filtered.depth(), 1);
        assert_eq!(unfiltered.depth(), 2);
    }

    #[tokio::test]
    async fn consumer_failure_does_not_affect_sibling_subscriptions() {
        let sibling = queue("sibling");
        let failing: Arc<dyn EventConsumer> = Arc::new(Recording {
            seen: Mutex::new(Vec::new()),
            fail: true,
        });
        let topic = Topic::new("events")
            .subscribe(Subscription::consumer(failing))
            .subscribe(Subscription::queue(sibling.clone()));

        let receipts = topic.publish(&Event::removed("images", "a.png")).await;

        assert!(matches!(receipts[0].outcome, DeliveryOutcome::Failed(_)));
        assert_eq!(receipts[1].outcome, DeliveryOutcome::Delivered);
        assert_eq!(sibling.depth(), 1);
    }

    #[tokio::test]
    async fn direct_consumer_receives_event() {
        let consumer = Arc::new(Recording {
            seen: Mutex::new(Vec::new()),
            fail: false,
        });
        let topic =
            Topic::new("events").subscribe(Subscription::consumer(consumer.clone()));

        topic.publish(&Event::removed("images", "gone.png")).await;

        assert_eq!(*consumer.seen.lock().unwrap(), vec!["gone.png".to_string()]);
    }
}
