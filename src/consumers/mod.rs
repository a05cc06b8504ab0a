//! Consumers: independent, stateless invocation units fed by queues or by
//! direct topic subscriptions.
//!
//! Each queue binding runs as its own task, withdrawing one batch per
//! iteration. Messages are settled individually: one message's failure never
//! blocks acknowledgment of its siblings, and a failed message simply stays
//! unacknowledged so the queue's redelivery and dead-letter policy takes over.

pub mod deleter;
pub mod notifier;
pub mod processor;
pub mod rejection;
pub mod update_applier;

use crate::broker::queue::Queue;
use crate::models::message::Message;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;

/// What to do with a message after one processing attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Processing succeeded, or the message is beyond repair and retrying
    /// cannot help; remove it from the queue.
    Ack,
    /// Transient failure: leave the message unacknowledged and let the
    /// queue's visibility timeout redeliver it.
    Retry,
}

/// Batch withdrawal settings for one queue binding.
#[derive(Debug, Clone, Copy)]
pub struct BatchConfig {
    pub batch_size: usize,
    pub max_batch_window: Duration,
}

#[async_trait]
pub trait QueueConsumer: Send + Sync {
    fn name(&self) -> &'static str;

    /// Process one message. Failures here affect this message only.
    async fn process(&self, message: &Message) -> Disposition;
}

/// Drive a consumer from a queue until the process shuts down.
pub fn spawn_consumer(
    queue: Arc<Queue>,
    consumer: Arc<dyn QueueConsumer>,
    config: BatchConfig,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let batch = queue
                .receive_batch(config.batch_size, config.max_batch_window)
                .await;
            if batch.is_empty() {
                continue;
            }
            debug!(
                consumer = consumer.name(),
                queue = queue.name(),
                size = batch.len(),
                "processing batch"
            );
            for message in &batch {
                match consumer.process(message).await {
                    Disposition::Ack => {
                        queue.ack(message.id);
                    }
                    // Left in flight; the visibility timeout will make the
                    // message receivable again or dead-letter it.
                    Disposition::Retry => {}
                }
            }
        }
    })
}
