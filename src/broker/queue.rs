//! An in-process, at-least-once work queue with batched withdrawal,
//! visibility-timeout redelivery, and dead-letter redirection.
//!
//! Receivers wait cooperatively: `receive_batch` parks on a `Notify` until the
//! batch fills or the batching window elapses, whichever comes first. A
//! received message stays invisible for the queue's visibility timeout; if it
//! is not acknowledged in that window it becomes receivable again, unless its
//! receive budget is exhausted, in which case it moves to the dead-letter
//! queue instead. A message is always in exactly one of the source queue or
//! the dead-letter queue, never both.

use crate::models::message::Message;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::{debug, warn};
use uuid::Uuid;

/// Redelivery policy for a queue.
#[derive(Debug, Clone, Copy)]
pub struct QueuePolicy {
    /// How long a received-but-unacknowledged message stays hidden before it
    /// may be redelivered.
    pub visibility_timeout: Duration,

    /// Delivery attempts a message may consume before it is dead-lettered.
    /// Only enforced when a dead-letter queue is attached.
    pub max_receive_count: u32,
}

struct InFlight {
    message: Message,
    visible_after: Instant,
}

#[derive(Default)]
struct QueueInner {
    ready: VecDeque<Message>,
    in_flight: HashMap<Uuid, InFlight>,
}

pub struct Queue {
    name: String,
    policy: QueuePolicy,
    dead_letter: Option<Arc<Queue>>,
    inner: Mutex<QueueInner>,
    arrivals: Notify,
}

impl Queue {
    pub fn new(name: impl Into<String>, policy: QueuePolicy) -> Arc<Self> {
        Self::build(name, policy, None)
    }

    pub fn with_dead_letter(
        name: impl Into<String>,
        policy: QueuePolicy,
        dead_letter: Arc<Queue>,
    ) -> Arc<Self> {
        Self::build(name, policy, Some(dead_letter))
    }

    fn build(
        name: impl Into<String>,
        policy: QueuePolicy,
        dead_letter: Option<Arc<Queue>>,
    ) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            policy,
            dead_letter,
            inner: Mutex::new(QueueInner::default()),
            arrivals: Notify::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of messages currently receivable.
    pub fn depth(&self) -> usize {
        self.lock().ready.len()
    }

    /// Number of messages delivered and awaiting acknowledgment.
    pub fn in_flight(&self) -> usize {
        self.lock().in_flight.len()
    }

    /// Append a message. The message is owned by the queue once this returns.
    pub fn enqueue(&self, message: Message) {
        debug!(queue = %self.name, id = %message.id, "enqueue");
        self.lock().ready.push_back(message);
        self.arrivals.notify_one();
    }

    /// Withdraw up to `max_batch` messages, waiting until the batch fills or
    /// `max_wait` elapses. Returned messages are invisible for the visibility
    /// timeout; each has had its receive count incremented exactly once.
    ///
    /// Returns an empty batch if nothing arrived within the window.
    pub async fn receive_batch(&self, max_batch: usize, max_wait: Duration) -> Vec<Message> {
        let deadline = Instant::now() + max_wait;
        let mut batch = Vec::new();

        loop {
            // Register interest before claiming, so an enqueue racing with the
            // claim below cannot be missed.
            let arrival = self.arrivals.notified();

            let next_expiry = {
                let mut inner = self.lock();
                self.reap_expired(&mut inner);
                self.claim(&mut inner, max_batch, &mut batch);
                inner.in_flight.values().map(|f| f.visible_after).min()
            };

            if batch.len() >= max_batch || Instant::now() >= deadline {
                return batch;
            }

            // Wake for a new arrival, an in-flight message coming back, or the
            // end of the batching window.
            let wake_at = next_expiry.map_or(deadline, |expiry| expiry.min(deadline));
            tokio::select! {
                _ = arrival => {}
                _ = tokio::time::sleep_until(wake_at) => {}
            }
        }
    }

    /// Acknowledge a delivered message, removing it permanently.
    ///
    /// Returns false if the message is unknown, typically because its
    /// visibility timeout already expired and it was requeued or
    /// dead-lettered.
    pub fn ack(&self, id: Uuid) -> bool {
        let removed = self.lock().in_flight.remove(&id).is_some();
        if !removed {
            warn!(queue = %self.name, %id, "ack for unknown message; it may have been redelivered");
        }
        removed
    }

    /// Return a delivered message immediately, without waiting for its
    /// visibility timeout. Subject to the same dead-letter check as an
    /// expired message.
    pub fn nack(&self, id: Uuid) {
        let mut inner = self.lock();
        if let Some(in_flight) = inner.in_flight.remove(&id) {
            self.retire(&mut inner, in_flight.message, "nack");
        }
    }

    fn claim(&self, inner: &mut QueueInner, max_batch: usize, batch: &mut Vec<Message>) {
        while batch.len() < max_batch {
            let Some(mut message) = inner.ready.pop_front() else {
                break;
            };
            message.receive_count += 1;
            inner.in_flight.insert(
                message.id,
                InFlight {
                    message: message.clone(),
                    visible_after: Instant::now() + self.policy.visibility_timeout,
                },
            );
            batch.push(message);
        }
    }

    /// Move expired in-flight messages back to the ready list or on to the
    /// dead-letter queue.
    fn reap_expired(&self, inner: &mut QueueInner) {
        let now = Instant::now();
        let expired: Vec<Uuid> = inner
            .in_flight
            .iter()
            .filter(|(_, f)| f.visible_after <= now)
            .map(|(id, _)| *id)
            .collect();
        for id in expired {
            if let Some(in_flight) = inner.in_flight.remove(&id) {
                self.retire(inner, in_flight.message, "visibility timeout expired");
            }
        }
    }

    /// Requeue an unacknowledged message, or dead-letter it once its receive
    /// budget is spent. Both moves happen under the queue lock, so the message
    /// is never observable in two places.
    fn retire(&self, inner: &mut QueueInner, message: Message, cause: &str) {
        match &self.dead_letter {
            Some(dlq) if message.receive_count >= self.policy.max_receive_count => {
                warn!(
                    queue = %self.name,
                    dead_letter = %dlq.name,
                    id = %message.id,
                    receive_count = message.receive_count,
                    "receive budget exhausted, dead-lettering message"
                );
                dlq.enqueue(message);
            }
            _ => {
                debug!(queue = %self.name, id = %message.id, cause, "message made visible again");
                inner.ready.push_back(message);
                self.arrivals.notify_one();
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueInner> {
        self.inner.lock().expect("queue mutex poisoned")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::event::Event;

    const SECOND: Duration = Duration::from_secs(1);

    fn policy(max_receive_count: u32) -> QueuePolicy {
        QueuePolicy {
            visibility_timeout: Duration::from_secs(30),
            max_receive_count,
        }
    }

    fn message(key: &str) -> Message {
        Message::new(Event::created("images", key))
    }

    #[tokio::test(start_paused = true)]
    async fn receive_returns_early_when_batch_fills() {
        let queue = Queue::new("q", policy(3));
        for i in 0..3 {
            queue.enqueue(message(&format!("img-{i}.png")));
        }

        let batch = queue.receive_batch(3, Duration::from_secs(10)).await;
        assert_eq!(batch.len(), 3);
        assert!(batch.iter().all(|m| m.receive_count == 1));
    }

    #[tokio::test(start_paused = true)]
    async fn receive_returns_partial_batch_at_window_end() {
        let queue = Queue::new("q", policy(3));
        queue.enqueue(message("solo.png"));

        let started = Instant::now();
        let batch = queue.receive_batch(5, Duration::from_secs(10)).await;
        assert_eq!(batch.len(), 1);
        assert!(started.elapsed() >= Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn receive_returns_empty_after_window_with_no_traffic() {
        let queue = Queue::new("q", policy(3));
        let batch = queue.receive_batch(5, Duration::from_secs(2)).await;
        assert!(batch.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn receive_wakes_on_late_arrival() {
        let queue = Queue::new("q", policy(3));
        let waiter = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.receive_batch(1, Duration::from_secs(30)).await })
        };

        tokio::time::sleep(5 * SECOND).await;
        queue.enqueue(message("late.png"));

        let batch = waiter.await.unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].event.object_key, "late.png");
    }

    #[tokio::test(start_paused = true)]
    async fn acknowledged_message_is_gone() {
        let queue = Queue::new("q", policy(3));
        queue.enqueue(message("done.png"));

        let batch = queue.receive_batch(1, SECOND).await;
        assert!(queue.ack(batch[0].id));

        tokio::time::sleep(Duration::from_secs(60)).await;
        let again = queue.receive_batch(1, SECOND).await;
        assert!(again.is_empty());
        assert_eq!(queue.in_flight(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn unacknowledged_message_is_redelivered_with_higher_count() {
        let queue = Queue::new("q", policy(3));
        queue.enqueue(message("flaky.png"));

        let first = queue.receive_batch(1, SECOND).await;
        assert_eq!(first[0].receive_count, 1);

        // No ack; wait out the 30s visibility timeout.
        tokio::time::sleep(Duration::from_secs(31)).await;
        let second = queue.receive_batch(1, SECOND).await;
        assert_eq!(second[0].id, first[0].id);
        assert_eq!(second[0].receive_count, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_message_moves_to_dead_letter_queue() {
        let dlq = Queue::new("dlq", policy(3));
        let queue = Queue::with_dead_letter("q", policy(3), dlq.clone());
        queue.enqueue(message("poison.png"));

        for attempt in 1..=3u32 {
            let batch = queue.receive_batch(1, SECOND).await;
            assert_eq!(batch.len(), 1, "attempt {attempt} should deliver");
            assert_eq!(batch[0].receive_count, attempt);
            tokio::time::sleep(Duration::from_secs(31)).await;
        }

        // Fourth attempt: source queue is empty, the message is in the DLQ.
        let empty = queue.receive_batch(1, SECOND).await;
        assert!(empty.is_empty());
        assert_eq!(queue.depth(), 0);
        assert_eq!(queue.in_flight(), 0);

        let dead = dlq.receive_batch(1, SECOND).await;
        assert_eq!(dead.len(), 1);
        assert_eq!(dead[0].event.object_key, "poison.png");
    }

    #[tokio::test(start_paused = true)]
    async fn nack_requeues_immediately() {
        let queue = Queue::new("q", policy(3));
        queue.enqueue(message("retry.png"));

        let first = queue.receive_batch(1, SECOND).await;
        queue.nack(first[0].id);

        let second = queue.receive_batch(1, SECOND).await;
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].receive_count, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn queue_without_dead_letter_requeues_forever() {
        let queue = Queue::new("q", policy(1));
        queue.enqueue(message("stubborn.png"));

        for attempt in 1..=4u32 {
            let batch = queue.receive_batch(1, SECOND).await;
            assert_eq!(batch[0].receive_count, attempt);
            queue.nack(batch[0].id);
        }
    }
}
