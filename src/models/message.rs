//! Queue-resident wrapper around an event.

use crate::models::event::Event;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A message as held by a queue and handed to consumers.
///
/// `receive_count` increments exactly once per delivery attempt and never
/// decreases; once it exhausts the queue's receive budget the message moves to
/// the dead-letter queue instead of becoming visible again.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Identifier used to acknowledge this message back to its queue.
    pub id: Uuid,

    pub event: Event,

    /// Number of times this message has been delivered to a consumer.
    pub receive_count: u32,

    pub first_enqueued_at: DateTime<Utc>,
}

impl Message {
    pub fn new(event: Event) -> Self {
        Self {
            id: Uuid::new_v4(),
            event,
            receive_count: 0,
            first_enqueued_at: Utc::now(),
        }
    }
}
