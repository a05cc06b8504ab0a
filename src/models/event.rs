//! The canonical event envelope published to topics.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Attribute name used to route caption updates to the update applier.
pub const ATTR_COMMENT_TYPE: &str = "comment_type";

/// Attribute name carrying a human-readable reason on rejection events.
pub const ATTR_REJECTION_REASON: &str = "rejection_reason";

/// What happened to the subject file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    /// A new object was uploaded to storage.
    Created,
    /// An object was removed from storage.
    Removed,
    /// A caption/description update was requested for a catalogued file.
    CaptionUpdated,
    /// An upload failed validation; routed to the rejection path.
    Rejected,
}

/// A single immutable event, normalized at the ingestion boundary.
///
/// The object key is decoded from any provider-specific encoding exactly once,
/// before the event is constructed; everything downstream treats `object_key`
/// as the plain file name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub kind: EventKind,

    /// Decoded key uniquely identifying the subject file within its source.
    pub object_key: String,

    /// Where the event originated: a storage bucket name, `catalog` for
    /// change-stream events, or `processor` for rejections.
    pub source: String,

    /// Routing attributes, matched by subscription filters.
    #[serde(default)]
    pub attributes: HashMap<String, String>,

    /// Caption payload, present only on `CaptionUpdated` events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    pub timestamp: DateTime<Utc>,
}

impl Event {
    pub fn created(source: impl Into<String>, object_key: impl Into<String>) -> Self {
        Self::new(EventKind::Created, source, object_key)
    }

    pub fn removed(source: impl Into<String>, object_key: impl Into<String>) -> Self {
        Self::new(EventKind::Removed, source, object_key)
    }

    /// A caption update for `object_key`. The `comment_type` attribute is what
    /// subscription filters match on; the description rides in the payload.
    pub fn caption_updated(
        object_key: impl Into<String>,
        description: impl Into<String>,
        comment_type: impl Into<String>,
    ) -> Self {
        let mut event = Self::new(EventKind::CaptionUpdated, "catalog", object_key);
        event.description = Some(description.into());
        event
            .attributes
            .insert(ATTR_COMMENT_TYPE.to_string(), comment_type.into());
        event
    }

    /// A validation rejection carrying the original file name.
    pub fn rejected(
        source: impl Into<String>,
        object_key: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        let mut event = Self::new(EventKind::Rejected, source, object_key);
        event
            .attributes
            .insert(ATTR_REJECTION_REASON.to_string(), reason.into());
        event
    }

    fn new(kind: EventKind, source: impl Into<String>, object_key: impl Into<String>) -> Self {
        Self {
            kind,
            object_key: object_key.into(),
            source: source.into(),
            attributes: HashMap::new(),
            description: None,
            timestamp: Utc::now(),
        }
    }
}
