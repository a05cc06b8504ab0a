//! Event source adapter: normalizes storage-provider notifications into
//! canonical events.
//!
//! Provider payloads are parsed with a strict schema that fails closed: a
//! missing field, an unknown event type, or an undecodable key yields an
//! error, never a partial event. Object keys arrive with spaces encoded as
//! `+` on top of percent-encoding; both are undone here, exactly once, so the
//! rest of the pipeline only ever sees plain file names.

use crate::models::event::Event;
use percent_encoding::percent_decode_str;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("malformed notification payload: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("unknown event type `{0}`")]
    UnknownEventType(String),
    #[error("object key `{0}` is not valid percent-encoded UTF-8")]
    UndecodableKey(String),
    #[error("notification contains no records")]
    Empty,
}

/// The provider's notification envelope, e.g.
/// `{"Records":[{"eventName":"ObjectCreated:Put","s3":{...}}]}`.
#[derive(Debug, Deserialize)]
struct Notification {
    #[serde(rename = "Records")]
    records: Vec<NotificationRecord>,
}

#[derive(Debug, Deserialize)]
struct NotificationRecord {
    #[serde(rename = "eventName")]
    event_name: String,
    s3: S3Entity,
}

#[derive(Debug, Deserialize)]
struct S3Entity {
    bucket: BucketRef,
    object: ObjectRef,
}

#[derive(Debug, Deserialize)]
struct BucketRef {
    name: String,
}

#[derive(Debug, Deserialize)]
struct ObjectRef {
    key: String,
}

/// Parse a raw notification body into canonical events, one per record.
pub fn parse_notification(body: &str) -> Result<Vec<Event>, AdapterError> {
    let notification: Notification = serde_json::from_str(body)?;
    if notification.records.is_empty() {
        return Err(AdapterError::Empty);
    }

    notification
        .records
        .into_iter()
        .map(|record| {
            let key = decode_object_key(&record.s3.object.key)?;
            let bucket = record.s3.bucket.name;
            if record.event_name.starts_with("ObjectCreated") {
                Ok(Event::created(bucket, key))
            } else if record.event_name.starts_with("ObjectRemoved") {
                Ok(Event::removed(bucket, key))
            } else {
                Err(AdapterError::UnknownEventType(record.event_name))
            }
        })
        .collect()
}

/// Undo the provider's key encoding: `+` becomes a space, then
/// percent-decode. Applied exactly once, at ingestion.
pub fn decode_object_key(raw: &str) -> Result<String, AdapterError> {
    let plussed = raw.replace('+', " ");
    percent_decode_str(&plussed)
        .decode_utf8()
        .map(|decoded| decoded.into_owned())
        .map_err(|_| AdapterError::UndecodableKey(raw.to_string()))
}
