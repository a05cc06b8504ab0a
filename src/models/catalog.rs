//! Represents a catalogued image.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A single row in the image catalog.
///
/// Entries are created only by the processor after a successful validation,
/// never implicitly by an update. `file_name` is the primary key and matches
/// exactly one storage object for as long as the entry exists.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
pub struct CatalogEntry {
    /// Decoded object key, unique within the catalog.
    pub file_name: String,

    /// When the upload was catalogued.
    pub upload_time: DateTime<Utc>,

    /// Optional caption, set by the update applier.
    pub description: Option<String>,
}
