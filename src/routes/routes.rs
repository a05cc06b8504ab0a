//! Defines the HTTP surface of the pipeline.
//!
//! ## Structure
//! - **Ingestion endpoints**
//!   - `POST /events/storage`  — storage provider notification envelope
//!   - `POST /events/captions` — caption update for a catalogued image
//!
//! - **Catalog endpoints**
//!   - `GET  /catalog/{*file_name}` — look up a catalog entry
//!
//! The wildcard `*file_name` allows keys with slashes like
//! `photos/2025/img.jpg`.

use crate::{
    app::Pipeline,
    handlers::{
        event_handlers::{get_catalog_entry, ingest_storage_notification, submit_caption_update},
        health_handlers::{healthz, readyz},
    },
};
use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;

/// Build and return the router for the whole service.
///
/// The router carries the shared pipeline handle to all handlers.
pub fn routes() -> Router<Arc<Pipeline>> {
    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        // Ingestion routes
        .route("/events/storage", post(ingest_storage_notification))
        .route("/events/captions", post(submit_caption_update))
        // Catalog routes
        .route("/catalog/{*file_name}", get(get_catalog_entry))
}
