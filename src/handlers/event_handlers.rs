//! HTTP handlers for event ingestion and catalog lookup.
//!
//! Ingestion is the adapter boundary: provider payloads are validated and
//! normalized here, and anything malformed is refused with a 400 rather than
//! entering the pipeline.

use crate::{
    adapter,
    app::Pipeline,
    broker::topic::DeliveryOutcome,
    errors::AppError,
    models::{catalog::CatalogEntry, event::Event},
};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Summary of one ingest call: how many events were published and how many
/// subscription deliveries resulted.
#[derive(Debug, Serialize)]
pub struct IngestResponse {
    pub events: usize,
    pub delivered: usize,
    pub filtered: usize,
}

/// `POST /events/storage`
///
/// Accepts the storage provider's notification envelope and routes each
/// record onto its topic.
pub async fn ingest_storage_notification(
    State(pipeline): State<Arc<Pipeline>>,
    body: String,
) -> Result<impl IntoResponse, AppError> {
    let events = adapter::parse_notification(&body)?;

    let mut delivered = 0;
    let mut filtered = 0;
    let count = events.len();
    for event in &events {
        for receipt in pipeline.route_event(event).await {
            match receipt.outcome {
                DeliveryOutcome::Delivered => delivered += 1,
                DeliveryOutcome::Filtered => filtered += 1,
                DeliveryOutcome::Failed(_) => {}
            }
        }
    }

    Ok((
        StatusCode::ACCEPTED,
        Json(IngestResponse {
            events: count,
            delivered,
            filtered,
        }),
    ))
}

/// Request body for a caption update.
#[derive(Debug, Deserialize)]
pub struct CaptionUpdateRequest {
    pub name: String,
    pub description: String,
    /// Routing attribute; only `"Caption"` reaches the update applier.
    pub comment_type: String,
}

/// `POST /events/captions`
pub async fn submit_caption_update(
    State(pipeline): State<Arc<Pipeline>>,
    Json(request): Json<CaptionUpdateRequest>,
) -> Result<impl IntoResponse, AppError> {
    let event = Event::caption_updated(request.name, request.description, request.comment_type);

    let receipts = pipeline.route_event(&event).await;
    let delivered = receipts
        .iter()
        .filter(|r| r.outcome == DeliveryOutcome::Delivered)
        .count();

    Ok((
        StatusCode::ACCEPTED,
        Json(IngestResponse {
            events: 1,
            delivered,
            filtered: receipts.len() - delivered,
        }),
    ))
}

/// `GET /catalog/{*file_name}`
pub async fn get_catalog_entry(
    State(pipeline): State<Arc<Pipeline>>,
    Path(file_name): Path<String>,
) -> Result<Json<CatalogEntry>, AppError> {
    pipeline
        .catalog
        .get(&file_name)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found(format!("catalog entry `{}` not found", file_name)))
}
