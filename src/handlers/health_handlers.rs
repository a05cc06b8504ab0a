//! Health & readiness handlers.
//!
//! - GET /healthz  -> simple liveness ("ok")
//! - GET /readyz   -> readiness that checks catalog connectivity and reports
//!   queue depths

use crate::app::Pipeline;
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

/// `GET /healthz`
///
/// Very small liveness probe — always returns 200 OK with a plain JSON body.
/// This endpoint should be cheap and never perform I/O.
pub async fn healthz() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok".into(),
        }),
    )
}

/// `GET /readyz`
///
/// Readiness probe that runs a lightweight query against the catalog store
/// and snapshots the queue depths (receivable + in flight) for operators.
/// HTTP 200 when the store answers, HTTP 503 otherwise.
pub async fn readyz(State(pipeline): State<Arc<Pipeline>>) -> impl IntoResponse {
    let catalog_check = match pipeline.catalog.get(".readyz-probe").await {
        Ok(_) => (true, None::<String>),
        Err(e) => (false, Some(format!("error: {}", e))),
    };

    let queues: HashMap<String, QueueDepth> = pipeline
        .queues
        .iter()
        .map(|queue| {
            (
                queue.name().to_string(),
                QueueDepth {
                    ready: queue.depth(),
                    in_flight: queue.in_flight(),
                },
            )
        })
        .collect();

    let ok = catalog_check.0;
    let body = ReadyResponse {
        status: if ok { "ok".into() } else { "error".into() },
        catalog: CheckStatus {
            ok,
            error: catalog_check.1,
        },
        queues,
    };

    let status = if ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(body))
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
}

#[derive(Serialize)]
struct ReadyResponse {
    status: String,
    catalog: CheckStatus,
    queues: HashMap<String, QueueDepth>,
}

#[derive(Serialize)]
struct CheckStatus {
    ok: bool,
    error: Option<String>,
}

#[derive(Serialize)]
struct QueueDepth {
    ready: usize,
    in_flight: usize,
}
