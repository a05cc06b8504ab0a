//! HTTP handlers: event ingestion, catalog lookup, health.

pub mod event_handlers;
pub mod health_handlers;
