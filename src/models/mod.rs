//! Core data models for the image event pipeline.
//!
//! These entities represent the canonical event envelope flowing through the
//! broker, the queue-resident message wrapper around it, and the catalog row
//! it ultimately produces. The catalog row maps to its table via
//! `sqlx::FromRow`; everything serializes naturally as JSON via `serde`.

pub mod catalog;
pub mod event;
pub mod message;
