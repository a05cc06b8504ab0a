//! Event-driven image catalog pipeline.
//!
//! Storage upload/removal notifications enter through the HTTP adapter, fan
//! out through in-process topics and at-least-once queues, and land in
//! independent consumers: the processor validates and catalogs uploads, the
//! notifier mails on catalog changes, the rejection handler drains the
//! dead-letter queue, and the update applier writes captions.

pub mod adapter;
pub mod app;
pub mod broker;
pub mod config;
pub mod consumers;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;
