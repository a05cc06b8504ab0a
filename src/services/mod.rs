//! Service layer: the catalog store and the external-collaborator seams
//! (object storage, outbound mail).

pub mod catalog_service;
pub mod mailer;
pub mod object_store;
