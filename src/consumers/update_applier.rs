//! Applies caption updates to catalogued images.
//!
//! The `comment_type = "Caption"` gate is enforced upstream by the topic's
//! attribute filter and is not re-checked here. A NotFound from the catalog
//! is a definite failure, not a transient one: it is retried only within this
//! queue's deliberately small receive budget before dead-lettering, since the
//! condition cannot resolve without a corresponding upload.

use crate::consumers::{Disposition, QueueConsumer};
use crate::models::event::EventKind;
use crate::models::message::Message;
use crate::services::catalog_service::{CatalogError, CatalogService};
use async_trait::async_trait;
use tracing::{error, info, warn};

pub struct UpdateApplier {
    catalog: CatalogService,
}

impl UpdateApplier {
    pub fn new(catalog: CatalogService) -> Self {
        Self { catalog }
    }
}

#[async_trait]
impl QueueConsumer for UpdateApplier {
    fn name(&self) -> &'static str {
        "update-applier"
    }

    async fn process(&self, message: &Message) -> Disposition {
        let event = &message.event;
        if event.kind != EventKind::CaptionUpdated {
            warn!(kind = ?event.kind, "update applier received a non-caption event, dropping");
            return Disposition::Ack;
        }
        let Some(description) = event.description.as_deref() else {
            warn!(object_key = %event.object_key, "caption update without a description, dropping");
            return Disposition::Ack;
        };

        match self
            .catalog
            .update_description(&event.object_key, description)
            .await
        {
            Ok(()) => {
                info!(object_key = %event.object_key, "caption updated");
                Disposition::Ack
            }
            Err(CatalogError::NotFound(file_name)) => {
                warn!(%file_name, "caption update for an uncatalogued file");
                Disposition::Retry
            }
            Err(err) => {
                error!(object_key = %event.object_key, error = %err, "caption update failed");
                Disposition::Retry
            }
        }
    }
}
