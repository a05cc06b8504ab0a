//! Removes catalog entries when the backing storage object is deleted.
//!
//! Subscribed directly to the image-events topic, no queue in between. The
//! topic also carries caption traffic for its filtered subscriptions, so
//! anything other than a removal is ignored here.

use crate::broker::topic::EventConsumer;
use crate::models::event::{Event, EventKind};
use crate::services::catalog_service::CatalogService;
use async_trait::async_trait;
use tracing::info;

pub struct Deleter {
    catalog: CatalogService,
}

impl Deleter {
    pub fn new(catalog: CatalogService) -> Self {
        Self { catalog }
    }
}

#[async_trait]
impl EventConsumer for Deleter {
    fn name(&self) -> &str {
        "image-deleter"
    }

    async fn handle(&self, event: &Event) -> anyhow::Result<()> {
        if event.kind != EventKind::Removed {
            return Ok(());
        }
        self.catalog.delete(&event.object_key).await?;
        info!(object_key = %event.object_key, "catalog entry deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;
    use std::sync::Arc;

    async fn catalog() -> CatalogService {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("in-memory sqlite");
        let catalog = CatalogService::new(Arc::new(pool));
        catalog.apply_schema().await.expect("schema");
        catalog
    }

    #[tokio::test]
    async fn removal_deletes_the_entry() {
        let catalog = catalog().await;
        catalog.put("old.jpg").await.unwrap();
        let deleter = Deleter::new(catalog.clone());

        deleter
            .handle(&Event::removed("images", "old.jpg"))
            .await
            .unwrap();

        assert!(catalog.get("old.jpg").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn non_removal_traffic_is_ignored() {
        let catalog = catalog().await;
        catalog.put("keep.png").await.unwrap();
        let deleter = Deleter::new(catalog.clone());

        deleter
            .handle(&Event::caption_updated("keep.png", "text", "Caption"))
            .await
            .unwrap();

        assert!(catalog.get("keep.png").await.unwrap().is_some());
    }
}
