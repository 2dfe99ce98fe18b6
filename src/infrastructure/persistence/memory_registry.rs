//! In-memory registry implementation.

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use super::dedup_index::DedupIndex;
use crate::domain::entities::{RegistryCounts, ShortenedUrl};
use crate::domain::repositories::UrlRegistry;
use crate::error::RegistryError;

/// Non-durable registry holding every entry in process memory.
///
/// A single read/write lock guards the index, which makes the dedup check and
/// the insert atomic with respect to concurrent stores.
#[derive(Default)]
pub struct MemoryRegistry {
    index: RwLock<DedupIndex>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        debug!("Using in-memory registry (no durability)");
        Self::default()
    }
}

#[async_trait]
impl UrlRegistry for MemoryRegistry {
    async fn store(&self, url: ShortenedUrl) -> Result<(), RegistryError> {
        let mut index = self.index.write().await;
        index.check(&url)?;
        index.insert(url);
        Ok(())
    }

    async fn store_batch(&self, urls: Vec<ShortenedUrl>) -> Result<(), RegistryError> {
        let mut index = self.index.write().await;
        for url in urls {
            match index.check(&url) {
                Ok(()) => index.insert(url),
                Err(e) => debug!(alias = %url.alias, "Skipping batch entry: {}", e),
            }
        }
        Ok(())
    }

    async fn get_by_alias(&self, alias: &str) -> Result<ShortenedUrl, RegistryError> {
        self.index
            .read()
            .await
            .get_by_alias(alias)
            .cloned()
            .ok_or_else(|| RegistryError::not_found(alias))
    }

    async fn get_by_original_url(
        &self,
        original_url: &str,
    ) -> Result<ShortenedUrl, RegistryError> {
        self.index
            .read()
            .await
            .get_by_original_url(original_url)
            .cloned()
            .ok_or_else(|| RegistryError::not_found(original_url))
    }

    async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<ShortenedUrl>, RegistryError> {
        Ok(self.index.read().await.list_by_owner(owner_id))
    }

    async fn delete_batch(
        &self,
        owner_id: &str,
        aliases: &[String],
    ) -> Result<(), RegistryError> {
        let mut index = self.index.write().await;
        for entry in index.deletable(owner_id, aliases) {
            index.mark_deleted(&entry.alias);
        }
        Ok(())
    }

    async fn count(&self) -> Result<RegistryCounts, RegistryError> {
        Ok(self.index.read().await.counts())
    }

    async fn ping(&self) -> Result<(), RegistryError> {
        Ok(())
    }

    async fn close(&self) -> Result<(), RegistryError> {
        Ok(())
    }
}
