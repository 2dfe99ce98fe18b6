#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::Mutex;
use std::time::Duration;
use shortener_core::domain::entities::{RegistryCounts, ShortenedUrl};
use shortener_core::domain::repositories::UrlRegistry;
use shortener_core::error::RegistryError;
use shortener_core::infrastructure::persistence::MemoryRegistry;

pub fn anonymous(alias: &str, url: &str) -> ShortenedUrl {
    ShortenedUrl::new(alias, url, "")
}

pub fn owned(alias: &str, url: &str, owner: &str) -> ShortenedUrl {
    ShortenedUrl::new(alias, url, owner)
}

/// Memory registry that records every `delete_batch` call and `close`.
#[derive(Default)]
pub struct RecordingRegistry {
    inner: MemoryRegistry,
    pub deletes: Mutex<Vec<(String, Vec<String>)>>,
    pub closed: Mutex<bool>,
}

impl RecordingRegistry {
    pub fn delete_calls(&self) -> Vec<(String, Vec<String>)> {
        self.deletes.lock().unwrap().clone()
    }

    pub fn deleted_alias_count(&self) -> usize {
        self.deletes.lock().unwrap().iter().map(|(_, a)| a.len()).sum()
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.lock().unwrap()
    }
}

#[async_trait]
impl UrlRegistry for RecordingRegistry {
    async fn store(&self, url: ShortenedUrl) -> Result<(), RegistryError> {
        self.inner.store(url).await
    }

    async fn store_batch(&self, urls: Vec<ShortenedUrl>) -> Result<(), RegistryError> {
        self.inner.store_batch(urls).await
    }

    async fn get_by_alias(&self, alias: &str) -> Result<ShortenedUrl, RegistryError> {
        self.inner.get_by_alias(alias).await
    }

    async fn get_by_original_url(
        &self,
        original_url: &str,
    ) -> Result<ShortenedUrl, RegistryError> {
        self.inner.get_by_original_url(original_url).await
    }

    async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<ShortenedUrl>, RegistryError> {
        self.inner.list_by_owner(owner_id).await
    }

    async fn delete_batch(
        &self,
        owner_id: &str,
        aliases: &[String],
    ) -> Result<(), RegistryError> {
        assert!(!self.is_closed(), "delete_batch after close");
        self.deletes
            .lock()
            .unwrap()
            .push((owner_id.to_string(), aliases.to_vec()));
        self.inner.delete_batch(owner_id, aliases).await
    }

    async fn count(&self) -> Result<RegistryCounts, RegistryError> {
        self.inner.count().await
    }

    async fn ping(&self) -> Result<(), RegistryError> {
        self.inner.ping().await
    }

    async fn close(&self) -> Result<(), RegistryError> {
        *self.closed.lock().unwrap() = true;
        self.inner.close().await
    }
}

/// Polls `condition` every 10ms until it holds or `timeout` elapses.
pub async fn wait_until<F: Fn() -> bool>(timeout: Duration, condition: F) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
