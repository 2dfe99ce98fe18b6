//! Shortening, resolution and deletion requests on top of a registry.

use std::sync::Arc;

use tracing::debug;

use crate::domain::deletion::DeletionSender;
use crate::domain::entities::{DeleteTask, RegistryCounts, ShortenedUrl};
use crate::domain::repositories::UrlRegistry;
use crate::error::{PipelineError, RegistryError};

/// Outcome of [`ShortenerService::shorten`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Shortened {
    /// The mapping was stored.
    Created(ShortenedUrl),
    /// The original URL was already shortened; `alias` is the one to hand out.
    Existing { alias: String },
}

impl Shortened {
    pub fn alias(&self) -> &str {
        match self {
            Self::Created(url) => &url.alias,
            Self::Existing { alias } => alias,
        }
    }
}

/// Outcome of [`ShortenerService::resolve`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Redirect(String),
    /// The alias exists but was deleted by its owner.
    Gone,
}

/// Service facade used by the external request layer.
///
/// Alias generation and URL validation happen before this service is called;
/// it only decides what the registry says about a mapping.
pub struct ShortenerService {
    registry: Arc<dyn UrlRegistry>,
    deletions: DeletionSender,
}

impl ShortenerService {
    pub fn new(registry: Arc<dyn UrlRegistry>, deletions: DeletionSender) -> Self {
        Self {
            registry,
            deletions,
        }
    }

    /// Stores `original_url` under `alias`, or reports the alias it already has.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::AliasInUse`] when the candidate alias is taken
    /// by another URL; the caller should retry with a fresh alias.
    pub async fn shorten(
        &self,
        original_url: &str,
        owner_id: &str,
        alias: &str,
    ) -> Result<Shortened, RegistryError> {
        let url = ShortenedUrl::new(alias, original_url, owner_id);

        match self.registry.store(url.clone()).await {
            Ok(()) => Ok(Shortened::Created(url)),
            Err(RegistryError::AlreadyExists { alias }) => {
                debug!(%alias, "URL already shortened");
                Ok(Shortened::Existing { alias })
            }
            Err(e) => Err(e),
        }
    }

    /// Stores a batch and returns the effective mapping of every entry, in input order.
    ///
    /// Entries whose URL was already known come back with the existing alias.
    pub async fn shorten_batch(
        &self,
        entries: Vec<ShortenedUrl>,
    ) -> Result<Vec<ShortenedUrl>, RegistryError> {
        let urls: Vec<String> = entries.iter().map(|e| e.original_url.clone()).collect();
        self.registry.store_batch(entries).await?;

        let mut stored = Vec::with_capacity(urls.len());
        for url in &urls {
            stored.push(self.registry.get_by_original_url(url).await?);
        }
        Ok(stored)
    }

    /// Looks up where `alias` points.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] for unknown aliases.
    pub async fn resolve(&self, alias: &str) -> Result<Resolution, RegistryError> {
        let url = self.registry.get_by_alias(alias).await?;
        if url.deleted {
            return Ok(Resolution::Gone);
        }
        Ok(Resolution::Redirect(url.original_url))
    }

    pub async fn owner_urls(&self, owner_id: &str) -> Result<Vec<ShortenedUrl>, RegistryError> {
        self.registry.list_by_owner(owner_id).await
    }

    pub async fn stats(&self) -> Result<RegistryCounts, RegistryError> {
        self.registry.count().await
    }

    /// Queues a deferred deletion. Returns once the task is accepted.
    pub async fn request_deletion(
        &self,
        owner_id: &str,
        aliases: Vec<String>,
    ) -> Result<(), PipelineError> {
        self.deletions
            .submit(DeleteTask::new(owner_id, aliases))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::repositories::MockUrlRegistry;
    use crate::lifecycle::ShutdownSignal;
    use mockall::predicate::*;
    use tokio::sync::mpsc;

    fn service_with(mock: MockUrlRegistry) -> (ShortenerService, mpsc::Receiver<DeleteTask>) {
        let signal = ShutdownSignal::new();
        let (tx, rx) = mpsc::channel(8);
        let service =
            ShortenerService::new(Arc::new(mock), DeletionSender::new(tx, signal.subscribe()));
        (service, rx)
    }

    #[tokio::test]
    async fn test_shorten_new_url() {
        let mut mock_registry = MockUrlRegistry::new();
        mock_registry
            .expect_store()
            .withf(|url| url.alias == "AAAAAA" && url.owner_id == "u1")
            .times(1)
            .returning(|_| Ok(()));

        let (service, _rx) = service_with(mock_registry);
        let result = service
            .shorten("https://example.com/a", "u1", "AAAAAA")
            .await
            .unwrap();

        assert!(matches!(result, Shortened::Created(_)));
        assert_eq!(result.alias(), "AAAAAA");
    }

    #[tokio::test]
    async fn test_shorten_existing_url_returns_existing_alias() {
        let mut mock_registry = MockUrlRegistry::new();
        mock_registry
            .expect_store()
            .returning(|_| Err(RegistryError::already_exists("EXISTS")));

        let (service, _rx) = service_with(mock_registry);
        let result = service
            .shorten("https://example.com/a", "", "AAAAAA")
            .await
            .unwrap();

        assert_eq!(
            result,
            Shortened::Existing {
                alias: "EXISTS".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_shorten_alias_collision_propagates() {
        let mut mock_registry = MockUrlRegistry::new();
        mock_registry
            .expect_store()
            .returning(|_| Err(RegistryError::alias_in_use("AAAAAA")));

        let (service, _rx) = service_with(mock_registry);
        let err = service
            .shorten("https://example.com/b", "", "AAAAAA")
            .await
            .unwrap_err();

        assert!(matches!(err, RegistryError::AliasInUse { .. }));
    }

    #[tokio::test]
    async fn test_shorten_batch_returns_effective_aliases_in_order() {
        let mut mock_registry = MockUrlRegistry::new();
        mock_registry
            .expect_store_batch()
            .withf(|urls| urls.len() == 2)
            .times(1)
            .returning(|_| Ok(()));
        mock_registry
            .expect_get_by_original_url()
            .withf(|url| url == "https://example.com/a")
            .returning(|url| Ok(ShortenedUrl::new("OLDONE", url, "")));
        mock_registry
            .expect_get_by_original_url()
            .withf(|url| url == "https://example.com/b")
            .returning(|url| Ok(ShortenedUrl::new("BBBBBB", url, "")));

        let (service, _rx) = service_with(mock_registry);
        let stored = service
            .shorten_batch(vec![
                ShortenedUrl::new("AAAAAA", "https://example.com/a", ""),
                ShortenedUrl::new("BBBBBB", "https://example.com/b", ""),
            ])
            .await
            .unwrap();

        let aliases: Vec<&str> = stored.iter().map(|u| u.alias.as_str()).collect();
        assert_eq!(aliases, vec!["OLDONE", "BBBBBB"]);
    }

    #[tokio::test]
    async fn test_resolve_deleted_alias_is_gone() {
        let mut mock_registry = MockUrlRegistry::new();
        mock_registry.expect_get_by_alias().returning(|alias| {
            let mut url = ShortenedUrl::new(alias, "https://example.com/a", "u1");
            url.deleted = true;
            Ok(url)
        });

        let (service, _rx) = service_with(mock_registry);

        assert_eq!(service.resolve("AAAAAA").await.unwrap(), Resolution::Gone);
    }

    #[tokio::test]
    async fn test_resolve_live_alias_redirects() {
        let mut mock_registry = MockUrlRegistry::new();
        mock_registry
            .expect_get_by_alias()
            .with(eq("AAAAAA"))
            .returning(|alias| Ok(ShortenedUrl::new(alias, "https://example.com/a", "")));

        let (service, _rx) = service_with(mock_registry);

        assert_eq!(
            service.resolve("AAAAAA").await.unwrap(),
            Resolution::Redirect("https://example.com/a".to_string())
        );
    }

    #[tokio::test]
    async fn test_request_deletion_queues_task() {
        let (service, mut rx) = service_with(MockUrlRegistry::new());

        service
            .request_deletion("u1", vec!["AAAAAA".to_string(), "BBBBBB".to_string()])
            .await
            .unwrap();

        let task = rx.recv().await.unwrap();
        assert_eq!(task.owner_id, "u1");
        assert_eq!(task.aliases, vec!["AAAAAA", "BBBBBB"]);
    }
}
