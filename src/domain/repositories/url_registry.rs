//! Storage-agnostic contract for the alias ↔ original URL registry.

use crate::domain::entities::{RegistryCounts, ShortenedUrl};
use crate::error::RegistryError;
use async_trait::async_trait;

/// Registry of shortened URLs, implemented identically by every backend.
///
/// Every implementation enforces the dedup invariant: at most one alias per
/// distinct original URL. Concurrent stores racing on the same original URL
/// produce exactly one success; the others observe
/// [`RegistryError::AlreadyExists`] naming the winning alias.
///
/// # Implementations
///
/// - [`crate::infrastructure::persistence::MemoryRegistry`] - non-durable map
/// - [`crate::infrastructure::persistence::FileRegistry`] - append-only log with replay
/// - [`crate::infrastructure::persistence::PgRegistry`] - PostgreSQL table
/// - Test mocks available with `cfg(test)`
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UrlRegistry: Send + Sync {
    /// Stores a single entry.
    ///
    /// The entry is durable (appended or committed) before `Ok` is returned.
    ///
    /// # Errors
    ///
    /// - [`RegistryError::AlreadyExists`] if the original URL is already stored
    /// - [`RegistryError::AliasInUse`] if the alias maps to another URL
    /// - I/O or database errors, unchanged
    async fn store(&self, url: ShortenedUrl) -> Result<(), RegistryError>;

    /// Stores each entry independently.
    ///
    /// Entries whose original URL (or alias) is already taken are skipped
    /// silently; callers resolve them afterwards with
    /// [`UrlRegistry::get_by_original_url`].
    async fn store_batch(&self, urls: Vec<ShortenedUrl>) -> Result<(), RegistryError>;

    /// Looks up an entry by alias. Tombstoned entries are returned with
    /// `deleted = true`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] if the alias was never stored.
    async fn get_by_alias(&self, alias: &str) -> Result<ShortenedUrl, RegistryError>;

    /// Looks up the entry holding `original_url`, deleted or not.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] if no entry has that original URL.
    async fn get_by_original_url(&self, original_url: &str)
    -> Result<ShortenedUrl, RegistryError>;

    /// Lists every entry written by `owner_id`, in insertion order.
    ///
    /// An unknown or anonymous owner yields an empty list, not an error.
    async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<ShortenedUrl>, RegistryError>;

    /// Soft-deletes the given aliases owned by `owner_id`.
    ///
    /// Idempotent. Aliases that are unknown or owned by someone else are ignored.
    async fn delete_batch(&self, owner_id: &str, aliases: &[String])
    -> Result<(), RegistryError>;

    /// Returns stored entry and owner counts.
    async fn count(&self) -> Result<RegistryCounts, RegistryError>;

    /// Checks that the backing resource is reachable.
    async fn ping(&self) -> Result<(), RegistryError>;

    /// Releases the backing resource. Must run after the final deletion flush.
    async fn close(&self) -> Result<(), RegistryError>;
}
