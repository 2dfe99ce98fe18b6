//! In-process bidirectional alias ↔ original URL index.
//!
//! Shared by the memory and file registries. The index is not synchronised on
//! its own; callers hold it behind a single lock so that the dedup check and the
//! insert are atomic.

use std::collections::{HashMap, HashSet};

use crate::domain::entities::{RegistryCounts, ShortenedUrl};
use crate::error::RegistryError;

/// Entries in insertion order plus lookup maps by alias and original URL.
///
/// Entries are never removed, so positions stay valid for the index lifetime.
#[derive(Debug, Default)]
pub struct DedupIndex {
    entries: Vec<ShortenedUrl>,
    by_alias: HashMap<String, usize>,
    by_url: HashMap<String, usize>,
}

impl DedupIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Checks whether `url` may be inserted.
    ///
    /// # Errors
    ///
    /// - [`RegistryError::AlreadyExists`] with the existing alias if the original URL is taken
    /// - [`RegistryError::AliasInUse`] if the alias is bound to another URL
    pub fn check(&self, url: &ShortenedUrl) -> Result<(), RegistryError> {
        if let Some(&pos) = self.by_url.get(&url.original_url) {
            return Err(RegistryError::already_exists(&self.entries[pos].alias));
        }
        if self.by_alias.contains_key(&url.alias) {
            return Err(RegistryError::alias_in_use(&url.alias));
        }
        Ok(())
    }

    /// Inserts an entry that already passed [`DedupIndex::check`].
    pub fn insert(&mut self, url: ShortenedUrl) {
        let pos = self.entries.len();
        self.by_alias.insert(url.alias.clone(), pos);
        self.by_url.insert(url.original_url.clone(), pos);
        self.entries.push(url);
    }

    /// Inserts or replaces the entry for `url.alias`.
    ///
    /// Used by log replay, where the last record for an alias wins.
    pub fn upsert(&mut self, url: ShortenedUrl) {
        match self.by_alias.get(&url.alias).copied() {
            Some(pos) => {
                let previous = &self.entries[pos];
                if previous.original_url != url.original_url
                    && self.by_url.get(&previous.original_url) == Some(&pos)
                {
                    self.by_url.remove(&previous.original_url);
                }
                self.by_url.insert(url.original_url.clone(), pos);
                self.entries[pos] = url;
            }
            None => self.insert(url),
        }
    }

    pub fn get_by_alias(&self, alias: &str) -> Option<&ShortenedUrl> {
        self.by_alias.get(alias).map(|&pos| &self.entries[pos])
    }

    pub fn get_by_original_url(&self, original_url: &str) -> Option<&ShortenedUrl> {
        self.by_url.get(original_url).map(|&pos| &self.entries[pos])
    }

    pub fn list_by_owner(&self, owner_id: &str) -> Vec<ShortenedUrl> {
        self.entries
            .iter()
            .filter(|e| e.is_owned_by(owner_id))
            .cloned()
            .collect()
    }

    /// Returns the live entries among `aliases` owned by `owner_id`, without
    /// modifying anything. Duplicated aliases are reported once.
    pub fn deletable(&self, owner_id: &str, aliases: &[String]) -> Vec<ShortenedUrl> {
        let mut seen = HashSet::new();
        aliases
            .iter()
            .filter(|alias| seen.insert(alias.as_str()))
            .filter_map(|alias| self.get_by_alias(alias))
            .filter(|e| e.is_owned_by(owner_id) && !e.deleted)
            .cloned()
            .collect()
    }

    /// Flags the given alias as deleted. Returns false if it is unknown.
    pub fn mark_deleted(&mut self, alias: &str) -> bool {
        match self.by_alias.get(alias) {
            Some(&pos) => {
                self.entries[pos].deleted = true;
                true
            }
            None => false,
        }
    }

    pub fn counts(&self) -> RegistryCounts {
        let owners: HashSet<&str> = self
            .entries
            .iter()
            .filter(|e| !e.is_anonymous())
            .map(|e| e.owner_id.as_str())
            .collect();

        RegistryCounts {
            urls: self.entries.len(),
            owners: owners.len(),
        }
    }
}
