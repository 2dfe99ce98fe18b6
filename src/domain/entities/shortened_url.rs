//! Shortened URL entity representing an alias → original URL mapping.

/// A stored mapping between a short alias and the original URL.
///
/// The alias is the primary key and never changes once assigned. Deleted entries
/// keep their mapping so that historical redirects resolve to a "gone" state
/// instead of disappearing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShortenedUrl {
    pub alias: String,
    pub original_url: String,
    /// Opaque owner identifier. Empty for anonymous writes.
    pub owner_id: String,
    pub deleted: bool,
}

impl ShortenedUrl {
    /// Creates a new live (not deleted) entry.
    pub fn new(
        alias: impl Into<String>,
        original_url: impl Into<String>,
        owner_id: impl Into<String>,
    ) -> Self {
        Self {
            alias: alias.into(),
            original_url: original_url.into(),
            owner_id: owner_id.into(),
            deleted: false,
        }
    }

    /// Returns true if the entry was written without an owner.
    pub fn is_anonymous(&self) -> bool {
        self.owner_id.is_empty()
    }

    /// Returns true if `owner_id` owns this entry. Anonymous entries have no owner.
    pub fn is_owned_by(&self, owner_id: &str) -> bool {
        !owner_id.is_empty() && self.owner_id == owner_id
    }
}

/// Aggregate registry counters used for telemetry.
///
/// `urls` counts every stored entry, tombstones included. `owners` counts
/// distinct non-empty owner IDs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegistryCounts {
    pub urls: usize,
    pub owners: usize,
}
