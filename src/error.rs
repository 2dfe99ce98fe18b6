//! Error types shared by the registry backends and the deletion pipeline.

use thiserror::Error;

/// Errors returned by [`crate::domain::repositories::UrlRegistry`] implementations.
///
/// Backend-native failures are classified into this taxonomy before they reach
/// the caller. The registry never retries internally.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// No entry exists for the requested alias or original URL.
    #[error("not found: {key}")]
    NotFound { key: String },

    /// The original URL is already shortened. Carries the existing alias so the
    /// caller can respond without another lookup.
    #[error("url already shortened as {alias}")]
    AlreadyExists { alias: String },

    /// The alias is already bound to a different original URL.
    #[error("alias {alias} is already in use")]
    AliasInUse { alias: String },

    /// The registry has been closed and refuses further writes.
    #[error("registry is closed")]
    Closed,

    /// A line of the append-only log could not be decoded during replay.
    #[error("corrupt storage log at line {line}: {source}")]
    CorruptLog {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("storage i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl RegistryError {
    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound { key: key.into() }
    }

    pub fn already_exists(alias: impl Into<String>) -> Self {
        Self::AlreadyExists {
            alias: alias.into(),
        }
    }

    pub fn alias_in_use(alias: impl Into<String>) -> Self {
        Self::AliasInUse {
            alias: alias.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns true for dedup violations that batch stores skip silently.
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. } | Self::AliasInUse { .. })
    }
}

/// Errors returned by the deletion pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The pipeline is shutting down and no longer accepts tasks.
    #[error("deletion pipeline is closed")]
    Closed,

    #[error("deletion pipeline stage failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}
