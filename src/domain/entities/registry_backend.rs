//! Storage backend selection.

use std::fmt;
use std::path::PathBuf;

/// The storage mode a registry runs in. Chosen once at startup and fixed for the
/// registry's lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryBackend {
    /// Non-durable in-process map.
    Memory,
    /// In-process map backed by an append-only JSON-lines log.
    File { path: PathBuf },
    /// PostgreSQL table with a unique constraint on the original URL.
    Sql { database_url: String },
}

impl fmt::Display for RegistryBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Memory => write!(f, "memory"),
            Self::File { path } => write!(f, "file ({})", path.display()),
            Self::Sql { .. } => write!(f, "postgres"),
        }
    }
}
