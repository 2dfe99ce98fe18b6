//! Registry implementations.
//!
//! # Registries
//!
//! - [`MemoryRegistry`] - Non-durable, single-lock in-process map
//! - [`FileRegistry`] - In-process map plus an append-only JSON-lines log replayed at startup
//! - [`PgRegistry`] - PostgreSQL table with constraint-based dedup
//!
//! The memory and file registries share [`DedupIndex`] for the alias ↔ URL
//! uniqueness invariant; the PostgreSQL registry relies on a unique constraint.

pub mod dedup_index;
pub mod file_registry;
pub mod log_record;
pub mod memory_registry;
pub mod pg_registry;

pub use dedup_index::DedupIndex;
pub use file_registry::FileRegistry;
pub use log_record::LogRecord;
pub use memory_registry::MemoryRegistry;
pub use pg_registry::{PgPoolSettings, PgRegistry};

use std::sync::Arc;

use crate::domain::entities::RegistryBackend;
use crate::domain::repositories::UrlRegistry;
use crate::error::RegistryError;

/// Opens the registry for the selected backend.
///
/// The file backend is fully replayed and the database schema bootstrapped
/// before this returns.
pub async fn open_registry(
    backend: &RegistryBackend,
    pg_settings: &PgPoolSettings,
) -> Result<Arc<dyn UrlRegistry>, RegistryError> {
    let registry: Arc<dyn UrlRegistry> = match backend {
        RegistryBackend::Memory => Arc::new(MemoryRegistry::new()),
        RegistryBackend::File { path } => Arc::new(FileRegistry::open(path.clone()).await?),
        RegistryBackend::Sql { database_url } => {
            Arc::new(PgRegistry::connect(database_url, pg_settings).await?)
        }
    };

    tracing::info!("Registry backend: {}", backend);
    Ok(registry)
}
