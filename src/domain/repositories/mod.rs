//! Repository trait definitions for the domain layer.
//!
//! # Architecture
//!
//! - Traits define the contract for data operations
//! - Implementations live in `crate::infrastructure::persistence`
//! - Mock implementations are auto-generated via `mockall` for testing
//!
//! # Testing
//!
//! See integration tests in `tests/registry_*.rs` for usage examples.

pub mod url_registry;

pub use url_registry::UrlRegistry;

#[cfg(test)]
pub use url_registry::MockUrlRegistry;
