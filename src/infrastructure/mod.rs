//! Infrastructure layer for external integrations.
//!
//! This layer implements the registry contract defined by the domain layer.
//!
//! # Modules
//!
//! - [`persistence`] - Memory, append-only file and PostgreSQL registries

pub mod persistence;
