//! Core domain entities representing the business data model.
//!
//! Entities are plain data structures without storage concerns.
//!
//! # Entity Types
//!
//! - [`ShortenedUrl`] - An alias → original URL mapping with its owner and tombstone flag
//! - [`DeleteTask`] / [`DeleteItem`] - Deletion intents consumed by the deletion pipeline
//! - [`RegistryCounts`] - Aggregate counters reported by a registry
//! - [`RegistryBackend`] - The storage mode selected at startup

pub mod delete_task;
pub mod registry_backend;
pub mod shortened_url;

pub use delete_task::{DeleteItem, DeleteTask};
pub use registry_backend::RegistryBackend;
pub use shortened_url::{RegistryCounts, ShortenedUrl};
