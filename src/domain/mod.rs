//! Domain layer containing business entities and logic.
//!
//! # Architecture
//!
//! - [`entities`] - Core business data structures
//! - [`repositories`] - The storage-agnostic registry contract
//! - [`deletion`] - Asynchronous batched deletion pipeline
//!
//! # Design Principles
//!
//! - Domain layer has no dependencies on infrastructure
//! - The registry trait defines the contract implemented by the infrastructure layer
//! - All state lives in explicit instances passed to collaborators
//!
//! # Deletion Flow
//!
//! 1. A caller submits a [`entities::DeleteTask`] through [`deletion::DeletionSender`]
//! 2. The dispatcher splits it into [`entities::DeleteItem`]s spread over the workers
//! 3. Worker output is merged into the coordinator's batch
//! 4. The batch is flushed via [`repositories::UrlRegistry::delete_batch`] on every tick
//!    and once more on shutdown

pub mod deletion;
pub mod entities;
pub mod repositories;
