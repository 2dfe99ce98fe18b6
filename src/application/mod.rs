//! Application layer services implementing business logic.
//!
//! Services consume the [`UrlRegistry`](crate::domain::repositories::UrlRegistry)
//! trait and the deletion pipeline sender, and give the external request layer
//! a small API that does not depend on the storage backend.
//!
//! # Available Services
//!
//! - [`services::shortener_service::ShortenerService`] - Shortening, resolution and deletion requests

pub mod services;
