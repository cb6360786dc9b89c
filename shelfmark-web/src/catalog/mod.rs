//! External catalog integration
//!
//! The catalog is a read-only HTTP collaborator, treated as untrusted,
//! slow, and rate-limited. `CatalogClient` talks to it; `CatalogCache`
//! is the two-tier read-through cache in front of its detail records;
//! `prefetch` is the bounded bulk warmer used outside the import path.

pub mod cache;
pub mod client;
pub mod prefetch;
pub mod types;

pub use cache::CatalogCache;
pub use client::{CatalogClient, CatalogError, CatalogLookup};
pub use types::BookDetail;
