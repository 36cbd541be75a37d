//! Peptrack Common Library
//!
//! Shared code for the Peptrack enrichment pipeline and gateway including:
//! - Catalog domain types (evidence grades, provenance, slugs, placeholders)
//! - Database models and the Postgres repository
//! - The `CatalogStore` interface and an in-memory store
//! - Error types and handling
//! - Configuration management
//! - Lookup caches
//! - Metrics and observability

pub mod cache;
pub mod catalog;
pub mod config;
pub mod db;
pub mod errors;
pub mod metrics;
pub mod store;

// Re-export commonly used types
pub use catalog::{ClaimSection, ContentOrigin, EvidenceGrade, EvidenceSource};
pub use config::AppConfig;
pub use db::Repository;
pub use errors::{AppError, Result};
pub use store::{CatalogStore, MemoryStore};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Jurisdiction code assumed when none is configured
pub const DEFAULT_JURISDICTION: &str = "US";
