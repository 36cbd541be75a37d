//! Peptrack Enrichment Pipeline
//!
//! Queries public evidence sources for catalog peptides and vendors, grades
//! what comes back, and writes generated content through a `CatalogStore`:
//! - Source adapters behind a rate-limited, retrying fetch executor
//! - Evidence grading and content synthesis
//! - Community sentiment and vendor trust scoring
//! - The run orchestrator

pub mod adapters;
pub mod bundle;
pub mod errors;
pub mod fetch;
pub mod grading;
pub mod orchestrator;
pub mod sentiment;
pub mod synthesis;
pub mod vendor_trust;

pub use adapters::{AdapterSet, EntityQuery, SourceAdapter, SourceRecord};
pub use bundle::SourceBundle;
pub use errors::{EntityError, FetchFailure};
pub use fetch::FetchExecutor;
pub use orchestrator::{Orchestrator, RunKind, RunSummary};
