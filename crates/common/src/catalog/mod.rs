//! Catalog domain types shared by the pipeline, the stores and the gateway
//!
//! Provides:
//! - Evidence grades and their total order
//! - Content provenance (curated vs machine-generated) and claim sections
//! - Slug, alias and text helpers
//! - Placeholder detection and the curated-field precedence rule

mod grade;
mod provenance;
mod text;

pub use grade::EvidenceGrade;
pub use provenance::{
    AssertedBy, ClaimSection, ContentOrigin, DosingContext, EntityKind, EntityRef,
    EvidenceSource, RegulatoryStatus,
};
pub use text::{
    is_placeholder, merge_field, normalize_alias, placeholder, slugify, truncate_chars,
    FieldMerge, PLACEHOLDER_MARKER,
};
