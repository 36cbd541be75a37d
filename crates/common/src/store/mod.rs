//! Catalog store interface
//!
//! The narrow persistence boundary used by the enrichment pipeline and the
//! gateway read path. Every write is idempotent and reports what it did:
//!
//! - machine writes never touch rows owned by curators
//! - safety fields follow the placeholder precedence rule
//! - claim replacement is scoped to generated sections and is all-or-nothing
//! - citations are deduplicated by `(url, published_on)`
//! - rating snapshots flip the previous current row before inserting a new one

mod memory;

pub use memory::{MemoryStore, RowCounts};

use crate::catalog::{
    merge_field, ClaimSection, DosingContext, EntityRef, EvidenceGrade, EvidenceSource,
    FieldMerge, RegulatoryStatus,
};
use crate::errors::Result;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// What a write did to the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteOutcome {
    Inserted,
    Updated,
    Unchanged,
    /// The target row is curator-owned and was left alone
    PreservedCurated,
}

impl WriteOutcome {
    pub fn changed(&self) -> bool {
        matches!(self, WriteOutcome::Inserted | WriteOutcome::Updated)
    }
}

/// Which entities a run should visit
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TargetSelector {
    /// Maximum number of entities, `None` for all
    pub limit: Option<usize>,
    /// Restrict to these slugs; empty means no restriction
    pub slugs: Vec<String>,
}

impl TargetSelector {
    pub fn limit(limit: usize) -> Self {
        Self {
            limit: Some(limit),
            slugs: Vec::new(),
        }
    }

    pub fn slugs<I, S>(slugs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            limit: None,
            slugs: slugs.into_iter().map(Into::into).collect(),
        }
    }

    pub fn matches(&self, slug: &str) -> bool {
        self.slugs.is_empty() || self.slugs.iter().any(|s| s == slug)
    }
}

// ============================================================================
// Targets
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeptideTarget {
    pub id: i64,
    pub slug: String,
    pub name: String,
    pub class_name: Option<String>,
    pub aliases: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VendorTarget {
    pub id: i64,
    pub slug: String,
    pub name: String,
    pub domain: Option<String>,
    /// Declared trust signal names
    pub trust_signals: Vec<String>,
    pub listing_count: u32,
}

// ============================================================================
// Write records
// ============================================================================

/// Generated profile text for one peptide
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileRecord {
    pub peptide_id: i64,
    pub intro: String,
    pub mechanism: String,
    pub effectiveness: String,
    pub long_description: String,
}

/// Generated safety quadruple for one (peptide, jurisdiction)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SafetyRecord {
    pub peptide_id: i64,
    pub jurisdiction_id: i64,
    pub adverse_effects: String,
    pub contraindications: String,
    pub interactions: String,
    pub monitoring: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DosingRecord {
    pub peptide_id: i64,
    pub jurisdiction_id: i64,
    pub context: DosingContext,
    pub guidance: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UseCaseMappingRecord {
    pub peptide_id: i64,
    pub use_case_id: i64,
    pub jurisdiction_id: i64,
    pub grade: EvidenceGrade,
    pub consumer_summary: String,
    pub clinician_summary: String,
}

/// Machine-proposed regulatory status
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegulatoryProposal {
    pub peptide_id: i64,
    pub jurisdiction_id: i64,
    pub status: RegulatoryStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CitationInput {
    pub url: String,
    pub title: Option<String>,
    pub published_on: Option<NaiveDate>,
}

/// Resolved citation row id
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CitationRef {
    pub id: i64,
    pub created: bool,
}

/// Generated claim; the section type only admits machine sources
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimRecord {
    pub section: EvidenceSource,
    pub text: String,
    pub grade: EvidenceGrade,
    pub citation_id: Option<i64>,
}

/// New vendor rating to record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingSnapshotInput {
    pub vendor_id: i64,
    pub rating: Option<f64>,
    pub confidence: Option<f64>,
    pub method_version: String,
    pub reason_tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingSnapshot {
    pub id: i64,
    pub vendor_id: i64,
    pub rating: Option<f64>,
    pub confidence: Option<f64>,
    pub method_version: String,
    pub reason_tags: Vec<String>,
    pub is_current: bool,
    pub created_at: DateTime<Utc>,
}

impl RatingSnapshot {
    /// Same score, method and reasons as a proposed snapshot
    pub fn same_as(&self, input: &RatingSnapshotInput) -> bool {
        self.vendor_id == input.vendor_id
            && same_score(self.rating, input.rating)
            && same_score(self.confidence, input.confidence)
            && self.method_version == input.method_version
            && self.reason_tags == input.reason_tags
    }
}

fn same_score(a: Option<f64>, b: Option<f64>) -> bool {
    match (a, b) {
        (Some(x), Some(y)) => (x - y).abs() < 1e-9,
        (None, None) => true,
        _ => false,
    }
}

// ============================================================================
// Read views
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileView {
    pub intro: String,
    pub mechanism: String,
    pub effectiveness: String,
    pub long_description: String,
    pub origin: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DosingView {
    pub jurisdiction: String,
    pub context: String,
    pub guidance: String,
    pub origin: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SafetyView {
    pub jurisdiction: String,
    pub adverse_effects: String,
    pub contraindications: String,
    pub interactions: String,
    pub monitoring: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UseCaseView {
    pub use_case: String,
    pub jurisdiction: String,
    pub grade: EvidenceGrade,
    pub consumer_summary: String,
    pub clinician_summary: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegulatoryView {
    pub jurisdiction: String,
    pub status: String,
    pub asserted_by: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CitationView {
    pub url: String,
    pub title: Option<String>,
    pub published_on: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimView {
    pub section: ClaimSection,
    pub text: String,
    pub grade: EvidenceGrade,
    pub citation: Option<CitationView>,
}

/// Published peptide with everything the presentation layer renders
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeptideView {
    pub slug: String,
    pub name: String,
    pub class_name: Option<String>,
    pub aliases: Vec<String>,
    pub profile: Option<ProfileView>,
    pub dosing: Vec<DosingView>,
    pub safety: Vec<SafetyView>,
    pub use_cases: Vec<UseCaseView>,
    pub regulatory: Vec<RegulatoryView>,
    pub claims: Vec<ClaimView>,
    /// Best grade across use-case mappings
    pub best_grade: EvidenceGrade,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VendorView {
    pub slug: String,
    pub name: String,
    pub domain: Option<String>,
    pub rating: Option<RatingSnapshot>,
    pub claims: Vec<ClaimView>,
}

// ============================================================================
// Store trait
// ============================================================================

/// Persistence interface for catalog enrichment
#[async_trait]
pub trait CatalogStore: Send + Sync {
    // Targets
    async fn list_peptide_targets(&self, selector: &TargetSelector) -> Result<Vec<PeptideTarget>>;

    async fn list_vendor_targets(&self, selector: &TargetSelector) -> Result<Vec<VendorTarget>>;

    // Reference data
    /// Jurisdiction code to id
    async fn jurisdiction_ids(&self) -> Result<HashMap<String, i64>>;

    /// Use-case slug to id
    async fn use_case_ids(&self) -> Result<HashMap<String, i64>>;

    // Peptide content
    async fn upsert_profile(&self, record: &ProfileRecord) -> Result<WriteOutcome>;

    /// Field-wise merge; curated fields are kept
    async fn upsert_safety(&self, record: &SafetyRecord) -> Result<WriteOutcome>;

    async fn upsert_dosing(&self, record: &DosingRecord) -> Result<WriteOutcome>;

    async fn upsert_use_case_mapping(&self, record: &UseCaseMappingRecord) -> Result<WriteOutcome>;

    async fn upsert_regulatory_status(&self, proposal: &RegulatoryProposal) -> Result<WriteOutcome>;

    // Claims and citations
    /// Look up by exact `(url, published_on)`, inserting on miss
    async fn find_or_create_citation(&self, input: &CitationInput) -> Result<CitationRef>;

    /// Replace the generated claims of `entity` in `sections` with `claims`.
    ///
    /// Every claim must belong to one of `sections`. Leaves curated claims and
    /// other sources untouched; no-op when the stored set already matches.
    async fn replace_generated_claims(
        &self,
        entity: EntityRef,
        sections: &[EvidenceSource],
        claims: Vec<ClaimRecord>,
    ) -> Result<WriteOutcome>;

    // Vendor ratings
    async fn current_rating(&self, vendor_id: i64) -> Result<Option<RatingSnapshot>>;

    /// Flip the current snapshot and insert the new one; skipped when identical
    async fn record_rating_snapshot(&self, input: &RatingSnapshotInput) -> Result<WriteOutcome>;

    // Read path
    async fn peptide_view(&self, slug: &str) -> Result<Option<PeptideView>>;

    async fn vendor_view(&self, slug: &str) -> Result<Option<VendorView>>;

    async fn ping(&self) -> Result<()>;
}

/// Reject claims outside the sections being replaced
pub(crate) fn check_claim_sections(
    sections: &[EvidenceSource],
    claims: &[ClaimRecord],
) -> Result<()> {
    match claims.iter().find(|c| !sections.contains(&c.section)) {
        Some(stray) => Err(crate::errors::AppError::Validation {
            message: format!(
                "claim section '{}' is not among the sections being replaced",
                stray.section.section_tag()
            ),
            field: Some("section".to_string()),
        }),
        None => Ok(()),
    }
}

/// Bit per safety field, in merge order, set when a machine write produced it
pub const SAFETY_FIELDS_GENERATED: i16 = 0b1111;

/// Result of merging generated safety text into a stored row
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SafetyMerge {
    pub fields: [String; 4],
    pub generated_mask: i16,
    pub outcome: WriteOutcome,
}

/// Merge generated safety text into stored fields, in the order adverse effects,
/// contraindications, interactions, monitoring. `generated_mask` marks the stored
/// fields a previous machine write produced; every other non-empty field is curated.
pub(crate) fn merge_safety_fields(
    existing: [&str; 4],
    generated_mask: i16,
    generated: [&str; 4],
) -> SafetyMerge {
    let mut mask = generated_mask;
    let mut replaced = false;
    let mut preserved = false;
    let fields = std::array::from_fn(|i| {
        let bit = 1i16 << i;
        match merge_field(Some(existing[i]), generated[i], generated_mask & bit != 0) {
            FieldMerge::Replace(value) => {
                replaced = true;
                mask |= bit;
                value
            }
            FieldMerge::Keep => {
                if existing[i] != generated[i] {
                    preserved = true;
                }
                existing[i].to_string()
            }
        }
    });

    let outcome = if replaced {
        WriteOutcome::Updated
    } else if preserved {
        WriteOutcome::PreservedCurated
    } else {
        WriteOutcome::Unchanged
    };
    SafetyMerge {
        fields,
        generated_mask: mask,
        outcome,
    }
}

/// Order-insensitive comparison key for a claim set
pub(crate) fn claim_key(
    section: &str,
    text: &str,
    grade: &str,
    citation_id: Option<i64>,
) -> (String, String, String, Option<i64>) {
    (section.to_string(), text.to_string(), grade.to_string(), citation_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_outcome_changed() {
        assert!(WriteOutcome::Inserted.changed());
        assert!(WriteOutcome::Updated.changed());
        assert!(!WriteOutcome::Unchanged.changed());
        assert!(!WriteOutcome::PreservedCurated.changed());
    }

    #[test]
    fn test_selector_matches() {
        assert!(TargetSelector::default().matches("anything"));
        let selector = TargetSelector::slugs(["bpc-157"]);
        assert!(selector.matches("bpc-157"));
        assert!(!selector.matches("semaglutide"));
    }

    #[test]
    fn test_stray_claim_section_rejected() {
        let claims = vec![ClaimRecord {
            section: EvidenceSource::Reddit,
            text: "x".to_string(),
            grade: EvidenceGrade::D,
            citation_id: None,
        }];
        assert!(check_claim_sections(&[EvidenceSource::PubMed], &claims).is_err());
        assert!(check_claim_sections(&[EvidenceSource::Reddit], &claims).is_ok());
    }

    #[test]
    fn test_snapshot_same_as() {
        let stored = RatingSnapshot {
            id: 1,
            vendor_id: 7,
            rating: Some(3.5),
            confidence: Some(0.51),
            method_version: "trust-v2".to_string(),
            reason_tags: vec!["signals:2".to_string()],
            is_current: true,
            created_at: Utc::now(),
        };
        let mut input = RatingSnapshotInput {
            vendor_id: 7,
            rating: Some(3.5),
            confidence: Some(0.51),
            method_version: "trust-v2".to_string(),
            reason_tags: vec!["signals:2".to_string()],
        };
        assert!(stored.same_as(&input));
        input.rating = None;
        assert!(!stored.same_as(&input));
    }

    #[test]
    fn test_safety_merge_tracks_generated_fields() {
        // Adverse effects came from the label, the rest were written by a curator
        let merge = merge_safety_fields(
            ["Nausea (label v1).", "Curated contra.", "", "Curated monitoring."],
            0b0001,
            ["Nausea, vomiting (label v2).", "Label contra.", "Label interactions.", "Label monitoring."],
        );
        assert_eq!(merge.outcome, WriteOutcome::Updated);
        assert_eq!(merge.fields[0], "Nausea, vomiting (label v2).");
        assert_eq!(merge.fields[1], "Curated contra.");
        assert_eq!(merge.fields[2], "Label interactions.");
        assert_eq!(merge.fields[3], "Curated monitoring.");
        assert_eq!(merge.generated_mask, 0b0101);
    }
}
