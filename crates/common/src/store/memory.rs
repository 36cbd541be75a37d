//! In-process `CatalogStore`
//!
//! Holds every table in one mutex-guarded state so each trait call is atomic.
//! Used by tests, by orchestrator dry-runs, and anywhere a Postgres instance is
//! not available. Seeding and inspection helpers are inherent methods.

use super::{
    check_claim_sections, claim_key, merge_safety_fields, CatalogStore, CitationInput,
    CitationRef, CitationView, ClaimRecord, ClaimView, DosingRecord, DosingView, PeptideTarget,
    PeptideView, ProfileRecord, ProfileView, RatingSnapshot, RatingSnapshotInput,
    RegulatoryProposal, RegulatoryView, SafetyRecord, SafetyView, TargetSelector,
    UseCaseMappingRecord, UseCaseView, VendorTarget, VendorView, WriteOutcome,
    SAFETY_FIELDS_GENERATED,
};
use crate::catalog::{
    normalize_alias, slugify, AssertedBy, ClaimSection, ContentOrigin, EntityRef, EvidenceGrade,
    EvidenceSource, RegulatoryStatus,
};
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashMap, HashSet};
use tokio::sync::Mutex;

#[derive(Debug, Clone)]
struct PeptideRow {
    slug: String,
    name: String,
    class_name: Option<String>,
    aliases: Vec<String>,
    published: bool,
}

#[derive(Debug, Clone)]
struct VendorRow {
    slug: String,
    name: String,
    domain: Option<String>,
    trust_signals: Vec<String>,
    listing_count: u32,
    published: bool,
}

#[derive(Debug, Clone)]
struct ProfileRow {
    record: ProfileRecord,
    origin: ContentOrigin,
}

#[derive(Debug, Clone)]
struct SafetyRow {
    record: SafetyRecord,
    generated_mask: i16,
}

#[derive(Debug, Clone)]
struct DosingRow {
    id: i64,
    record: DosingRecord,
    origin: ContentOrigin,
}

#[derive(Debug, Clone)]
struct MappingRow {
    record: UseCaseMappingRecord,
    origin: ContentOrigin,
}

#[derive(Debug, Clone)]
struct RegulatoryRow {
    status: RegulatoryStatus,
    asserted_by: AssertedBy,
}

#[derive(Debug, Clone)]
struct CitationRow {
    id: i64,
    url: String,
    title: Option<String>,
    published_on: Option<NaiveDate>,
}

#[derive(Debug, Clone)]
struct ClaimRow {
    id: i64,
    entity: EntityRef,
    section: ClaimSection,
    text: String,
    grade: EvidenceGrade,
    citation_id: Option<i64>,
}

#[derive(Default)]
struct State {
    next_id: i64,
    peptides: BTreeMap<i64, PeptideRow>,
    vendors: BTreeMap<i64, VendorRow>,
    jurisdictions: BTreeMap<i64, String>,
    use_cases: BTreeMap<i64, String>,
    profiles: HashMap<i64, ProfileRow>,
    safety: BTreeMap<(i64, i64), SafetyRow>,
    dosing: Vec<DosingRow>,
    mappings: BTreeMap<(i64, i64, i64), MappingRow>,
    regulatory: BTreeMap<(i64, i64), RegulatoryRow>,
    citations: Vec<CitationRow>,
    claims: Vec<ClaimRow>,
    snapshots: Vec<RatingSnapshot>,
    failing_peptides: HashSet<i64>,
}

impl State {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn jurisdiction_code(&self, id: i64) -> String {
        self.jurisdictions.get(&id).cloned().unwrap_or_default()
    }

    fn claim_views(&self, entity: EntityRef) -> Vec<ClaimView> {
        self.claims
            .iter()
            .filter(|c| c.entity == entity)
            .map(|c| ClaimView {
                section: c.section.clone(),
                text: c.text.clone(),
                grade: c.grade,
                citation: c
                    .citation_id
                    .and_then(|id| self.citations.iter().find(|cit| cit.id == id))
                    .map(|cit| CitationView {
                        url: cit.url.clone(),
                        title: cit.title.clone(),
                        published_on: cit.published_on,
                    }),
            })
            .collect()
    }

    fn check_writable(&self, peptide_id: i64) -> Result<()> {
        if self.failing_peptides.contains(&peptide_id) {
            return Err(AppError::DatabaseConnection {
                message: format!("injected write failure for peptide {}", peptide_id),
            });
        }
        Ok(())
    }
}

/// Row counts per table, for idempotence checks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RowCounts {
    pub profiles: usize,
    pub safety: usize,
    pub dosing: usize,
    pub use_case_mappings: usize,
    pub regulatory: usize,
    pub citations: usize,
    pub claims: usize,
    pub rating_snapshots: usize,
}

/// In-memory catalog store
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Seeding
    // ========================================================================

    /// Add a published peptide; the slug is derived from the name
    pub async fn add_peptide(&self, name: &str, class_name: Option<&str>, aliases: &[&str]) -> i64 {
        let mut state = self.state.lock().await;
        let id = state.next_id();
        state.peptides.insert(
            id,
            PeptideRow {
                slug: slugify(name),
                name: name.to_string(),
                class_name: class_name.map(str::to_string),
                aliases: aliases.iter().map(|a| a.to_string()).collect(),
                published: true,
            },
        );
        id
    }

    /// Add a published vendor
    pub async fn add_vendor(
        &self,
        name: &str,
        domain: Option<&str>,
        trust_signals: &[&str],
        listing_count: u32,
    ) -> i64 {
        let mut state = self.state.lock().await;
        let id = state.next_id();
        state.vendors.insert(
            id,
            VendorRow {
                slug: slugify(name),
                name: name.to_string(),
                domain: domain.map(str::to_string),
                trust_signals: trust_signals.iter().map(|s| s.to_string()).collect(),
                listing_count,
                published: true,
            },
        );
        id
    }

    pub async fn add_jurisdiction(&self, code: &str) -> i64 {
        let mut state = self.state.lock().await;
        let id = state.next_id();
        state.jurisdictions.insert(id, code.to_string());
        id
    }

    pub async fn add_use_case(&self, slug: &str) -> i64 {
        let mut state = self.state.lock().await;
        let id = state.next_id();
        state.use_cases.insert(id, slug.to_string());
        id
    }

    pub async fn set_published(&self, slug: &str, published: bool) {
        let mut state = self.state.lock().await;
        for row in state.peptides.values_mut().filter(|p| p.slug == slug) {
            row.published = published;
        }
        for row in state.vendors.values_mut().filter(|v| v.slug == slug) {
            row.published = published;
        }
    }

    /// Write a safety row directly, as a curator would
    pub async fn put_safety(&self, record: SafetyRecord) {
        let mut state = self.state.lock().await;
        state
            .safety
            .insert(
                (record.peptide_id, record.jurisdiction_id),
                SafetyRow {
                    record,
                    generated_mask: 0,
                },
            );
    }

    pub async fn put_curated_profile(&self, record: ProfileRecord) {
        let mut state = self.state.lock().await;
        state.profiles.insert(
            record.peptide_id,
            ProfileRow {
                record,
                origin: ContentOrigin::Curated,
            },
        );
    }

    pub async fn put_curated_regulatory(
        &self,
        peptide_id: i64,
        jurisdiction_id: i64,
        status: RegulatoryStatus,
    ) {
        let mut state = self.state.lock().await;
        state.regulatory.insert(
            (peptide_id, jurisdiction_id),
            RegulatoryRow {
                status,
                asserted_by: AssertedBy::Curator,
            },
        );
    }

    pub async fn add_curated_claim(&self, entity: EntityRef, label: &str, text: &str) -> i64 {
        let mut state = self.state.lock().await;
        let id = state.next_id();
        state.claims.push(ClaimRow {
            id,
            entity,
            section: ClaimSection::Curated(label.to_string()),
            text: text.to_string(),
            grade: EvidenceGrade::I,
            citation_id: None,
        });
        id
    }

    /// Make every write for this peptide fail with a connection error
    pub async fn fail_writes_for(&self, peptide_id: i64) {
        self.state.lock().await.failing_peptides.insert(peptide_id);
    }

    // ========================================================================
    // Inspection
    // ========================================================================

    pub async fn row_counts(&self) -> RowCounts {
        let state = self.state.lock().await;
        RowCounts {
            profiles: state.profiles.len(),
            safety: state.safety.len(),
            dosing: state.dosing.len(),
            use_case_mappings: state.mappings.len(),
            regulatory: state.regulatory.len(),
            citations: state.citations.len(),
            claims: state.claims.len(),
            rating_snapshots: state.snapshots.len(),
        }
    }

    pub async fn claims_for(&self, entity: EntityRef) -> Vec<(ClaimSection, String)> {
        let state = self.state.lock().await;
        state
            .claims
            .iter()
            .filter(|c| c.entity == entity)
            .map(|c| (c.section.clone(), c.text.clone()))
            .collect()
    }

    pub async fn safety_for(&self, peptide_id: i64, jurisdiction_id: i64) -> Option<SafetyRecord> {
        let state = self.state.lock().await;
        state
            .safety
            .get(&(peptide_id, jurisdiction_id))
            .map(|row| row.record.clone())
    }

    pub async fn regulatory_for(
        &self,
        peptide_id: i64,
        jurisdiction_id: i64,
    ) -> Option<(RegulatoryStatus, AssertedBy)> {
        let state = self.state.lock().await;
        state
            .regulatory
            .get(&(peptide_id, jurisdiction_id))
            .map(|row| (row.status, row.asserted_by))
    }

    pub async fn snapshots_for(&self, vendor_id: i64) -> Vec<RatingSnapshot> {
        let state = self.state.lock().await;
        state
            .snapshots
            .iter()
            .filter(|s| s.vendor_id == vendor_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn list_peptide_targets(&self, selector: &TargetSelector) -> Result<Vec<PeptideTarget>> {
        let state = self.state.lock().await;
        let targets = state
            .peptides
            .iter()
            .filter(|(_, p)| selector.matches(&p.slug))
            .map(|(id, p)| {
                let mut seen = HashSet::new();
                let aliases = p
                    .aliases
                    .iter()
                    .filter(|a| seen.insert(normalize_alias(a)))
                    .cloned()
                    .collect();
                PeptideTarget {
                    id: *id,
                    slug: p.slug.clone(),
                    name: p.name.clone(),
                    class_name: p.class_name.clone(),
                    aliases,
                }
            })
            .take(selector.limit.unwrap_or(usize::MAX))
            .collect();
        Ok(targets)
    }

    async fn list_vendor_targets(&self, selector: &TargetSelector) -> Result<Vec<VendorTarget>> {
        let state = self.state.lock().await;
        let targets = state
            .vendors
            .iter()
            .filter(|(_, v)| selector.matches(&v.slug))
            .map(|(id, v)| VendorTarget {
                id: *id,
                slug: v.slug.clone(),
                name: v.name.clone(),
                domain: v.domain.clone(),
                trust_signals: v.trust_signals.clone(),
                listing_count: v.listing_count,
            })
            .take(selector.limit.unwrap_or(usize::MAX))
            .collect();
        Ok(targets)
    }

    async fn jurisdiction_ids(&self) -> Result<HashMap<String, i64>> {
        let state = self.state.lock().await;
        Ok(state
            .jurisdictions
            .iter()
            .map(|(id, code)| (code.clone(), *id))
            .collect())
    }

    async fn use_case_ids(&self) -> Result<HashMap<String, i64>> {
        let state = self.state.lock().await;
        Ok(state
            .use_cases
            .iter()
            .map(|(id, slug)| (slug.clone(), *id))
            .collect())
    }

    async fn upsert_profile(&self, record: &ProfileRecord) -> Result<WriteOutcome> {
        let mut state = self.state.lock().await;
        state.check_writable(record.peptide_id)?;

        match state.profiles.get_mut(&record.peptide_id) {
            Some(row) if row.origin == ContentOrigin::Curated => Ok(WriteOutcome::PreservedCurated),
            Some(row) if row.record == *record => Ok(WriteOutcome::Unchanged),
            Some(row) => {
                row.record = record.clone();
                Ok(WriteOutcome::Updated)
            }
            None => {
                state.profiles.insert(
                    record.peptide_id,
                    ProfileRow {
                        record: record.clone(),
                        origin: ContentOrigin::Generated,
                    },
                );
                Ok(WriteOutcome::Inserted)
            }
        }
    }

    async fn upsert_safety(&self, record: &SafetyRecord) -> Result<WriteOutcome> {
        let mut state = self.state.lock().await;
        state.check_writable(record.peptide_id)?;

        let existing = match state.safety.entry((record.peptide_id, record.jurisdiction_id)) {
            Entry::Vacant(slot) => {
                slot.insert(SafetyRow {
                    record: record.clone(),
                    generated_mask: SAFETY_FIELDS_GENERATED,
                });
                return Ok(WriteOutcome::Inserted);
            }
            Entry::Occupied(slot) => slot.into_mut(),
        };

        let merge = merge_safety_fields(
            [
                existing.record.adverse_effects.as_str(),
                existing.record.contraindications.as_str(),
                existing.record.interactions.as_str(),
                existing.record.monitoring.as_str(),
            ],
            existing.generated_mask,
            [
                record.adverse_effects.as_str(),
                record.contraindications.as_str(),
                record.interactions.as_str(),
                record.monitoring.as_str(),
            ],
        );
        if merge.outcome == WriteOutcome::Updated {
            let [adverse, contra, interactions, monitoring] = merge.fields;
            existing.record.adverse_effects = adverse;
            existing.record.contraindications = contra;
            existing.record.interactions = interactions;
            existing.record.monitoring = monitoring;
            existing.generated_mask = merge.generated_mask;
        }
        Ok(merge.outcome)
    }

    async fn upsert_dosing(&self, record: &DosingRecord) -> Result<WriteOutcome> {
        let mut state = self.state.lock().await;
        state.check_writable(record.peptide_id)?;

        // One generated row per (peptide, jurisdiction); its context follows the evidence
        let existing = state.dosing.iter_mut().find(|row| {
            row.origin == ContentOrigin::Generated
                && row.record.peptide_id == record.peptide_id
                && row.record.jurisdiction_id == record.jurisdiction_id
        });
        match existing {
            Some(row) if row.record == *record => Ok(WriteOutcome::Unchanged),
            Some(row) => {
                row.record = record.clone();
                Ok(WriteOutcome::Updated)
            }
            None => {
                let id = state.next_id();
                state.dosing.push(DosingRow {
                    id,
                    record: record.clone(),
                    origin: ContentOrigin::Generated,
                });
                Ok(WriteOutcome::Inserted)
            }
        }
    }

    async fn upsert_use_case_mapping(&self, record: &UseCaseMappingRecord) -> Result<WriteOutcome> {
        let mut state = self.state.lock().await;
        state.check_writable(record.peptide_id)?;

        let key = (record.peptide_id, record.use_case_id, record.jurisdiction_id);
        match state.mappings.get_mut(&key) {
            Some(row) if row.origin == ContentOrigin::Curated => Ok(WriteOutcome::PreservedCurated),
            Some(row) if row.record == *record => Ok(WriteOutcome::Unchanged),
            Some(row) => {
                row.record = record.clone();
                Ok(WriteOutcome::Updated)
            }
            None => {
                state.mappings.insert(
                    key,
                    MappingRow {
                        record: record.clone(),
                        origin: ContentOrigin::Generated,
                    },
                );
                Ok(WriteOutcome::Inserted)
            }
        }
    }

    async fn upsert_regulatory_status(&self, proposal: &RegulatoryProposal) -> Result<WriteOutcome> {
        let mut state = self.state.lock().await;
        state.check_writable(proposal.peptide_id)?;

        let key = (proposal.peptide_id, proposal.jurisdiction_id);
        match state.regulatory.get_mut(&key) {
            Some(row) if row.asserted_by == AssertedBy::Curator => {
                Ok(WriteOutcome::PreservedCurated)
            }
            Some(row) if row.status == proposal.status => Ok(WriteOutcome::Unchanged),
            Some(row) => {
                row.status = proposal.status;
                Ok(WriteOutcome::Updated)
            }
            None => {
                state.regulatory.insert(
                    key,
                    RegulatoryRow {
                        status: proposal.status,
                        asserted_by: AssertedBy::Machine,
                    },
                );
                Ok(WriteOutcome::Inserted)
            }
        }
    }

    async fn find_or_create_citation(&self, input: &CitationInput) -> Result<CitationRef> {
        let mut state = self.state.lock().await;
        if let Some(row) = state
            .citations
            .iter()
            .find(|c| c.url == input.url && c.published_on == input.published_on)
        {
            return Ok(CitationRef {
                id: row.id,
                created: false,
            });
        }

        let id = state.next_id();
        state.citations.push(CitationRow {
            id,
            url: input.url.clone(),
            title: input.title.clone(),
            published_on: input.published_on,
        });
        Ok(CitationRef { id, created: true })
    }

    async fn replace_generated_claims(
        &self,
        entity: EntityRef,
        sections: &[EvidenceSource],
        claims: Vec<ClaimRecord>,
    ) -> Result<WriteOutcome> {
        check_claim_sections(sections, &claims)?;
        let mut state = self.state.lock().await;
        if entity.kind == crate::catalog::EntityKind::Peptide {
            state.check_writable(entity.id)?;
        }

        let in_scope = |row: &ClaimRow| {
            row.entity == entity
                && matches!(&row.section, ClaimSection::Generated(s) if sections.contains(s))
        };

        let mut stored: Vec<_> = state
            .claims
            .iter()
            .filter(|row| in_scope(row))
            .map(|row| claim_key(row.section.label(), &row.text, row.grade.as_str(), row.citation_id))
            .collect();
        let mut incoming: Vec<_> = claims
            .iter()
            .map(|c| claim_key(c.section.section_tag(), &c.text, c.grade.as_str(), c.citation_id))
            .collect();
        stored.sort();
        incoming.sort();
        if stored == incoming {
            return Ok(WriteOutcome::Unchanged);
        }

        let had_rows = !stored.is_empty();
        state.claims.retain(|row| !in_scope(row));
        for claim in claims {
            let id = state.next_id();
            state.claims.push(ClaimRow {
                id,
                entity,
                section: ClaimSection::Generated(claim.section),
                text: claim.text,
                grade: claim.grade,
                citation_id: claim.citation_id,
            });
        }

        Ok(if had_rows {
            WriteOutcome::Updated
        } else {
            WriteOutcome::Inserted
        })
    }

    async fn current_rating(&self, vendor_id: i64) -> Result<Option<RatingSnapshot>> {
        let state = self.state.lock().await;
        Ok(state
            .snapshots
            .iter()
            .find(|s| s.vendor_id == vendor_id && s.is_current)
            .cloned())
    }

    async fn record_rating_snapshot(&self, input: &RatingSnapshotInput) -> Result<WriteOutcome> {
        let mut state = self.state.lock().await;
        if !state.vendors.contains_key(&input.vendor_id) {
            return Err(AppError::NotFound {
                resource_type: "vendor".to_string(),
                id: input.vendor_id.to_string(),
            });
        }

        let current = state
            .snapshots
            .iter()
            .find(|s| s.vendor_id == input.vendor_id && s.is_current);
        if current.is_some_and(|c| c.same_as(input)) {
            return Ok(WriteOutcome::Unchanged);
        }

        for snapshot in state
            .snapshots
            .iter_mut()
            .filter(|s| s.vendor_id == input.vendor_id)
        {
            snapshot.is_current = false;
        }
        let id = state.next_id();
        state.snapshots.push(RatingSnapshot {
            id,
            vendor_id: input.vendor_id,
            rating: input.rating,
            confidence: input.confidence,
            method_version: input.method_version.clone(),
            reason_tags: input.reason_tags.clone(),
            is_current: true,
            created_at: Utc::now(),
        });
        Ok(WriteOutcome::Inserted)
    }

    async fn peptide_view(&self, slug: &str) -> Result<Option<PeptideView>> {
        let state = self.state.lock().await;
        let Some((&id, peptide)) = state
            .peptides
            .iter()
            .find(|(_, p)| p.slug == slug && p.published)
        else {
            return Ok(None);
        };

        let profile = state.profiles.get(&id).map(|row| ProfileView {
            intro: row.record.intro.clone(),
            mechanism: row.record.mechanism.clone(),
            effectiveness: row.record.effectiveness.clone(),
            long_description: row.record.long_description.clone(),
            origin: row.origin.as_str().to_string(),
        });

        let mut dosing: Vec<_> = state
            .dosing
            .iter()
            .filter(|row| row.record.peptide_id == id)
            .collect();
        dosing.sort_by_key(|row| row.id);
        let dosing = dosing
            .into_iter()
            .map(|row| DosingView {
                jurisdiction: state.jurisdiction_code(row.record.jurisdiction_id),
                context: row.record.context.as_str().to_string(),
                guidance: row.record.guidance.clone(),
                origin: row.origin.as_str().to_string(),
            })
            .collect();

        let safety = state
            .safety
            .values()
            .map(|row| &row.record)
            .filter(|s| s.peptide_id == id)
            .map(|s| SafetyView {
                jurisdiction: state.jurisdiction_code(s.jurisdiction_id),
                adverse_effects: s.adverse_effects.clone(),
                contraindications: s.contraindications.clone(),
                interactions: s.interactions.clone(),
                monitoring: s.monitoring.clone(),
            })
            .collect();

        let use_cases: Vec<UseCaseView> = state
            .mappings
            .values()
            .filter(|m| m.record.peptide_id == id)
            .map(|m| UseCaseView {
                use_case: state
                    .use_cases
                    .get(&m.record.use_case_id)
                    .cloned()
                    .unwrap_or_default(),
                jurisdiction: state.jurisdiction_code(m.record.jurisdiction_id),
                grade: m.record.grade,
                consumer_summary: m.record.consumer_summary.clone(),
                clinician_summary: m.record.clinician_summary.clone(),
            })
            .collect();

        let regulatory = state
            .regulatory
            .iter()
            .filter(|((peptide_id, _), _)| *peptide_id == id)
            .map(|((_, jurisdiction_id), row)| RegulatoryView {
                jurisdiction: state.jurisdiction_code(*jurisdiction_id),
                status: row.status.as_str().to_string(),
                asserted_by: row.asserted_by.as_str().to_string(),
            })
            .collect();

        Ok(Some(PeptideView {
            slug: peptide.slug.clone(),
            name: peptide.name.clone(),
            class_name: peptide.class_name.clone(),
            aliases: peptide.aliases.clone(),
            profile,
            dosing,
            safety,
            best_grade: EvidenceGrade::best(use_cases.iter().map(|u| u.grade)),
            use_cases,
            regulatory,
            claims: state.claim_views(EntityRef::peptide(id)),
        }))
    }

    async fn vendor_view(&self, slug: &str) -> Result<Option<VendorView>> {
        let state = self.state.lock().await;
        let Some((&id, vendor)) = state
            .vendors
            .iter()
            .find(|(_, v)| v.slug == slug && v.published)
        else {
            return Ok(None);
        };

        Ok(Some(VendorView {
            slug: vendor.slug.clone(),
            name: vendor.name.clone(),
            domain: vendor.domain.clone(),
            rating: state
                .snapshots
                .iter()
                .find(|s| s.vendor_id == id && s.is_current)
                .cloned(),
            claims: state.claim_views(EntityRef::vendor(id)),
        }))
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{placeholder, DosingContext};
    use tokio_test::assert_ok;

    fn safety(peptide_id: i64, jurisdiction_id: i64, text: &str) -> SafetyRecord {
        SafetyRecord {
            peptide_id,
            jurisdiction_id,
            adverse_effects: text.to_string(),
            contraindications: text.to_string(),
            interactions: text.to_string(),
            monitoring: text.to_string(),
        }
    }

    fn claim(section: EvidenceSource, text: &str, citation_id: Option<i64>) -> ClaimRecord {
        ClaimRecord {
            section,
            text: text.to_string(),
            grade: EvidenceGrade::C,
            citation_id,
        }
    }

    #[tokio::test]
    async fn test_citation_dedup_by_url_and_date() {
        let store = MemoryStore::new();
        let date = NaiveDate::from_ymd_opt(2024, 3, 1);
        let input = CitationInput {
            url: "https://clinicaltrials.gov/search?term=Semaglutide".to_string(),
            title: Some("ClinicalTrials.gov: Semaglutide".to_string()),
            published_on: date,
        };

        let first = store.find_or_create_citation(&input).await.unwrap();
        let second = store.find_or_create_citation(&input).await.unwrap();
        assert!(first.created);
        assert!(!second.created);
        assert_eq!(first.id, second.id);

        let undated = CitationInput {
            published_on: None,
            ..input.clone()
        };
        let third = store.find_or_create_citation(&undated).await.unwrap();
        let fourth = store.find_or_create_citation(&undated).await.unwrap();
        assert_ne!(third.id, first.id);
        assert_eq!(third.id, fourth.id);
        assert_eq!(store.row_counts().await.citations, 2);
    }

    #[tokio::test]
    async fn test_curated_safety_never_overwritten_by_placeholder() {
        let store = MemoryStore::new();
        let peptide = store.add_peptide("BPC-157", None, &[]).await;
        let us = store.add_jurisdiction("US").await;
        store.put_safety(safety(peptide, us, "Curated: mild injection-site redness.")).await;

        let outcome = store
            .upsert_safety(&safety(peptide, us, &placeholder("No label data.")))
            .await
            .unwrap();
        assert_eq!(outcome, WriteOutcome::PreservedCurated);
        let stored = store.safety_for(peptide, us).await.unwrap();
        assert_eq!(stored.adverse_effects, "Curated: mild injection-site redness.");
    }

    #[tokio::test]
    async fn test_placeholder_safety_replaced_by_generated_text() {
        let store = MemoryStore::new();
        let peptide = store.add_peptide("Semaglutide", None, &[]).await;
        let us = store.add_jurisdiction("US").await;
        store.upsert_safety(&safety(peptide, us, &placeholder("No label data."))).await.unwrap();

        let outcome = store
            .upsert_safety(&safety(peptide, us, "Nausea, vomiting, diarrhea."))
            .await
            .unwrap();
        assert_eq!(outcome, WriteOutcome::Updated);
        let stored = store.safety_for(peptide, us).await.unwrap();
        assert_eq!(stored.monitoring, "Nausea, vomiting, diarrhea.");
    }

    #[tokio::test]
    async fn test_generated_safety_refreshes_with_new_label() {
        let store = MemoryStore::new();
        let peptide = store.add_peptide("Semaglutide", None, &[]).await;
        let us = store.add_jurisdiction("US").await;
        store.upsert_safety(&safety(peptide, us, "Nausea (label v1).")).await.unwrap();

        let outcome = store
            .upsert_safety(&safety(peptide, us, "Nausea, pancreatitis (label v2)."))
            .await
            .unwrap();
        assert_eq!(outcome, WriteOutcome::Updated);
        let stored = store.safety_for(peptide, us).await.unwrap();
        assert_eq!(stored.adverse_effects, "Nausea, pancreatitis (label v2).");

        // A label outage yields placeholders, which never erase real text
        let outcome = store
            .upsert_safety(&safety(peptide, us, &placeholder("No label data.")))
            .await
            .unwrap();
        assert_eq!(outcome, WriteOutcome::PreservedCurated);
        let stored = store.safety_for(peptide, us).await.unwrap();
        assert_eq!(stored.adverse_effects, "Nausea, pancreatitis (label v2).");
    }

    #[tokio::test]
    async fn test_replace_generated_claims_keeps_curated() {
        let store = MemoryStore::new();
        let peptide = store.add_peptide("Semaglutide", None, &[]).await;
        let entity = EntityRef::peptide(peptide);
        store.add_curated_claim(entity, "Editor notes", "Curator claim").await;

        let sections = [EvidenceSource::ClinicalTrials, EvidenceSource::PubMed];
        store
            .replace_generated_claims(
                entity,
                &sections,
                vec![claim(EvidenceSource::ClinicalTrials, "old", None)],
            )
            .await
            .unwrap();
        let outcome = store
            .replace_generated_claims(
                entity,
                &sections,
                vec![claim(EvidenceSource::PubMed, "new", None)],
            )
            .await
            .unwrap();
        assert_eq!(outcome, WriteOutcome::Updated);

        let claims = store.claims_for(entity).await;
        assert_eq!(claims.len(), 2);
        assert!(claims.contains(&(
            ClaimSection::Curated("Editor notes".to_string()),
            "Curator claim".to_string()
        )));
        assert!(claims.iter().all(|(_, text)| text != "old"));
    }

    #[tokio::test]
    async fn test_replace_generated_claims_scoped_to_sections() {
        let store = MemoryStore::new();
        let vendor = store.add_vendor("Acme Peptides", None, &[], 0).await;
        let entity = EntityRef::vendor(vendor);

        store
            .replace_generated_claims(
                entity,
                &[EvidenceSource::Reddit],
                vec![claim(EvidenceSource::Reddit, "reddit quote", None)],
            )
            .await
            .unwrap();
        store
            .replace_generated_claims(
                entity,
                &[EvidenceSource::HackerNews],
                vec![claim(EvidenceSource::HackerNews, "hn quote", None)],
            )
            .await
            .unwrap();

        assert_eq!(store.claims_for(entity).await.len(), 2);
    }

    #[tokio::test]
    async fn test_identical_claim_set_is_noop() {
        let store = MemoryStore::new();
        let peptide = store.add_peptide("Semaglutide", None, &[]).await;
        let entity = EntityRef::peptide(peptide);
        let sections = [EvidenceSource::PubMed];
        let claims = vec![claim(EvidenceSource::PubMed, "12 articles", Some(9))];

        store.replace_generated_claims(entity, &sections, claims.clone()).await.unwrap();
        let outcome = store.replace_generated_claims(entity, &sections, claims).await.unwrap();
        assert_eq!(outcome, WriteOutcome::Unchanged);
    }

    #[tokio::test]
    async fn test_snapshot_flip_keeps_one_current() {
        let store = MemoryStore::new();
        let vendor = store.add_vendor("Acme Peptides", None, &["coa_published"], 4).await;
        let mut input = RatingSnapshotInput {
            vendor_id: vendor,
            rating: Some(3.0),
            confidence: Some(0.5),
            method_version: "trust-v2".to_string(),
            reason_tags: vec![],
        };

        assert_eq!(store.record_rating_snapshot(&input).await.unwrap(), WriteOutcome::Inserted);
        assert_eq!(store.record_rating_snapshot(&input).await.unwrap(), WriteOutcome::Unchanged);
        input.rating = Some(3.5);
        assert_eq!(store.record_rating_snapshot(&input).await.unwrap(), WriteOutcome::Inserted);

        let snapshots = store.snapshots_for(vendor).await;
        assert_eq!(snapshots.len(), 2);
        assert_eq!(snapshots.iter().filter(|s| s.is_current).count(), 1);
        let current = store.current_rating(vendor).await.unwrap().unwrap();
        assert_eq!(current.rating, Some(3.5));
    }

    #[tokio::test]
    async fn test_curated_regulatory_status_preserved() {
        let store = MemoryStore::new();
        let peptide = store.add_peptide("BPC-157", None, &[]).await;
        let us = store.add_jurisdiction("US").await;
        store.put_curated_regulatory(peptide, us, RegulatoryStatus::NotApproved).await;

        let outcome = store
            .upsert_regulatory_status(&RegulatoryProposal {
                peptide_id: peptide,
                jurisdiction_id: us,
                status: RegulatoryStatus::Investigational,
            })
            .await
            .unwrap();
        assert_eq!(outcome, WriteOutcome::PreservedCurated);
        assert_eq!(
            store.regulatory_for(peptide, us).await,
            Some((RegulatoryStatus::NotApproved, AssertedBy::Curator))
        );
    }

    #[tokio::test]
    async fn test_generated_dosing_coexists_with_manual() {
        let store = MemoryStore::new();
        let peptide = store.add_peptide("Semaglutide", None, &[]).await;
        let us = store.add_jurisdiction("US").await;
        let record = DosingRecord {
            peptide_id: peptide,
            jurisdiction_id: us,
            context: DosingContext::ApprovedLabel,
            guidance: "0.25 mg weekly".to_string(),
        };

        assert_eq!(store.upsert_dosing(&record).await.unwrap(), WriteOutcome::Inserted);
        assert_eq!(store.upsert_dosing(&record).await.unwrap(), WriteOutcome::Unchanged);
        assert_eq!(store.row_counts().await.dosing, 1);
    }

    #[tokio::test]
    async fn test_generated_dosing_follows_context_change() {
        let store = MemoryStore::new();
        let peptide = store.add_peptide("Semaglutide", None, &[]).await;
        let us = store.add_jurisdiction("US").await;
        let study = DosingRecord {
            peptide_id: peptide,
            jurisdiction_id: us,
            context: DosingContext::StudyReported,
            guidance: placeholder("Dosing reported in studies only."),
        };
        let label = DosingRecord {
            context: DosingContext::ApprovedLabel,
            guidance: "0.25 mg weekly".to_string(),
            ..study.clone()
        };

        assert_ok!(store.upsert_dosing(&study).await);
        assert_eq!(store.upsert_dosing(&label).await.unwrap(), WriteOutcome::Updated);
        assert_eq!(store.upsert_dosing(&label).await.unwrap(), WriteOutcome::Unchanged);
        assert_eq!(store.row_counts().await.dosing, 1);

        let view = store.peptide_view("semaglutide").await.unwrap().unwrap();
        assert_eq!(view.dosing.len(), 1);
        assert_eq!(view.dosing[0].context, "approved-label");
        assert_eq!(view.dosing[0].guidance, "0.25 mg weekly");
    }

    #[tokio::test]
    async fn test_unpublished_entities_hidden() {
        let store = MemoryStore::new();
        store.add_peptide("BPC-157", None, &["BPC 157"]).await;
        assert!(store.peptide_view("bpc-157").await.unwrap().is_some());

        store.set_published("bpc-157", false).await;
        assert!(store.peptide_view("bpc-157").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_target_aliases_deduplicated() {
        let store = MemoryStore::new();
        store.add_peptide("BPC-157", None, &["BPC 157", "bpc-157", "Body Protection Compound"]).await;

        let targets = store.list_peptide_targets(&TargetSelector::default()).await.unwrap();
        assert_eq!(targets[0].aliases, vec!["BPC 157", "Body Protection Compound"]);
    }
}
