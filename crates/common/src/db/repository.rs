//! Repository pattern for database operations
//!
//! Postgres implementation of `CatalogStore`. Each write is a small, independent,
//! idempotent statement group; the two multi-row writes (claim replacement and
//! rating snapshots) run in a transaction holding a row lock on the owning entity.

use crate::catalog::{
    AssertedBy, ClaimSection, ContentOrigin, EntityKind, EntityRef, EvidenceGrade,
    EvidenceSource,
};
use crate::db::models::*;
use crate::db::DbPool;
use crate::errors::{AppError, Result};
use crate::store::{
    check_claim_sections, claim_key, merge_safety_fields, CatalogStore, CitationInput,
    CitationRef, CitationView, ClaimRecord, ClaimView, DosingRecord, DosingView, PeptideTarget,
    PeptideView, ProfileRecord, ProfileView, RatingSnapshot, RatingSnapshotInput,
    RegulatoryProposal, RegulatoryView, SafetyRecord, SafetyView, TargetSelector,
    UseCaseMappingRecord, UseCaseView, VendorTarget, VendorView, WriteOutcome,
    SAFETY_FIELDS_GENERATED,
};
use async_trait::async_trait;
use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, SqlErr, TransactionTrait,
};
use std::collections::{HashMap, HashSet};
use tracing::{debug, instrument, warn};

/// Repository for data access operations
#[derive(Clone)]
pub struct Repository {
    pool: DbPool,
}

impl Repository {
    /// Create a new repository with the given connection pool
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn conn(&self) -> &DatabaseConnection {
        self.pool.conn()
    }

    async fn find_citation<C: ConnectionTrait>(
        conn: &C,
        input: &CitationInput,
    ) -> Result<Option<Citation>> {
        let query = CitationEntity::find().filter(CitationColumn::Url.eq(input.url.as_str()));
        // NULL-safe equality on the date half of the key
        let query = match input.published_on {
            Some(date) => query.filter(CitationColumn::PublishedOn.eq(date)),
            None => query.filter(CitationColumn::PublishedOn.is_null()),
        };
        query.one(conn).await.map_err(Into::into)
    }

    /// Lock the owning peptide or vendor row for the rest of the transaction
    async fn lock_entity<C: ConnectionTrait>(conn: &C, entity: EntityRef) -> Result<()> {
        let found = match entity.kind {
            EntityKind::Peptide => PeptideEntity::find_by_id(entity.id)
                .lock_exclusive()
                .one(conn)
                .await?
                .is_some(),
            EntityKind::Vendor => VendorEntity::find_by_id(entity.id)
                .lock_exclusive()
                .one(conn)
                .await?
                .is_some(),
        };
        if !found {
            return Err(AppError::NotFound {
                resource_type: entity.kind.as_str().to_string(),
                id: entity.id.to_string(),
            });
        }
        Ok(())
    }

    /// The single generated dosing row of a (peptide, jurisdiction), whatever its context
    async fn generated_dosing(&self, record: &DosingRecord) -> Result<Option<DosingEntry>> {
        DosingEntryEntity::find()
            .filter(DosingEntryColumn::PeptideId.eq(record.peptide_id))
            .filter(DosingEntryColumn::JurisdictionId.eq(record.jurisdiction_id))
            .filter(DosingEntryColumn::Origin.eq(ContentOrigin::Generated.as_str()))
            .one(self.conn())
            .await
            .map_err(Into::into)
    }

    async fn refresh_dosing(&self, row: DosingEntry, record: &DosingRecord) -> Result<WriteOutcome> {
        if row.context == record.context.as_str() && row.guidance == record.guidance {
            return Ok(WriteOutcome::Unchanged);
        }
        let mut active: DosingEntryActiveModel = row.into();
        active.context = Set(record.context.as_str().to_string());
        active.guidance = Set(record.guidance.clone());
        active.updated_at = Set(Utc::now().into());
        active.update(self.conn()).await?;
        Ok(WriteOutcome::Updated)
    }

    async fn jurisdiction_codes(&self) -> Result<HashMap<i64, String>> {
        Ok(JurisdictionEntity::find()
            .all(self.conn())
            .await?
            .into_iter()
            .map(|j| (j.id, j.code))
            .collect())
    }

    async fn claim_views(&self, entity: EntityRef) -> Result<Vec<ClaimView>> {
        let claims = ClaimEntity::find()
            .filter(ClaimColumn::EntityKind.eq(entity.kind.as_str()))
            .filter(ClaimColumn::EntityId.eq(entity.id))
            .order_by_asc(ClaimColumn::Id)
            .all(self.conn())
            .await?;

        let citation_ids: HashSet<i64> = claims.iter().filter_map(|c| c.citation_id).collect();
        let citations: HashMap<i64, Citation> = if citation_ids.is_empty() {
            HashMap::new()
        } else {
            CitationEntity::find()
                .filter(CitationColumn::Id.is_in(citation_ids))
                .all(self.conn())
                .await?
                .into_iter()
                .map(|c| (c.id, c))
                .collect()
        };

        Ok(claims
            .into_iter()
            .map(|c| ClaimView {
                section: ClaimSection::from_columns(&c.origin, &c.section),
                grade: c.grade.parse().unwrap_or_default(),
                citation: c
                    .citation_id
                    .and_then(|id| citations.get(&id))
                    .map(|cit| CitationView {
                        url: cit.url.clone(),
                        title: cit.title.clone(),
                        published_on: cit.published_on,
                    }),
                text: c.text,
            })
            .collect())
    }
}

fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

fn snapshot_from_model(model: VendorRatingSnapshot) -> RatingSnapshot {
    RatingSnapshot {
        id: model.id,
        vendor_id: model.vendor_id,
        rating: model.rating,
        confidence: model.confidence,
        method_version: model.method_version,
        reason_tags: serde_json::from_value(model.reason_tags).unwrap_or_default(),
        is_current: model.is_current,
        created_at: model.created_at.with_timezone(&Utc),
    }
}

#[async_trait]
impl CatalogStore for Repository {
    // ========================================================================
    // Targets
    // ========================================================================

    #[instrument(skip(self))]
    async fn list_peptide_targets(&self, selector: &TargetSelector) -> Result<Vec<PeptideTarget>> {
        let mut query = PeptideEntity::find().order_by_asc(PeptideColumn::Id);
        if !selector.slugs.is_empty() {
            query = query.filter(PeptideColumn::Slug.is_in(selector.slugs.clone()));
        }
        if let Some(limit) = selector.limit {
            query = query.limit(limit as u64);
        }
        let peptides = query.all(self.conn()).await?;

        let ids: Vec<i64> = peptides.iter().map(|p| p.id).collect();
        let mut aliases: HashMap<i64, Vec<PeptideAlias>> = HashMap::new();
        if !ids.is_empty() {
            for alias in PeptideAliasEntity::find()
                .filter(PeptideAliasColumn::PeptideId.is_in(ids))
                .order_by_asc(PeptideAliasColumn::Id)
                .all(self.conn())
                .await?
            {
                aliases.entry(alias.peptide_id).or_default().push(alias);
            }
        }

        Ok(peptides
            .into_iter()
            .map(|p| {
                let mut seen = HashSet::new();
                let aliases = aliases
                    .remove(&p.id)
                    .unwrap_or_default()
                    .into_iter()
                    .filter(|a| seen.insert(a.normalized.clone()))
                    .map(|a| a.alias)
                    .collect();
                PeptideTarget {
                    id: p.id,
                    slug: p.slug,
                    name: p.name,
                    class_name: p.class_name,
                    aliases,
                }
            })
            .collect())
    }

    #[instrument(skip(self))]
    async fn list_vendor_targets(&self, selector: &TargetSelector) -> Result<Vec<VendorTarget>> {
        let mut query = VendorEntity::find().order_by_asc(VendorColumn::Id);
        if !selector.slugs.is_empty() {
            query = query.filter(VendorColumn::Slug.is_in(selector.slugs.clone()));
        }
        if let Some(limit) = selector.limit {
            query = query.limit(limit as u64);
        }
        let vendors = query.all(self.conn()).await?;

        let ids: Vec<i64> = vendors.iter().map(|v| v.id).collect();
        let counts: HashMap<i64, i64> = if ids.is_empty() {
            HashMap::new()
        } else {
            VendorListingEntity::find()
                .select_only()
                .column(VendorListingColumn::VendorId)
                .column_as(Expr::col(VendorListingColumn::Id).count(), "listing_count")
                .filter(VendorListingColumn::VendorId.is_in(ids))
                .group_by(VendorListingColumn::VendorId)
                .into_tuple::<(i64, i64)>()
                .all(self.conn())
                .await?
                .into_iter()
                .collect()
        };

        Ok(vendors
            .into_iter()
            .map(|v| {
                let trust_signals = serde_json::from_value(v.trust_signals).unwrap_or_else(|e| {
                    warn!(vendor = %v.slug, error = %e, "Unreadable trust_signals, treating as empty");
                    Vec::new()
                });
                VendorTarget {
                    listing_count: counts.get(&v.id).copied().unwrap_or(0).max(0) as u32,
                    id: v.id,
                    slug: v.slug,
                    name: v.name,
                    domain: v.domain,
                    trust_signals,
                }
            })
            .collect())
    }

    // ========================================================================
    // Reference Data
    // ========================================================================

    async fn jurisdiction_ids(&self) -> Result<HashMap<String, i64>> {
        Ok(self
            .jurisdiction_codes()
            .await?
            .into_iter()
            .map(|(id, code)| (code, id))
            .collect())
    }

    async fn use_case_ids(&self) -> Result<HashMap<String, i64>> {
        Ok(UseCaseEntity::find()
            .all(self.conn())
            .await?
            .into_iter()
            .map(|u| (u.slug, u.id))
            .collect())
    }

    // ========================================================================
    // Peptide Content
    // ========================================================================

    #[instrument(skip(self, record), fields(peptide_id = record.peptide_id))]
    async fn upsert_profile(&self, record: &ProfileRecord) -> Result<WriteOutcome> {
        let now = Utc::now();
        let existing = PeptideProfileEntity::find()
            .filter(PeptideProfileColumn::PeptideId.eq(record.peptide_id))
            .one(self.conn())
            .await?;

        match existing {
            Some(row) if ContentOrigin::from(row.origin.as_str()) == ContentOrigin::Curated => {
                Ok(WriteOutcome::PreservedCurated)
            }
            Some(row)
                if row.intro == record.intro
                    && row.mechanism == record.mechanism
                    && row.effectiveness == record.effectiveness
                    && row.long_description == record.long_description =>
            {
                Ok(WriteOutcome::Unchanged)
            }
            Some(row) => {
                let mut active: PeptideProfileActiveModel = row.into();
                active.intro = Set(record.intro.clone());
                active.mechanism = Set(record.mechanism.clone());
                active.effectiveness = Set(record.effectiveness.clone());
                active.long_description = Set(record.long_description.clone());
                active.updated_at = Set(now.into());
                active.update(self.conn()).await?;
                Ok(WriteOutcome::Updated)
            }
            None => {
                let active = PeptideProfileActiveModel {
                    peptide_id: Set(record.peptide_id),
                    intro: Set(record.intro.clone()),
                    mechanism: Set(record.mechanism.clone()),
                    effectiveness: Set(record.effectiveness.clone()),
                    long_description: Set(record.long_description.clone()),
                    origin: Set(ContentOrigin::Generated.as_str().to_string()),
                    updated_at: Set(now.into()),
                    ..Default::default()
                };
                match active.insert(self.conn()).await {
                    Ok(_) => Ok(WriteOutcome::Inserted),
                    Err(e) if is_unique_violation(&e) => {
                        debug!("Profile inserted concurrently");
                        Ok(WriteOutcome::Unchanged)
                    }
                    Err(e) => Err(e.into()),
                }
            }
        }
    }

    #[instrument(skip(self, record), fields(peptide_id = record.peptide_id))]
    async fn upsert_safety(&self, record: &SafetyRecord) -> Result<WriteOutcome> {
        let now = Utc::now();
        let existing = SafetyEntryEntity::find()
            .filter(SafetyEntryColumn::PeptideId.eq(record.peptide_id))
            .filter(SafetyEntryColumn::JurisdictionId.eq(record.jurisdiction_id))
            .one(self.conn())
            .await?;

        let row = match existing {
            Some(row) => row,
            None => {
                let active = SafetyEntryActiveModel {
                    peptide_id: Set(record.peptide_id),
                    jurisdiction_id: Set(record.jurisdiction_id),
                    adverse_effects: Set(record.adverse_effects.clone()),
                    contraindications: Set(record.contraindications.clone()),
                    interactions: Set(record.interactions.clone()),
                    monitoring: Set(record.monitoring.clone()),
                    generated_mask: Set(SAFETY_FIELDS_GENERATED),
                    updated_at: Set(now.into()),
                    ..Default::default()
                };
                match active.insert(self.conn()).await {
                    Ok(_) => return Ok(WriteOutcome::Inserted),
                    // Lost the race; merge into the winner's row
                    Err(e) if is_unique_violation(&e) => SafetyEntryEntity::find()
                        .filter(SafetyEntryColumn::PeptideId.eq(record.peptide_id))
                        .filter(SafetyEntryColumn::JurisdictionId.eq(record.jurisdiction_id))
                        .one(self.conn())
                        .await?
                        .ok_or_else(|| AppError::Internal {
                            message: "safety row vanished after unique violation".to_string(),
                        })?,
                    Err(e) => return Err(e.into()),
                }
            }
        };

        let merge = merge_safety_fields(
            [
                row.adverse_effects.as_str(),
                row.contraindications.as_str(),
                row.interactions.as_str(),
                row.monitoring.as_str(),
            ],
            row.generated_mask,
            [
                record.adverse_effects.as_str(),
                record.contraindications.as_str(),
                record.interactions.as_str(),
                record.monitoring.as_str(),
            ],
        );
        if merge.outcome == WriteOutcome::Updated {
            let [adverse, contra, interactions, monitoring] = merge.fields;
            let mut active: SafetyEntryActiveModel = row.into();
            active.adverse_effects = Set(adverse);
            active.contraindications = Set(contra);
            active.interactions = Set(interactions);
            active.monitoring = Set(monitoring);
            active.generated_mask = Set(merge.generated_mask);
            active.updated_at = Set(now.into());
            active.update(self.conn()).await?;
        }
        Ok(merge.outcome)
    }

    #[instrument(skip(self, record), fields(peptide_id = record.peptide_id, context = record.context.as_str()))]
    async fn upsert_dosing(&self, record: &DosingRecord) -> Result<WriteOutcome> {
        if let Some(row) = self.generated_dosing(record).await? {
            return self.refresh_dosing(row, record).await;
        }

        let active = DosingEntryActiveModel {
            peptide_id: Set(record.peptide_id),
            jurisdiction_id: Set(record.jurisdiction_id),
            context: Set(record.context.as_str().to_string()),
            guidance: Set(record.guidance.clone()),
            origin: Set(ContentOrigin::Generated.as_str().to_string()),
            updated_at: Set(Utc::now().into()),
            ..Default::default()
        };
        match active.insert(self.conn()).await {
            Ok(_) => Ok(WriteOutcome::Inserted),
            Err(e) if is_unique_violation(&e) => {
                // Lost the race; the winner's row takes this write
                debug!("Generated dosing inserted concurrently, re-querying");
                let row = self.generated_dosing(record).await?.ok_or_else(|| {
                    AppError::Internal {
                        message: "generated dosing row vanished after unique violation".to_string(),
                    }
                })?;
                self.refresh_dosing(row, record).await
            }
            Err(e) => Err(e.into()),
        }
    }

    #[instrument(skip(self, record), fields(peptide_id = record.peptide_id, use_case_id = record.use_case_id))]
    async fn upsert_use_case_mapping(&self, record: &UseCaseMappingRecord) -> Result<WriteOutcome> {
        let now = Utc::now();
        let existing = PeptideUseCaseEntity::find()
            .filter(PeptideUseCaseColumn::PeptideId.eq(record.peptide_id))
            .filter(PeptideUseCaseColumn::UseCaseId.eq(record.use_case_id))
            .filter(PeptideUseCaseColumn::JurisdictionId.eq(record.jurisdiction_id))
            .one(self.conn())
            .await?;

        match existing {
            Some(row) if ContentOrigin::from(row.origin.as_str()) == ContentOrigin::Curated => {
                Ok(WriteOutcome::PreservedCurated)
            }
            Some(row)
                if row.grade == record.grade.as_str()
                    && row.consumer_summary == record.consumer_summary
                    && row.clinician_summary == record.clinician_summary =>
            {
                Ok(WriteOutcome::Unchanged)
            }
            Some(row) => {
                let mut active: PeptideUseCaseActiveModel = row.into();
                active.grade = Set(record.grade.as_str().to_string());
                active.consumer_summary = Set(record.consumer_summary.clone());
                active.clinician_summary = Set(record.clinician_summary.clone());
                active.updated_at = Set(now.into());
                active.update(self.conn()).await?;
                Ok(WriteOutcome::Updated)
            }
            None => {
                let active = PeptideUseCaseActiveModel {
                    peptide_id: Set(record.peptide_id),
                    use_case_id: Set(record.use_case_id),
                    jurisdiction_id: Set(record.jurisdiction_id),
                    grade: Set(record.grade.as_str().to_string()),
                    consumer_summary: Set(record.consumer_summary.clone()),
                    clinician_summary: Set(record.clinician_summary.clone()),
                    origin: Set(ContentOrigin::Generated.as_str().to_string()),
                    updated_at: Set(now.into()),
                    ..Default::default()
                };
                match active.insert(self.conn()).await {
                    Ok(_) => Ok(WriteOutcome::Inserted),
                    Err(e) if is_unique_violation(&e) => Ok(WriteOutcome::Unchanged),
                    Err(e) => Err(e.into()),
                }
            }
        }
    }

    #[instrument(skip(self, proposal), fields(peptide_id = proposal.peptide_id, status = proposal.status.as_str()))]
    async fn upsert_regulatory_status(&self, proposal: &RegulatoryProposal) -> Result<WriteOutcome> {
        let now = Utc::now();
        let existing = RegulatoryStatusEntity::find()
            .filter(RegulatoryStatusColumn::PeptideId.eq(proposal.peptide_id))
            .filter(RegulatoryStatusColumn::JurisdictionId.eq(proposal.jurisdiction_id))
            .one(self.conn())
            .await?;

        match existing {
            Some(row) if AssertedBy::from(row.asserted_by.as_str()) == AssertedBy::Curator => {
                Ok(WriteOutcome::PreservedCurated)
            }
            Some(row) if row.status == proposal.status.as_str() => Ok(WriteOutcome::Unchanged),
            Some(row) => {
                let mut active: RegulatoryStatusActiveModel = row.into();
                active.status = Set(proposal.status.as_str().to_string());
                active.updated_at = Set(now.into());
                active.update(self.conn()).await?;
                Ok(WriteOutcome::Updated)
            }
            None => {
                let active = RegulatoryStatusActiveModel {
                    peptide_id: Set(proposal.peptide_id),
                    jurisdiction_id: Set(proposal.jurisdiction_id),
                    status: Set(proposal.status.as_str().to_string()),
                    asserted_by: Set(AssertedBy::Machine.as_str().to_string()),
                    updated_at: Set(now.into()),
                    ..Default::default()
                };
                match active.insert(self.conn()).await {
                    Ok(_) => Ok(WriteOutcome::Inserted),
                    Err(e) if is_unique_violation(&e) => Ok(WriteOutcome::Unchanged),
                    Err(e) => Err(e.into()),
                }
            }
        }
    }

    // ========================================================================
    // Claims and Citations
    // ========================================================================

    #[instrument(skip(self, input), fields(url = %input.url))]
    async fn find_or_create_citation(&self, input: &CitationInput) -> Result<CitationRef> {
        if let Some(found) = Self::find_citation(self.conn(), input).await? {
            return Ok(CitationRef {
                id: found.id,
                created: false,
            });
        }

        let active = CitationActiveModel {
            url: Set(input.url.clone()),
            title: Set(input.title.clone()),
            published_on: Set(input.published_on),
            retrieved_at: Set(Utc::now().into()),
            ..Default::default()
        };
        match active.insert(self.conn()).await {
            Ok(row) => Ok(CitationRef {
                id: row.id,
                created: true,
            }),
            Err(e) if is_unique_violation(&e) => {
                // Another writer inserted the same (url, date) first
                debug!("Citation insert raced, re-querying");
                let found = Self::find_citation(self.conn(), input).await?.ok_or_else(|| {
                    AppError::Internal {
                        message: format!("citation for {} vanished after conflict", input.url),
                    }
                })?;
                Ok(CitationRef {
                    id: found.id,
                    created: false,
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    #[instrument(skip(self, sections, claims), fields(entity = entity.kind.as_str(), entity_id = entity.id, claims = claims.len()))]
    async fn replace_generated_claims(
        &self,
        entity: EntityRef,
        sections: &[EvidenceSource],
        claims: Vec<ClaimRecord>,
    ) -> Result<WriteOutcome> {
        check_claim_sections(sections, &claims)?;
        let tags: Vec<&'static str> = sections.iter().map(|s| s.section_tag()).collect();

        let txn = self.conn().begin().await?;
        Self::lock_entity(&txn, entity).await?;

        let scope = ClaimColumn::EntityKind
            .eq(entity.kind.as_str())
            .and(ClaimColumn::EntityId.eq(entity.id))
            .and(ClaimColumn::Origin.eq(ContentOrigin::Generated.as_str()))
            .and(ClaimColumn::Section.is_in(tags));

        let stored = ClaimEntity::find().filter(scope.clone()).all(&txn).await?;
        let mut stored_keys: Vec<_> = stored
            .iter()
            .map(|c| claim_key(&c.section, &c.text, &c.grade, c.citation_id))
            .collect();
        let mut incoming_keys: Vec<_> = claims
            .iter()
            .map(|c| claim_key(c.section.section_tag(), &c.text, c.grade.as_str(), c.citation_id))
            .collect();
        stored_keys.sort();
        incoming_keys.sort();
        if stored_keys == incoming_keys {
            txn.commit().await?;
            return Ok(WriteOutcome::Unchanged);
        }

        let deleted = ClaimEntity::delete_many().filter(scope).exec(&txn).await?;

        if !claims.is_empty() {
            let now = Utc::now();
            let rows = claims.into_iter().map(|c| ClaimActiveModel {
                entity_kind: Set(entity.kind.as_str().to_string()),
                entity_id: Set(entity.id),
                section: Set(c.section.section_tag().to_string()),
                origin: Set(ContentOrigin::Generated.as_str().to_string()),
                text: Set(c.text),
                grade: Set(c.grade.as_str().to_string()),
                citation_id: Set(c.citation_id),
                created_at: Set(now.into()),
                ..Default::default()
            });
            ClaimEntity::insert_many(rows).exec(&txn).await?;
        }

        txn.commit().await?;
        debug!(deleted = deleted.rows_affected, "Generated claims replaced");

        Ok(if deleted.rows_affected > 0 {
            WriteOutcome::Updated
        } else {
            WriteOutcome::Inserted
        })
    }

    // ========================================================================
    // Vendor Ratings
    // ========================================================================

    async fn current_rating(&self, vendor_id: i64) -> Result<Option<RatingSnapshot>> {
        Ok(VendorRatingSnapshotEntity::find()
            .filter(VendorRatingSnapshotColumn::VendorId.eq(vendor_id))
            .filter(VendorRatingSnapshotColumn::IsCurrent.eq(true))
            .one(self.conn())
            .await?
            .map(snapshot_from_model))
    }

    #[instrument(skip(self, input), fields(vendor_id = input.vendor_id))]
    async fn record_rating_snapshot(&self, input: &RatingSnapshotInput) -> Result<WriteOutcome> {
        let txn = self.conn().begin().await?;
        // Serializes concurrent rating updates for the same vendor
        Self::lock_entity(&txn, EntityRef::vendor(input.vendor_id)).await?;

        let current = VendorRatingSnapshotEntity::find()
            .filter(VendorRatingSnapshotColumn::VendorId.eq(input.vendor_id))
            .filter(VendorRatingSnapshotColumn::IsCurrent.eq(true))
            .one(&txn)
            .await?
            .map(snapshot_from_model);
        if current.as_ref().is_some_and(|c| c.same_as(input)) {
            txn.commit().await?;
            return Ok(WriteOutcome::Unchanged);
        }

        VendorRatingSnapshotEntity::update_many()
            .col_expr(VendorRatingSnapshotColumn::IsCurrent, Expr::value(false))
            .filter(VendorRatingSnapshotColumn::VendorId.eq(input.vendor_id))
            .filter(VendorRatingSnapshotColumn::IsCurrent.eq(true))
            .exec(&txn)
            .await?;

        VendorRatingSnapshotActiveModel {
            vendor_id: Set(input.vendor_id),
            rating: Set(input.rating),
            confidence: Set(input.confidence),
            method_version: Set(input.method_version.clone()),
            reason_tags: Set(serde_json::to_value(&input.reason_tags)?),
            is_current: Set(true),
            created_at: Set(Utc::now().into()),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        txn.commit().await?;
        Ok(WriteOutcome::Inserted)
    }

    // ========================================================================
    // Read Path
    // ========================================================================

    #[instrument(skip(self))]
    async fn peptide_view(&self, slug: &str) -> Result<Option<PeptideView>> {
        let Some(peptide) = PeptideEntity::find()
            .filter(PeptideColumn::Slug.eq(slug))
            .filter(PeptideColumn::IsPublished.eq(true))
            .one(self.conn())
            .await?
        else {
            return Ok(None);
        };

        let codes = self.jurisdiction_codes().await?;
        let code = |id: i64| codes.get(&id).cloned().unwrap_or_default();
        let use_case_slugs: HashMap<i64, String> = self
            .use_case_ids()
            .await?
            .into_iter()
            .map(|(slug, id)| (id, slug))
            .collect();

        let aliases = PeptideAliasEntity::find()
            .filter(PeptideAliasColumn::PeptideId.eq(peptide.id))
            .order_by_asc(PeptideAliasColumn::Id)
            .all(self.conn())
            .await?
            .into_iter()
            .map(|a| a.alias)
            .collect();

        let profile = PeptideProfileEntity::find()
            .filter(PeptideProfileColumn::PeptideId.eq(peptide.id))
            .one(self.conn())
            .await?
            .map(|p| ProfileView {
                intro: p.intro,
                mechanism: p.mechanism,
                effectiveness: p.effectiveness,
                long_description: p.long_description,
                origin: p.origin,
            });

        let dosing = DosingEntryEntity::find()
            .filter(DosingEntryColumn::PeptideId.eq(peptide.id))
            .order_by_asc(DosingEntryColumn::Id)
            .all(self.conn())
            .await?
            .into_iter()
            .map(|d| DosingView {
                jurisdiction: code(d.jurisdiction_id),
                context: d.context,
                guidance: d.guidance,
                origin: d.origin,
            })
            .collect();

        let safety = SafetyEntryEntity::find()
            .filter(SafetyEntryColumn::PeptideId.eq(peptide.id))
            .order_by_asc(SafetyEntryColumn::Id)
            .all(self.conn())
            .await?
            .into_iter()
            .map(|s| SafetyView {
                jurisdiction: code(s.jurisdiction_id),
                adverse_effects: s.adverse_effects,
                contraindications: s.contraindications,
                interactions: s.interactions,
                monitoring: s.monitoring,
            })
            .collect();

        let use_cases: Vec<UseCaseView> = PeptideUseCaseEntity::find()
            .filter(PeptideUseCaseColumn::PeptideId.eq(peptide.id))
            .order_by_asc(PeptideUseCaseColumn::Id)
            .all(self.conn())
            .await?
            .into_iter()
            .map(|m| UseCaseView {
                use_case: use_case_slugs.get(&m.use_case_id).cloned().unwrap_or_default(),
                jurisdiction: code(m.jurisdiction_id),
                grade: m.grade.parse().unwrap_or_default(),
                consumer_summary: m.consumer_summary,
                clinician_summary: m.clinician_summary,
            })
            .collect();

        let regulatory = RegulatoryStatusEntity::find()
            .filter(RegulatoryStatusColumn::PeptideId.eq(peptide.id))
            .order_by_asc(RegulatoryStatusColumn::Id)
            .all(self.conn())
            .await?
            .into_iter()
            .map(|r| RegulatoryView {
                jurisdiction: code(r.jurisdiction_id),
                status: r.status,
                asserted_by: r.asserted_by,
            })
            .collect();

        let claims = self.claim_views(EntityRef::peptide(peptide.id)).await?;

        Ok(Some(PeptideView {
            best_grade: EvidenceGrade::best(use_cases.iter().map(|u| u.grade)),
            slug: peptide.slug,
            name: peptide.name,
            class_name: peptide.class_name,
            aliases,
            profile,
            dosing,
            safety,
            use_cases,
            regulatory,
            claims,
        }))
    }

    #[instrument(skip(self))]
    async fn vendor_view(&self, slug: &str) -> Result<Option<VendorView>> {
        let Some(vendor) = VendorEntity::find()
            .filter(VendorColumn::Slug.eq(slug))
            .filter(VendorColumn::IsPublished.eq(true))
            .one(self.conn())
            .await?
        else {
            return Ok(None);
        };

        let rating = self.current_rating(vendor.id).await?;
        let claims = self.claim_views(EntityRef::vendor(vendor.id)).await?;

        Ok(Some(VendorView {
            slug: vendor.slug,
            name: vendor.name,
            domain: vendor.domain,
            rating,
            claims,
        }))
    }

    async fn ping(&self) -> Result<()> {
        self.pool.ping().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{placeholder, DosingContext};
    use crate::config::DatabaseConfig;
    use chrono::NaiveDate;
    use tokio_test::assert_ok;

    const SCHEMA: &str = include_str!("../../../../migrations/0001_catalog.sql");
    static SCHEMA_APPLIED: tokio::sync::OnceCell<()> = tokio::sync::OnceCell::const_new();

    /// Repository over `DATABASE_URL` with the catalog schema applied
    async fn repository() -> Repository {
        let config = DatabaseConfig {
            url: std::env::var("DATABASE_URL").expect("DATABASE_URL must point at a test database"),
            ..Default::default()
        };
        let pool = DbPool::new(&config).await.unwrap();
        SCHEMA_APPLIED
            .get_or_init(|| async {
                pool.conn().execute_unprepared(SCHEMA).await.unwrap();
            })
            .await;
        Repository::new(pool)
    }

    fn unique(prefix: &str) -> String {
        let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default();
        format!("{prefix}-{nanos}")
    }

    async fn seed_peptide(repo: &Repository) -> (i64, i64) {
        let peptide = PeptideActiveModel {
            slug: Set(unique("semaglutide")),
            name: Set("Semaglutide".to_string()),
            class_name: Set(None),
            is_published: Set(true),
            ..Default::default()
        }
        .insert(repo.conn())
        .await
        .unwrap();
        let code = unique("J");
        let jurisdiction = JurisdictionActiveModel {
            code: Set(code.clone()),
            name: Set(code),
            ..Default::default()
        }
        .insert(repo.conn())
        .await
        .unwrap();
        (peptide.id, jurisdiction.id)
    }

    #[tokio::test]
    #[ignore] // Requires a Postgres 15+ instance at DATABASE_URL
    async fn test_generated_dosing_context_change_updates_in_place() {
        let repo = repository().await;
        let (peptide, jurisdiction) = seed_peptide(&repo).await;
        let study = DosingRecord {
            peptide_id: peptide,
            jurisdiction_id: jurisdiction,
            context: DosingContext::StudyReported,
            guidance: placeholder("Dosing reported in studies only."),
        };
        let label = DosingRecord {
            context: DosingContext::ApprovedLabel,
            guidance: "0.25 mg weekly".to_string(),
            ..study.clone()
        };

        assert_eq!(repo.upsert_dosing(&study).await.unwrap(), WriteOutcome::Inserted);
        assert_eq!(repo.upsert_dosing(&label).await.unwrap(), WriteOutcome::Updated);
        assert_eq!(repo.upsert_dosing(&label).await.unwrap(), WriteOutcome::Unchanged);

        let rows = DosingEntryEntity::find()
            .filter(DosingEntryColumn::PeptideId.eq(peptide))
            .all(repo.conn())
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].context, "approved-label");
        assert_eq!(rows[0].guidance, "0.25 mg weekly");
    }

    #[tokio::test]
    #[ignore] // Requires a Postgres 15+ instance at DATABASE_URL
    async fn test_generated_safety_refreshes_and_curated_survives() {
        let repo = repository().await;
        let (peptide, jurisdiction) = seed_peptide(&repo).await;
        let label = |text: &str| SafetyRecord {
            peptide_id: peptide,
            jurisdiction_id: jurisdiction,
            adverse_effects: text.to_string(),
            contraindications: text.to_string(),
            interactions: text.to_string(),
            monitoring: text.to_string(),
        };
        assert_ok!(repo.upsert_safety(&label("Nausea (label v1).")).await);

        // A curator takes over the monitoring field
        let row = SafetyEntryEntity::find()
            .filter(SafetyEntryColumn::PeptideId.eq(peptide))
            .one(repo.conn())
            .await
            .unwrap()
            .unwrap();
        let mut active: SafetyEntryActiveModel = row.into();
        active.monitoring = Set("Curated: check lipase quarterly.".to_string());
        active.generated_mask = Set(0b0111);
        active.update(repo.conn()).await.unwrap();

        let outcome = repo.upsert_safety(&label("Nausea, pancreatitis (label v2).")).await.unwrap();
        assert_eq!(outcome, WriteOutcome::Updated);
        let row = SafetyEntryEntity::find()
            .filter(SafetyEntryColumn::PeptideId.eq(peptide))
            .one(repo.conn())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.adverse_effects, "Nausea, pancreatitis (label v2).");
        assert_eq!(row.monitoring, "Curated: check lipase quarterly.");
        assert_eq!(row.generated_mask, 0b0111);
    }

    #[tokio::test]
    #[ignore] // Requires a Postgres 15+ instance at DATABASE_URL
    async fn test_citation_dedup_is_null_safe() {
        let repo = repository().await;
        let dated = CitationInput {
            url: unique("https://clinicaltrials.gov/search?term=Semaglutide"),
            title: Some("ClinicalTrials.gov: Semaglutide".to_string()),
            published_on: NaiveDate::from_ymd_opt(2024, 3, 1),
        };
        let undated = CitationInput {
            published_on: None,
            ..dated.clone()
        };

        let first = repo.find_or_create_citation(&dated).await.unwrap();
        let again = repo.find_or_create_citation(&dated).await.unwrap();
        assert!(first.created);
        assert_eq!(again, CitationRef { id: first.id, created: false });

        let bare = repo.find_or_create_citation(&undated).await.unwrap();
        let bare_again = repo.find_or_create_citation(&undated).await.unwrap();
        assert_ne!(bare.id, first.id);
        assert_eq!(bare.id, bare_again.id);
    }

    #[tokio::test]
    #[ignore] // Requires a Postgres 15+ instance at DATABASE_URL
    async fn test_snapshot_flip_leaves_one_current() {
        let repo = repository().await;
        let vendor = VendorActiveModel {
            slug: Set(unique("acme-labs")),
            name: Set("Acme Labs".to_string()),
            domain: Set(None),
            trust_signals: Set(serde_json::json!(["coa_published"])),
            is_published: Set(true),
            ..Default::default()
        }
        .insert(repo.conn())
        .await
        .unwrap();
        let first = RatingSnapshotInput {
            vendor_id: vendor.id,
            rating: Some(3.1),
            confidence: Some(0.42),
            method_version: "trust-v2".to_string(),
            reason_tags: vec!["signals:1".to_string()],
        };
        let second = RatingSnapshotInput {
            rating: Some(3.6),
            ..first.clone()
        };

        assert_eq!(repo.record_rating_snapshot(&first).await.unwrap(), WriteOutcome::Inserted);
        assert_eq!(repo.record_rating_snapshot(&second).await.unwrap(), WriteOutcome::Inserted);
        assert_eq!(repo.record_rating_snapshot(&second).await.unwrap(), WriteOutcome::Unchanged);

        let rows = VendorRatingSnapshotEntity::find()
            .filter(VendorRatingSnapshotColumn::VendorId.eq(vendor.id))
            .all(repo.conn())
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
        let current: Vec<_> = rows.iter().filter(|r| r.is_current).collect();
        assert_eq!(current.len(), 1);
        assert_eq!(current[0].rating, Some(3.6));
    }
}
