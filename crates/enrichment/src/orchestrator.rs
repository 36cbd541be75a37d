//! Enrichment orchestrator
//!
//! Visits entities one at a time with a polite delay between them. For each
//! entity the source adapters fan out under a concurrency cap, the merged
//! bundle is graded and synthesized, and every write goes through the
//! `CatalogStore`. A failing entity is counted and skipped; only missing
//! configuration or reference data stops a run before it starts.

use crate::adapters::{AdapterSet, EntityQuery, SourceAdapter, SourceRecord};
use crate::bundle::SourceBundle;
use crate::errors::EntityError;
use crate::fetch::FetchExecutor;
use crate::{grading, synthesis, vendor_trust};
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use peptrack_common::cache::LookupCache;
use peptrack_common::catalog::EntityRef;
use peptrack_common::config::{AppConfig, EnrichmentConfig, GradingConfig};
use peptrack_common::errors::{AppError, Result};
use peptrack_common::metrics;
use peptrack_common::store::{
    CatalogStore, ClaimRecord, DosingRecord, PeptideTarget, ProfileRecord, RegulatoryProposal,
    SafetyRecord, TargetSelector, UseCaseMappingRecord, VendorTarget,
};
use peptrack_common::EvidenceSource;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

const VENDOR_SECTIONS: [EvidenceSource; 2] = [EvidenceSource::Reddit, EvidenceSource::HackerNews];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunKind {
    Peptides,
    Vendors,
}

impl RunKind {
    fn metric_label(&self) -> &'static str {
        match self {
            RunKind::Peptides => "peptide",
            RunKind::Vendors => "vendor",
        }
    }
}

/// Aggregate counters for one run
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub kind: RunKind,
    pub scanned: u32,
    pub updated: u32,
    pub failed: u32,
    /// Entities each source produced a hit for, keyed by source
    pub source_hits: BTreeMap<String, u32>,
    pub cancelled: bool,
    pub deadline_reached: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunSummary {
    fn start(kind: RunKind) -> Self {
        let now = Utc::now();
        Self {
            run_id: Uuid::new_v4(),
            kind,
            scanned: 0,
            updated: 0,
            failed: 0,
            source_hits: BTreeMap::new(),
            cancelled: false,
            deadline_reached: false,
            started_at: now,
            finished_at: now,
        }
    }

    fn record_hits(&mut self, hits: &BTreeSet<EvidenceSource>) {
        for source in hits {
            *self.source_hits.entry(source.key().to_string()).or_default() += 1;
            metrics::record_source_hit(source.key());
        }
    }
}

/// What processing one entity achieved
struct EntityOutcome {
    changed: bool,
    hits: BTreeSet<EvidenceSource>,
}

/// Reference maps resolved once per run
struct ReferenceData {
    jurisdictions: Arc<HashMap<String, i64>>,
    use_cases: Arc<HashMap<String, i64>>,
    primary_jurisdiction_id: i64,
}

pub struct Orchestrator {
    store: Arc<dyn CatalogStore>,
    adapters: AdapterSet,
    config: EnrichmentConfig,
    grading: GradingConfig,
    jurisdictions: LookupCache<HashMap<String, i64>>,
    use_cases: LookupCache<HashMap<String, i64>>,
}

impl Orchestrator {
    pub fn new(
        store: Arc<dyn CatalogStore>,
        adapters: AdapterSet,
        config: EnrichmentConfig,
        grading: GradingConfig,
    ) -> Self {
        let ttl = config.lookup_cache_ttl();
        Self {
            store,
            adapters,
            config,
            grading,
            jurisdictions: LookupCache::new("jurisdictions", ttl),
            use_cases: LookupCache::new("use_cases", ttl),
        }
    }

    /// Wire live HTTP adapters from application configuration
    pub fn from_config(store: Arc<dyn CatalogStore>, config: &AppConfig) -> Result<Self> {
        let executor = Arc::new(FetchExecutor::new(&config.enrichment)?);
        let adapters = AdapterSet::http(executor, &config.sources);
        Ok(Self::new(
            store,
            adapters,
            config.enrichment.clone(),
            config.grading.clone(),
        ))
    }

    pub fn store(&self) -> &Arc<dyn CatalogStore> {
        &self.store
    }

    /// Forget cached reference maps so the next run reloads them
    pub async fn invalidate_caches(&self) {
        self.jurisdictions.invalidate().await;
        self.use_cases.invalidate().await;
    }

    async fn reference_data(&self) -> Result<ReferenceData> {
        let store = Arc::clone(&self.store);
        let jurisdictions = self
            .jurisdictions
            .get_or_load(|| async move { store.jurisdiction_ids().await })
            .await?;
        let store = Arc::clone(&self.store);
        let use_cases = self
            .use_cases
            .get_or_load(|| async move { store.use_case_ids().await })
            .await?;

        let primary = &self.config.primary_jurisdiction;
        let primary_jurisdiction_id = jurisdictions.get(primary).copied().ok_or_else(|| {
            AppError::configuration(format!(
                "primary jurisdiction '{}' is not in the jurisdictions table",
                primary
            ))
        })?;

        Ok(ReferenceData {
            jurisdictions,
            use_cases,
            primary_jurisdiction_id,
        })
    }

    /// Query every adapter for one entity, at most `adapter_concurrency` at a time
    async fn gather(&self, adapters: &[Arc<dyn SourceAdapter>], query: &EntityQuery) -> SourceBundle {
        let timeout = self.config.adapter_timeout();
        // Futures are built eagerly (they are lazy until polled) so the stream is
        // not generic over a closure, which trips higher-ranked `Send` inference
        let queries = adapters
            .iter()
            .cloned()
            .map(|adapter| async move {
                let source = adapter.source();
                match tokio::time::timeout(timeout, adapter.query(query)).await {
                    Ok(record) => record,
                    Err(_) => {
                        warn!(source = %source, slug = %query.slug, "Adapter timed out");
                        SourceRecord::empty(source)
                    }
                }
            })
            .collect::<Vec<_>>();
        let records: Vec<SourceRecord> = stream::iter(queries)
            .buffer_unordered(self.config.adapter_concurrency.max(1))
            .collect()
            .await;
        SourceBundle::from_records(records)
    }

    /// Apply the configured batch size when the caller named no limit or slugs
    fn bounded(&self, selector: &TargetSelector) -> TargetSelector {
        let mut selector = selector.clone();
        if selector.limit.is_none() && selector.slugs.is_empty() && self.config.batch_size > 0 {
            selector.limit = Some(self.config.batch_size);
        }
        selector
    }

    /// Sleep between entities; false when the run should stop
    async fn pause(&self, cancel: &CancellationToken) -> bool {
        tokio::select! {
            _ = cancel.cancelled() => false,
            _ = tokio::time::sleep(self.config.entity_delay()) => true,
        }
    }

    /// Enrich peptides matching `selector`
    #[instrument(skip(self, cancel), fields(limit = ?selector.limit))]
    pub async fn run_peptides(
        &self,
        selector: &TargetSelector,
        cancel: CancellationToken,
    ) -> Result<RunSummary> {
        let refs = self.reference_data().await?;
        let targets = self.store.list_peptide_targets(&self.bounded(selector)).await?;
        info!(targets = targets.len(), "Starting peptide enrichment run");

        let mut summary = RunSummary::start(RunKind::Peptides);
        let deadline = self.config.run_deadline().map(|d| Instant::now() + d);

        for (index, target) in targets.iter().enumerate() {
            if index > 0 && !self.pause(&cancel).await {
                summary.cancelled = true;
                break;
            }
            if cancel.is_cancelled() {
                summary.cancelled = true;
                break;
            }
            if deadline.is_some_and(|d| Instant::now() >= d) {
                summary.deadline_reached = true;
                break;
            }

            let started = Instant::now();
            summary.scanned += 1;
            let result = tokio::time::timeout(
                self.config.entity_timeout(),
                self.enrich_peptide(target, &refs),
            )
            .await
            .unwrap_or_else(|_| {
                Err(EntityError::Timeout {
                    slug: target.slug.clone(),
                    timeout_secs: self.config.entity_timeout_secs,
                })
            });

            let outcome = self.tally(&mut summary, &target.slug, result);
            metrics::record_entity(
                RunKind::Peptides.metric_label(),
                outcome,
                started.elapsed().as_secs_f64(),
            );
        }

        Ok(self.finish(summary))
    }

    /// Rescore vendors matching `selector`
    #[instrument(skip(self, cancel), fields(limit = ?selector.limit))]
    pub async fn run_vendors(
        &self,
        selector: &TargetSelector,
        cancel: CancellationToken,
    ) -> Result<RunSummary> {
        let targets = self.store.list_vendor_targets(&self.bounded(selector)).await?;
        info!(targets = targets.len(), "Starting vendor enrichment run");

        let mut summary = RunSummary::start(RunKind::Vendors);
        let deadline = self.config.run_deadline().map(|d| Instant::now() + d);

        for (index, target) in targets.iter().enumerate() {
            if index > 0 && !self.pause(&cancel).await {
                summary.cancelled = true;
                break;
            }
            if cancel.is_cancelled() {
                summary.cancelled = true;
                break;
            }
            if deadline.is_some_and(|d| Instant::now() >= d) {
                summary.deadline_reached = true;
                break;
            }

            let started = Instant::now();
            summary.scanned += 1;
            let result = tokio::time::timeout(self.config.entity_timeout(), self.enrich_vendor(target))
                .await
                .unwrap_or_else(|_| {
                    Err(EntityError::Timeout {
                        slug: target.slug.clone(),
                        timeout_secs: self.config.entity_timeout_secs,
                    })
                });

            let outcome = self.tally(&mut summary, &target.slug, result);
            metrics::record_entity(
                RunKind::Vendors.metric_label(),
                outcome,
                started.elapsed().as_secs_f64(),
            );
        }

        Ok(self.finish(summary))
    }

    fn tally(
        &self,
        summary: &mut RunSummary,
        slug: &str,
        result: std::result::Result<EntityOutcome, EntityError>,
    ) -> &'static str {
        match result {
            Ok(outcome) => {
                summary.record_hits(&outcome.hits);
                if outcome.changed {
                    summary.updated += 1;
                    "updated"
                } else {
                    "unchanged"
                }
            }
            Err(e @ EntityError::Timeout { .. }) => {
                summary.failed += 1;
                error!(slug, error = %e, "Entity timed out");
                "timeout"
            }
            Err(e) => {
                summary.failed += 1;
                error!(slug, error = %e, "Entity failed");
                "failed"
            }
        }
    }

    fn finish(&self, mut summary: RunSummary) -> RunSummary {
        summary.finished_at = Utc::now();
        info!(
            run_id = %summary.run_id,
            scanned = summary.scanned,
            updated = summary.updated,
            failed = summary.failed,
            cancelled = summary.cancelled,
            deadline_reached = summary.deadline_reached,
            "Enrichment run finished"
        );
        summary
    }

    #[instrument(skip(self, target, refs), fields(slug = %target.slug))]
    async fn enrich_peptide(
        &self,
        target: &PeptideTarget,
        refs: &ReferenceData,
    ) -> std::result::Result<EntityOutcome, EntityError> {
        let query = EntityQuery::peptide(target);
        let bundle = self.gather(&self.adapters.peptide, &query).await;
        let grade = grading::infer_grade(&bundle, &self.grading);
        debug!(
            grade = %grade,
            rule = grading::explain(&bundle, &self.grading),
            hits = bundle.hits.len(),
            "Graded bundle"
        );

        let content = synthesis::synthesize(&target.name, target.class_name.as_deref(), &bundle, grade);
        let store = &self.store;
        let jurisdiction_id = refs.primary_jurisdiction_id;
        let mut changed = false;

        let profile = content.profile;
        changed |= store
            .upsert_profile(&ProfileRecord {
                peptide_id: target.id,
                intro: profile.intro,
                mechanism: profile.mechanism,
                effectiveness: profile.effectiveness,
                long_description: profile.long_description,
            })
            .await?
            .changed();

        let safety = content.safety;
        changed |= store
            .upsert_safety(&SafetyRecord {
                peptide_id: target.id,
                jurisdiction_id,
                adverse_effects: safety.adverse_effects,
                contraindications: safety.contraindications,
                interactions: safety.interactions,
                monitoring: safety.monitoring,
            })
            .await?
            .changed();

        changed |= store
            .upsert_dosing(&DosingRecord {
                peptide_id: target.id,
                jurisdiction_id,
                context: content.dosing.context,
                guidance: content.dosing.guidance,
            })
            .await?
            .changed();

        for use_case in content.use_cases {
            let Some(use_case_id) = refs.use_cases.get(use_case.slug).copied() else {
                warn!(use_case = use_case.slug, "Use case missing from reference data");
                continue;
            };
            changed |= store
                .upsert_use_case_mapping(&UseCaseMappingRecord {
                    peptide_id: target.id,
                    use_case_id,
                    jurisdiction_id,
                    grade: use_case.grade,
                    consumer_summary: use_case.consumer_summary,
                    clinician_summary: use_case.clinician_summary,
                })
                .await?
                .changed();
        }

        let mut jurisdictions: Vec<(&String, &i64)> = refs.jurisdictions.iter().collect();
        jurisdictions.sort();
        for (code, id) in jurisdictions {
            changed |= store
                .upsert_regulatory_status(&RegulatoryProposal {
                    peptide_id: target.id,
                    jurisdiction_id: *id,
                    status: synthesis::regulatory_status(&bundle, code),
                })
                .await?
                .changed();
        }

        changed |= self
            .write_claims(EntityRef::peptide(target.id), &EvidenceSource::ALL, content.claims)
            .await?;

        Ok(EntityOutcome {
            changed,
            hits: bundle.hits,
        })
    }

    #[instrument(skip(self, target), fields(slug = %target.slug))]
    async fn enrich_vendor(
        &self,
        target: &VendorTarget,
    ) -> std::result::Result<EntityOutcome, EntityError> {
        let query = EntityQuery::vendor(target);
        let bundle = self.gather(&self.adapters.vendor, &query).await;

        let stats = bundle.social_stats();
        let trust = vendor_trust::score(&target.trust_signals, target.listing_count, stats.as_ref());
        debug!(rating = ?trust.rating, confidence = ?trust.confidence, "Scored vendor");

        let mut changed = self
            .store
            .record_rating_snapshot(&trust.snapshot_input(target.id))
            .await?
            .changed();

        let claims = synthesis::vendor_claims(&target.name, &bundle);
        changed |= self
            .write_claims(EntityRef::vendor(target.id), &VENDOR_SECTIONS, claims)
            .await?;

        Ok(EntityOutcome {
            changed,
            hits: bundle.hits,
        })
    }

    /// Resolve citations, then swap the entity's generated claims in `sections`
    async fn write_claims(
        &self,
        entity: EntityRef,
        sections: &[EvidenceSource],
        claims: Vec<synthesis::GeneratedClaim>,
    ) -> Result<bool> {
        let mut created_citation = false;
        let mut records = Vec::with_capacity(claims.len());

        for claim in claims {
            let citation = self.store.find_or_create_citation(&claim.citation).await?;
            created_citation |= citation.created;
            records.push(ClaimRecord {
                section: claim.source,
                text: claim.text,
                grade: claim.grade,
                citation_id: Some(citation.id),
            });
        }

        let outcome = self
            .store
            .replace_generated_claims(entity, sections, records)
            .await?;
        Ok(created_citation || outcome.changed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::SourcePayload;
    use crate::bundle::{CommunitySnapshot, LabelSnapshot, TrialSnapshot, UgcPost};
    use crate::sentiment;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use peptrack_common::catalog::{ClaimSection, RegulatoryStatus};
    use peptrack_common::store::{MemoryStore, RowCounts};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio_test::assert_ok;

    struct StubAdapter {
        record: SourceRecord,
        calls: AtomicUsize,
        delay: Duration,
    }

    impl StubAdapter {
        fn new(record: SourceRecord) -> Arc<Self> {
            Arc::new(Self {
                record,
                calls: AtomicUsize::new(0),
                delay: Duration::ZERO,
            })
        }

        fn slow(source: EvidenceSource, delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                record: SourceRecord::empty(source),
                calls: AtomicUsize::new(0),
                delay,
            })
        }
    }

    #[async_trait]
    impl SourceAdapter for StubAdapter {
        fn source(&self) -> EvidenceSource {
            self.record.source
        }

        async fn query(&self, _query: &EntityQuery) -> SourceRecord {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.record.clone()
        }
    }

    fn trials_record() -> SourceRecord {
        SourceRecord {
            source: EvidenceSource::ClinicalTrials,
            query_url: Some("https://api.test/studies?query.term=Semaglutide".into()),
            citation_url: Some("https://clinicaltrials.gov/search?term=Semaglutide".into()),
            payload: SourcePayload::Trials(TrialSnapshot {
                total: 9,
                completed: 6,
                max_phase: 3.0,
                conditions: vec!["Obesity".into()],
                latest_start: NaiveDate::from_ymd_opt(2022, 6, 1),
                ..TrialSnapshot::default()
            }),
        }
    }

    fn label_record() -> SourceRecord {
        SourceRecord {
            source: EvidenceSource::OpenFda,
            query_url: Some("https://api.test/drug/label.json".into()),
            citation_url: Some(
                "https://dailymed.nlm.nih.gov/dailymed/search.cfm?labeltype=all&query=Semaglutide".into(),
            ),
            payload: SourcePayload::Label(LabelSnapshot {
                found: true,
                jurisdiction: "US".into(),
                dosage: Some("0.25 mg weekly".into()),
                adverse_reactions: Some("Nausea".into()),
                ..LabelSnapshot::default()
            }),
        }
    }

    fn reddit_record(text: &str) -> SourceRecord {
        SourceRecord {
            source: EvidenceSource::Reddit,
            query_url: None,
            citation_url: Some("https://www.reddit.com/search/?q=Acme".into()),
            payload: SourcePayload::Community(CommunitySnapshot {
                source: EvidenceSource::Reddit,
                posts: vec![UgcPost {
                    platform: EvidenceSource::Reddit,
                    title: "Acme".into(),
                    author: None,
                    url: "https://www.reddit.com/r/x/1".into(),
                    created_at: None,
                    score: 1,
                    matched_term: "Acme".into(),
                    quote: Some(text.to_string()),
                    sentiment: sentiment::score(text),
                }],
            }),
        }
    }

    fn config() -> EnrichmentConfig {
        EnrichmentConfig {
            entity_delay_ms: 0,
            ..EnrichmentConfig::default()
        }
    }

    struct Fixture {
        store: Arc<MemoryStore>,
        us: i64,
        eu: i64,
        semaglutide: i64,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let us = store.add_jurisdiction("US").await;
        let eu = store.add_jurisdiction("EU").await;
        for slug in ["weight-management", "glycemic-control", synthesis::FALLBACK_USE_CASE] {
            store.add_use_case(slug).await;
        }
        let semaglutide = store
            .add_peptide("Semaglutide", Some("GLP-1 agonist"), &["Ozempic"])
            .await;
        Fixture {
            store,
            us,
            eu,
            semaglutide,
        }
    }

    fn orchestrator(store: Arc<MemoryStore>, peptide: Vec<Arc<dyn SourceAdapter>>) -> Orchestrator {
        Orchestrator::new(
            store,
            AdapterSet {
                peptide,
                vendor: vec![StubAdapter::new(reddit_record("Acme is legit and reliable, recommend."))],
            },
            config(),
            GradingConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_second_run_is_idempotent() {
        let f = fixture().await;
        let orch = orchestrator(
            f.store.clone(),
            vec![StubAdapter::new(trials_record()), StubAdapter::new(label_record())],
        );

        let first = assert_ok!(
            orch.run_peptides(&TargetSelector::default(), CancellationToken::new())
                .await
        );
        assert_eq!(first.scanned, 1);
        assert_eq!(first.updated, 1);
        assert_eq!(first.failed, 0);
        assert_eq!(first.source_hits.get("clinicaltrials"), Some(&1));
        assert_eq!(first.source_hits.get("openfda"), Some(&1));
        let after_first: RowCounts = f.store.row_counts().await;
        let view_first = f.store.peptide_view("semaglutide").await.unwrap();

        let second = orch
            .run_peptides(&TargetSelector::default(), CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(second.updated, 0);
        assert_eq!(f.store.row_counts().await, after_first);
        assert_eq!(
            serde_json::to_value(f.store.peptide_view("semaglutide").await.unwrap()).unwrap(),
            serde_json::to_value(view_first).unwrap()
        );
    }

    #[tokio::test]
    async fn test_citations_deduplicated_across_runs() {
        let f = fixture().await;
        let orch = orchestrator(f.store.clone(), vec![StubAdapter::new(trials_record())]);

        for _ in 0..2 {
            orch.run_peptides(&TargetSelector::default(), CancellationToken::new())
                .await
                .unwrap();
        }
        assert_eq!(f.store.row_counts().await.citations, 1);
    }

    #[tokio::test]
    async fn test_writes_grade_a_content() {
        let f = fixture().await;
        let orch = orchestrator(
            f.store.clone(),
            vec![StubAdapter::new(trials_record()), StubAdapter::new(label_record())],
        );
        orch.run_peptides(&TargetSelector::default(), CancellationToken::new())
            .await
            .unwrap();

        let view = f.store.peptide_view("semaglutide").await.unwrap().unwrap();
        assert_eq!(view.best_grade, peptrack_common::EvidenceGrade::A);
        assert!(view.use_cases.iter().any(|u| u.use_case == "weight-management"));

        assert_eq!(
            f.store.regulatory_for(f.semaglutide, f.us).await.map(|r| r.0),
            Some(RegulatoryStatus::Approved)
        );
        assert_eq!(
            f.store.regulatory_for(f.semaglutide, f.eu).await.map(|r| r.0),
            Some(RegulatoryStatus::Investigational)
        );

        let safety = f.store.safety_for(f.semaglutide, f.us).await.unwrap();
        assert_eq!(safety.adverse_effects, "Nausea");

        let claims = f.store.claims_for(EntityRef::peptide(f.semaglutide)).await;
        assert_eq!(claims.len(), 2);
        assert!(claims
            .iter()
            .all(|(section, _)| matches!(section, ClaimSection::Generated(_))));
    }

    #[tokio::test]
    async fn test_store_failure_is_counted_not_fatal() {
        let f = fixture().await;
        let other = f.store.add_peptide("BPC-157", None, &[]).await;
        f.store.fail_writes_for(f.semaglutide).await;
        let orch = orchestrator(f.store.clone(), vec![StubAdapter::new(trials_record())]);

        let summary = orch
            .run_peptides(&TargetSelector::default(), CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(summary.scanned, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.updated, 1);
        assert!(f.store.safety_for(other, f.us).await.is_some());
    }

    #[tokio::test]
    async fn test_slow_adapter_degrades_to_empty() {
        let f = fixture().await;
        let slow = StubAdapter::slow(EvidenceSource::PubMed, Duration::from_secs(5));
        let mut config = config();
        config.adapter_timeout_secs = 1;
        let orch = Orchestrator::new(
            f.store.clone(),
            AdapterSet {
                peptide: vec![slow.clone(), StubAdapter::new(trials_record())],
                vendor: vec![],
            },
            config,
            GradingConfig::default(),
        );

        let summary = orch
            .run_peptides(&TargetSelector::default(), CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(summary.failed, 0);
        assert_eq!(summary.source_hits.get("pubmed"), None);
        assert_eq!(slow.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_missing_primary_jurisdiction_fails_before_processing() {
        let store = Arc::new(MemoryStore::new());
        store.add_jurisdiction("EU").await;
        store.add_peptide("Semaglutide", None, &[]).await;
        let adapter = StubAdapter::new(trials_record());
        let orch = orchestrator(store, vec![adapter.clone()]);

        let result = orch
            .run_peptides(&TargetSelector::default(), CancellationToken::new())
            .await;
        assert!(matches!(result, Err(AppError::Configuration { .. })));
        assert_eq!(adapter.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cancelled_run_stops_before_next_entity() {
        let f = fixture().await;
        f.store.add_peptide("BPC-157", None, &[]).await;
        let orch = orchestrator(f.store.clone(), vec![StubAdapter::new(trials_record())]);

        let cancel = CancellationToken::new();
        cancel.cancel();
        let summary = orch
            .run_peptides(&TargetSelector::default(), cancel)
            .await
            .unwrap();
        assert!(summary.cancelled);
        assert_eq!(summary.scanned, 0);
    }

    #[tokio::test]
    async fn test_selector_limits_targets() {
        let f = fixture().await;
        f.store.add_peptide("BPC-157", None, &[]).await;
        let orch = orchestrator(f.store.clone(), vec![StubAdapter::new(trials_record())]);

        let summary = orch
            .run_peptides(&TargetSelector::slugs(["bpc-157"]), CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(summary.scanned, 1);
    }

    #[tokio::test]
    async fn test_batch_size_bounds_unscoped_runs() {
        let f = fixture().await;
        f.store.add_peptide("BPC-157", None, &[]).await;
        f.store.add_peptide("TB-500", None, &[]).await;
        let orch = Orchestrator::new(
            f.store.clone(),
            AdapterSet {
                peptide: vec![],
                vendor: vec![],
            },
            EnrichmentConfig {
                batch_size: 2,
                ..config()
            },
            GradingConfig::default(),
        );

        let unscoped = orch
            .run_peptides(&TargetSelector::default(), CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(unscoped.scanned, 2);

        let explicit = orch
            .run_peptides(&TargetSelector::limit(3), CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(explicit.scanned, 3);
    }

    #[tokio::test]
    async fn test_vendor_run_snapshots_once() {
        let store = Arc::new(MemoryStore::new());
        let acme = store
            .add_vendor("Acme", Some("acme.test"), &["third_party_testing"], 4)
            .await;
        let unrated = store.add_vendor("Quiet Labs", None, &[], 0).await;
        let orch = Orchestrator::new(
            store.clone(),
            AdapterSet {
                peptide: vec![],
                vendor: vec![StubAdapter::new(reddit_record("Acme is legit and reliable, recommend."))],
            },
            config(),
            GradingConfig::default(),
        );

        let first = orch
            .run_vendors(&TargetSelector::default(), CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(first.scanned, 2);
        let second = orch
            .run_vendors(&TargetSelector::default(), CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(second.updated, 0);

        let snapshots = store.snapshots_for(acme).await;
        assert_eq!(snapshots.len(), 1);
        assert!(snapshots[0].is_current);
        assert!(snapshots[0].rating.is_some());

        let unrated_snapshots = store.snapshots_for(unrated).await;
        assert_eq!(unrated_snapshots[0].rating, None);
        assert_eq!(unrated_snapshots[0].confidence, None);

        let claims = store.claims_for(EntityRef::vendor(acme)).await;
        assert_eq!(claims.len(), 1);
        assert_eq!(claims[0].0, ClaimSection::Generated(EvidenceSource::Reddit));
    }
}
