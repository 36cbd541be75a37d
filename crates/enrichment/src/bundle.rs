//! Normalized per-source snapshots and the merged per-entity bundle

use crate::adapters::{SourcePayload, SourceRecord};
use crate::sentiment::Sentiment;
use chrono::{DateTime, NaiveDate, Utc};
use peptrack_common::EvidenceSource;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Trial registry tallies for one search
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TrialSnapshot {
    pub total: u32,
    pub completed: u32,
    pub recruiting: u32,
    pub active: u32,
    pub terminated: u32,
    /// Highest development phase seen, 0 when no phase is reported
    pub max_phase: f32,
    pub conditions: Vec<String>,
    pub latest_start: Option<NaiveDate>,
    pub titles: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LiteratureRecord {
    pub pmid: String,
    pub title: String,
    pub year: Option<i32>,
    pub journal: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LiteratureSnapshot {
    /// Total index hits, not just the summarized records
    pub count: u64,
    pub records: Vec<LiteratureRecord>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LabelSnapshot {
    pub found: bool,
    /// Jurisdiction whose regulator issued the label
    pub jurisdiction: String,
    pub brand_names: Vec<String>,
    pub indications: Option<String>,
    pub dosage: Option<String>,
    pub contraindications: Option<String>,
    pub warnings: Option<String>,
    pub adverse_reactions: Option<String>,
    pub interactions: Option<String>,
    pub effective_date: Option<NaiveDate>,
    pub set_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CompoundSnapshot {
    pub cid: Option<u64>,
    pub formula: Option<String>,
    pub weight: Option<f64>,
    pub iupac: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MoleculeSnapshot {
    pub chembl_id: Option<String>,
    pub pref_name: Option<String>,
    pub max_phase: f32,
    pub mechanisms: Vec<String>,
    pub indications: Vec<String>,
}

/// One scored community post
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UgcPost {
    pub platform: EvidenceSource,
    pub title: String,
    pub author: Option<String>,
    pub url: String,
    pub created_at: Option<DateTime<Utc>>,
    pub score: i64,
    pub matched_term: String,
    pub quote: Option<String>,
    pub sentiment: Sentiment,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommunitySnapshot {
    pub source: EvidenceSource,
    pub posts: Vec<UgcPost>,
}

/// Aggregate social statistics across discussion sources
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct SocialStats {
    pub review_count: u32,
    pub average_sentiment: f32,
    pub distinct_sources: u32,
}

/// Everything the adapters learned about one entity
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SourceBundle {
    pub trials: TrialSnapshot,
    pub literature: LiteratureSnapshot,
    pub label: LabelSnapshot,
    pub compound: CompoundSnapshot,
    pub molecule: MoleculeSnapshot,
    /// Ordered by source
    pub community: Vec<CommunitySnapshot>,
    pub query_urls: BTreeMap<EvidenceSource, String>,
    pub citation_urls: BTreeMap<EvidenceSource, String>,
    /// Sources that returned something usable
    pub hits: BTreeSet<EvidenceSource>,
}

impl SourceBundle {
    /// Merge adapter records; the result does not depend on arrival order
    pub fn from_records(records: impl IntoIterator<Item = SourceRecord>) -> Self {
        let mut bundle = SourceBundle::default();

        for record in records {
            let source = record.source;
            if let Some(url) = record.query_url {
                bundle.query_urls.insert(source, url);
            }

            let hit = match record.payload {
                SourcePayload::Trials(trials) => {
                    let hit = trials.total > 0;
                    bundle.trials = trials;
                    hit
                }
                SourcePayload::Literature(literature) => {
                    let hit = literature.count > 0;
                    bundle.literature = literature;
                    hit
                }
                SourcePayload::Label(label) => {
                    let hit = label.found;
                    bundle.label = label;
                    hit
                }
                SourcePayload::Compound(compound) => {
                    let hit = compound.cid.is_some();
                    bundle.compound = compound;
                    hit
                }
                SourcePayload::Molecule(molecule) => {
                    let hit = molecule.chembl_id.is_some();
                    bundle.molecule = molecule;
                    hit
                }
                SourcePayload::Community(community) => {
                    let hit = !community.posts.is_empty();
                    if hit {
                        bundle.community.push(community);
                    }
                    hit
                }
                SourcePayload::Empty => false,
            };

            if hit {
                bundle.hits.insert(source);
                if let Some(url) = record.citation_url {
                    bundle.citation_urls.insert(source, url);
                }
            }
        }

        bundle.community.sort_by_key(|c| c.source);
        bundle
    }

    pub fn has_hit(&self, source: EvidenceSource) -> bool {
        self.hits.contains(&source)
    }

    /// Highest phase reported by either the trial registry or ChEMBL
    pub fn max_phase(&self) -> f32 {
        self.trials.max_phase.max(self.molecule.max_phase)
    }

    pub fn community_for(&self, source: EvidenceSource) -> Option<&CommunitySnapshot> {
        self.community.iter().find(|c| c.source == source)
    }

    pub fn social_stats(&self) -> Option<SocialStats> {
        let posts: Vec<&UgcPost> = self.community.iter().flat_map(|c| &c.posts).collect();
        if posts.is_empty() {
            return None;
        }
        let total: f32 = posts.iter().map(|p| p.sentiment.value).sum();
        Some(SocialStats {
            review_count: posts.len() as u32,
            average_sentiment: total / posts.len() as f32,
            distinct_sources: self.community.len() as u32,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sentiment::{Sentiment, SentimentLabel};

    fn post(platform: EvidenceSource, value: f32) -> UgcPost {
        UgcPost {
            platform,
            title: "post".into(),
            author: None,
            url: "https://example.test/p".into(),
            created_at: None,
            score: 1,
            matched_term: "x".into(),
            quote: None,
            sentiment: Sentiment {
                value,
                label: SentimentLabel::Positive,
            },
        }
    }

    #[test]
    fn test_from_records_marks_hits_only_for_useful_payloads() {
        let records = vec![
            SourceRecord {
                source: EvidenceSource::ClinicalTrials,
                query_url: Some("q-ct".into()),
                citation_url: Some("c-ct".into()),
                payload: SourcePayload::Trials(TrialSnapshot {
                    total: 3,
                    ..Default::default()
                }),
            },
            SourceRecord {
                source: EvidenceSource::OpenFda,
                query_url: Some("q-fda".into()),
                citation_url: Some("c-fda".into()),
                payload: SourcePayload::Label(LabelSnapshot::default()),
            },
            SourceRecord::empty(EvidenceSource::PubMed),
        ];

        let bundle = SourceBundle::from_records(records);
        assert!(bundle.has_hit(EvidenceSource::ClinicalTrials));
        assert!(!bundle.has_hit(EvidenceSource::OpenFda));
        assert!(!bundle.has_hit(EvidenceSource::PubMed));
        assert_eq!(bundle.citation_urls.len(), 1);
        assert_eq!(bundle.query_urls.len(), 2);
        assert_eq!(bundle.trials.total, 3);
    }

    #[test]
    fn test_community_order_is_stable() {
        let hn = SourceRecord {
            source: EvidenceSource::HackerNews,
            query_url: None,
            citation_url: None,
            payload: SourcePayload::Community(CommunitySnapshot {
                source: EvidenceSource::HackerNews,
                posts: vec![post(EvidenceSource::HackerNews, 0.5)],
            }),
        };
        let reddit = SourceRecord {
            source: EvidenceSource::Reddit,
            query_url: None,
            citation_url: None,
            payload: SourcePayload::Community(CommunitySnapshot {
                source: EvidenceSource::Reddit,
                posts: vec![post(EvidenceSource::Reddit, -0.5), post(EvidenceSource::Reddit, 0.3)],
            }),
        };

        let a = SourceBundle::from_records(vec![hn.clone(), reddit.clone()]);
        let b = SourceBundle::from_records(vec![reddit, hn]);
        assert_eq!(a, b);

        let stats = a.social_stats().unwrap();
        assert_eq!(stats.review_count, 3);
        assert_eq!(stats.distinct_sources, 2);
        assert!((stats.average_sentiment - 0.1).abs() < 1e-6);
    }

    #[test]
    fn test_max_phase_uses_both_sources() {
        let mut bundle = SourceBundle::default();
        bundle.trials.max_phase = 2.0;
        bundle.molecule.max_phase = 4.0;
        assert_eq!(bundle.max_phase(), 4.0);
        assert!(bundle.social_stats().is_none());
    }
}
