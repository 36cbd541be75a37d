//! ClinicalTrials.gov v2 study search

use super::{distinct, parse_partial_date, EntityQuery, SourceAdapter, SourcePayload, SourceRecord};
use crate::bundle::TrialSnapshot;
use crate::fetch::{build_url, FetchExecutor};
use async_trait::async_trait;
use peptrack_common::config::SourcesConfig;
use peptrack_common::EvidenceSource;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

const MAX_CONDITIONS: usize = 12;
const MAX_TITLES: usize = 5;

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct StudiesResponse {
    studies: Vec<Study>,
    total_count: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct Study {
    protocol_section: ProtocolSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ProtocolSection {
    identification_module: IdentificationModule,
    status_module: StatusModule,
    conditions_module: ConditionsModule,
    design_module: DesignModule,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct IdentificationModule {
    nct_id: Option<String>,
    brief_title: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct StatusModule {
    overall_status: Option<String>,
    start_date_struct: Option<DateStruct>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DateStruct {
    date: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConditionsModule {
    conditions: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DesignModule {
    phases: Vec<String>,
}

fn phase_value(phase: &str) -> f32 {
    match phase {
        "EARLY_PHASE1" => 0.5,
        "PHASE1" => 1.0,
        "PHASE2" => 2.0,
        "PHASE3" => 3.0,
        "PHASE4" => 4.0,
        _ => 0.0,
    }
}

fn into_snapshot(response: StudiesResponse) -> TrialSnapshot {
    let mut snapshot = TrialSnapshot {
        total: response
            .total_count
            .unwrap_or(response.studies.len() as u32),
        ..TrialSnapshot::default()
    };

    let mut conditions = Vec::new();
    let mut titles = Vec::new();

    for study in response.studies {
        let protocol = study.protocol_section;

        match protocol.status_module.overall_status.as_deref() {
            Some("COMPLETED") => snapshot.completed += 1,
            Some("RECRUITING" | "NOT_YET_RECRUITING" | "ENROLLING_BY_INVITATION") => {
                snapshot.recruiting += 1
            }
            Some("ACTIVE_NOT_RECRUITING") => snapshot.active += 1,
            Some("TERMINATED" | "WITHDRAWN" | "SUSPENDED") => snapshot.terminated += 1,
            _ => {}
        }

        for phase in &protocol.design_module.phases {
            snapshot.max_phase = snapshot.max_phase.max(phase_value(phase));
        }

        let start = protocol
            .status_module
            .start_date_struct
            .and_then(|d| d.date)
            .and_then(|d| parse_partial_date(&d));
        if start > snapshot.latest_start {
            snapshot.latest_start = start;
        }

        conditions.extend(protocol.conditions_module.conditions);
        if let Some(title) = protocol.identification_module.brief_title {
            titles.push(title);
        }
    }

    snapshot.conditions = distinct(conditions, MAX_CONDITIONS);
    snapshot.titles = distinct(titles, MAX_TITLES);
    snapshot
}

pub struct ClinicalTrialsAdapter {
    executor: Arc<FetchExecutor>,
    base: String,
    page_size: u32,
}

impl ClinicalTrialsAdapter {
    pub fn new(executor: Arc<FetchExecutor>, sources: &SourcesConfig) -> Self {
        Self {
            executor,
            base: sources.clinical_trials_base.clone(),
            page_size: sources.trial_page_size,
        }
    }
}

#[async_trait]
impl SourceAdapter for ClinicalTrialsAdapter {
    fn source(&self) -> EvidenceSource {
        EvidenceSource::ClinicalTrials
    }

    #[instrument(skip(self, query), fields(slug = %query.slug, source = "clinicaltrials"))]
    async fn query(&self, query: &EntityQuery) -> SourceRecord {
        let term = query.terms().join(" OR ");
        if term.is_empty() {
            return SourceRecord::empty(self.source());
        }

        let page_size = self.page_size.to_string();
        let url = match build_url(
            &self.base,
            &["studies"],
            &[
                ("query.term", term.as_str()),
                ("pageSize", page_size.as_str()),
                ("countTotal", "true"),
            ],
        ) {
            Ok(url) => url,
            Err(e) => {
                warn!(error = %e, "Bad trial registry URL");
                return SourceRecord::empty(self.source());
            }
        };
        let query_url = url.to_string();

        match self.executor.fetch_json::<StudiesResponse>(url).await {
            Ok(response) => {
                let snapshot = into_snapshot(response);
                debug!(total = snapshot.total, completed = snapshot.completed, "Trials found");
                let citation_url = build_url(
                    "https://clinicaltrials.gov/search",
                    &[],
                    &[("term", query.primary_term().as_str())],
                )
                .ok()
                .map(|u| u.to_string());
                SourceRecord {
                    source: self.source(),
                    query_url: Some(query_url),
                    citation_url,
                    payload: SourcePayload::Trials(snapshot),
                }
            }
            Err(e) => {
                warn!(error = %e, "Trial registry unavailable");
                SourceRecord::absent(self.source(), Some(query_url))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use peptrack_common::config::EnrichmentConfig;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fixture() -> serde_json::Value {
        serde_json::json!({
            "totalCount": 7,
            "studies": [
                {"protocolSection": {
                    "identificationModule": {"nctId": "NCT1", "briefTitle": "Semaglutide in Obesity"},
                    "statusModule": {"overallStatus": "COMPLETED", "startDateStruct": {"date": "2019-05"}},
                    "conditionsModule": {"conditions": ["Obesity", "Type 2 Diabetes"]},
                    "designModule": {"phases": ["PHASE3"]}
                }},
                {"protocolSection": {
                    "identificationModule": {"nctId": "NCT2"},
                    "statusModule": {"overallStatus": "RECRUITING", "startDateStruct": {"date": "2023-01-10"}},
                    "conditionsModule": {"conditions": ["obesity"]},
                    "designModule": {"phases": ["PHASE2", "PHASE3"]}
                }},
                {"protocolSection": {
                    "statusModule": {"overallStatus": "TERMINATED"}
                }},
                {}
            ]
        })
    }

    #[test]
    fn test_snapshot_tallies() {
        let response: StudiesResponse = serde_json::from_value(fixture()).unwrap();
        let snapshot = into_snapshot(response);
        assert_eq!(snapshot.total, 7);
        assert_eq!(snapshot.completed, 1);
        assert_eq!(snapshot.recruiting, 1);
        assert_eq!(snapshot.terminated, 1);
        assert_eq!(snapshot.max_phase, 3.0);
        assert_eq!(snapshot.latest_start, NaiveDate::from_ymd_opt(2023, 1, 10));
        assert_eq!(snapshot.conditions, vec!["Obesity", "Type 2 Diabetes"]);
        assert_eq!(snapshot.titles, vec!["Semaglutide in Obesity"]);
    }

    #[test]
    fn test_empty_payload_degrades() {
        let response: StudiesResponse = serde_json::from_str("{}").unwrap();
        assert_eq!(into_snapshot(response), TrialSnapshot::default());
    }

    fn adapter(server: &MockServer, max_retries: u32) -> ClinicalTrialsAdapter {
        let executor = FetchExecutor::new(&EnrichmentConfig {
            max_retries,
            retry_base_ms: 1,
            requests_per_second: 1000,
            ..EnrichmentConfig::default()
        })
        .unwrap();
        let sources = SourcesConfig {
            clinical_trials_base: server.uri(),
            ..SourcesConfig::default()
        };
        ClinicalTrialsAdapter::new(Arc::new(executor), &sources)
    }

    fn query() -> EntityQuery {
        EntityQuery {
            slug: "semaglutide".into(),
            name: "Semaglutide".into(),
            aliases: vec![],
            domain: None,
        }
    }

    #[tokio::test]
    async fn test_query_builds_record() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/studies"))
            .and(query_param("query.term", "Semaglutide"))
            .respond_with(ResponseTemplate::new(200).set_body_json(fixture()))
            .expect(1)
            .mount(&server)
            .await;

        let record = adapter(&server, 1).query(&query()).await;
        assert_eq!(record.source, EvidenceSource::ClinicalTrials);
        assert_eq!(
            record.citation_url.as_deref(),
            Some("https://clinicaltrials.gov/search?term=Semaglutide")
        );
        assert!(matches!(record.payload, SourcePayload::Trials(ref t) if t.total == 7));
    }

    #[tokio::test]
    async fn test_outage_yields_empty_record() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/studies"))
            .respond_with(ResponseTemplate::new(502))
            .expect(2)
            .mount(&server)
            .await;

        let record = adapter(&server, 1).query(&query()).await;
        assert_eq!(record.payload, SourcePayload::Empty);
        assert!(record.query_url.is_some());
        assert!(record.citation_url.is_none());
    }
}
