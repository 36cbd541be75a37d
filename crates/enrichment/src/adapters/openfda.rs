//! openFDA drug label search, trying each name variant until one matches

use super::{distinct, parse_partial_date, EntityQuery, SourceAdapter, SourcePayload, SourceRecord};
use crate::bundle::LabelSnapshot;
use crate::errors::FetchFailure;
use crate::fetch::{build_url, FetchExecutor};
use async_trait::async_trait;
use peptrack_common::config::SourcesConfig;
use peptrack_common::EvidenceSource;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// openFDA labels are issued by the US regulator
const LABEL_JURISDICTION: &str = "US";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LabelResponse {
    results: Vec<LabelResult>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LabelResult {
    indications_and_usage: Vec<String>,
    dosage_and_administration: Vec<String>,
    contraindications: Vec<String>,
    warnings_and_cautions: Vec<String>,
    warnings: Vec<String>,
    adverse_reactions: Vec<String>,
    drug_interactions: Vec<String>,
    effective_time: Option<String>,
    set_id: Option<String>,
    openfda: OpenFdaFields,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct OpenFdaFields {
    brand_name: Vec<String>,
    generic_name: Vec<String>,
}

fn section(parts: Vec<String>) -> Option<String> {
    let text = parts
        .iter()
        .flat_map(|p| p.split_whitespace())
        .collect::<Vec<_>>()
        .join(" ");
    (!text.is_empty()).then_some(text)
}

fn into_snapshot(response: LabelResponse) -> LabelSnapshot {
    let Some(label) = response.results.into_iter().next() else {
        return LabelSnapshot::default();
    };

    let warnings = if label.warnings_and_cautions.is_empty() {
        label.warnings
    } else {
        label.warnings_and_cautions
    };

    LabelSnapshot {
        found: true,
        jurisdiction: LABEL_JURISDICTION.to_string(),
        brand_names: distinct(label.openfda.brand_name, 5),
        indications: section(label.indications_and_usage),
        dosage: section(label.dosage_and_administration),
        contraindications: section(label.contraindications),
        warnings: section(warnings),
        adverse_reactions: section(label.adverse_reactions),
        interactions: section(label.drug_interactions),
        effective_date: label.effective_time.as_deref().and_then(parse_partial_date),
        set_id: label.set_id,
    }
}

pub struct OpenFdaAdapter {
    executor: Arc<FetchExecutor>,
    base: String,
    api_key: Option<String>,
}

impl OpenFdaAdapter {
    pub fn new(executor: Arc<FetchExecutor>, sources: &SourcesConfig) -> Self {
        Self {
            executor,
            base: sources.openfda_base.clone(),
            api_key: sources.openfda_api_key.clone(),
        }
    }

    fn search_url(&self, term: &str) -> Result<reqwest::Url, FetchFailure> {
        let search = format!(
            "openfda.generic_name:\"{term}\" OR openfda.brand_name:\"{term}\""
        );
        let mut params = vec![("search", search.as_str()), ("limit", "1")];
        if let Some(key) = &self.api_key {
            params.push(("api_key", key.as_str()));
        }
        build_url(&self.base, &["drug", "label.json"], &params)
    }
}

#[async_trait]
impl SourceAdapter for OpenFdaAdapter {
    fn source(&self) -> EvidenceSource {
        EvidenceSource::OpenFda
    }

    #[instrument(skip(self, query), fields(slug = %query.slug, source = "openfda"))]
    async fn query(&self, query: &EntityQuery) -> SourceRecord {
        let mut last_url = None;

        for term in query.terms() {
            let url = match self.search_url(&term) {
                Ok(url) => url,
                Err(e) => {
                    warn!(error = %e, "Bad label search URL");
                    continue;
                }
            };
            last_url = Some(url.to_string());

            match self.executor.fetch_json::<LabelResponse>(url).await {
                Ok(response) => {
                    let snapshot = into_snapshot(response);
                    if !snapshot.found {
                        continue;
                    }
                    debug!(term = %term, "Label found");
                    let citation_url = build_url(
                        "https://dailymed.nlm.nih.gov/dailymed/search.cfm",
                        &[],
                        &[("labeltype", "all"), ("query", term.as_str())],
                    )
                    .ok()
                    .map(|u| u.to_string());
                    return SourceRecord {
                        source: self.source(),
                        query_url: last_url,
                        citation_url,
                        payload: SourcePayload::Label(snapshot),
                    };
                }
                Err(e) if e.is_not_found() => continue,
                Err(e) => {
                    warn!(error = %e, "Label search unavailable");
                    break;
                }
            }
        }

        SourceRecord::absent(self.source(), last_url)
    }
}
