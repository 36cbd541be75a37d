//! PubMed via NCBI E-utilities: esearch for the count and ids, esummary for titles

use super::{EntityQuery, SourceAdapter, SourcePayload, SourceRecord};
use crate::bundle::{LiteratureRecord, LiteratureSnapshot};
use crate::fetch::{build_url, FetchExecutor};
use async_trait::async_trait;
use peptrack_common::config::SourcesConfig;
use peptrack_common::EvidenceSource;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{instrument, warn};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SearchResponse {
    esearchresult: SearchResult,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SearchResult {
    count: Option<String>,
    idlist: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SummaryResponse {
    result: SummaryResult,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SummaryResult {
    uids: Vec<String>,
    #[serde(flatten)]
    docs: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SummaryDoc {
    title: Option<String>,
    pubdate: Option<String>,
    fulljournalname: Option<String>,
}

fn into_snapshot(search: SearchResponse, summary: Option<SummaryResponse>) -> LiteratureSnapshot {
    let count = search
        .esearchresult
        .count
        .and_then(|c| c.trim().parse().ok())
        .unwrap_or(search.esearchresult.idlist.len() as u64);

    let records = summary
        .map(|summary| {
            let SummaryResult { uids, mut docs } = summary.result;
            uids.into_iter()
                .filter_map(|uid| {
                    let doc: SummaryDoc = serde_json::from_value(docs.remove(&uid)?).ok()?;
                    let title = doc.title?.trim().trim_end_matches('.').to_string();
                    if title.is_empty() {
                        return None;
                    }
                    Some(LiteratureRecord {
                        pmid: uid,
                        title,
                        year: doc
                            .pubdate
                            .as_deref()
                            .and_then(|d| d.get(..4))
                            .and_then(|y| y.parse().ok()),
                        journal: doc.fulljournalname,
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    LiteratureSnapshot { count, records }
}

pub struct PubMedAdapter {
    executor: Arc<FetchExecutor>,
    base: String,
    api_key: Option<String>,
    summary_limit: u32,
}

impl PubMedAdapter {
    pub fn new(executor: Arc<FetchExecutor>, sources: &SourcesConfig) -> Self {
        Self {
            executor,
            base: sources.eutils_base.clone(),
            api_key: sources.ncbi_api_key.clone(),
            summary_limit: sources.literature_summary_limit,
        }
    }

    fn params<'a>(&'a self, extra: &[(&'a str, &'a str)]) -> Vec<(&'a str, &'a str)> {
        let mut params = vec![("db", "pubmed"), ("retmode", "json")];
        params.extend_from_slice(extra);
        if let Some(key) = &self.api_key {
            params.push(("api_key", key.as_str()));
        }
        params
    }

    async fn summaries(&self, ids: &[String]) -> Option<SummaryResponse> {
        if ids.is_empty() {
            return None;
        }
        let joined = ids.join(",");
        let url = build_url(&self.base, &["esummary.fcgi"], &self.params(&[("id", joined.as_str())])).ok()?;
        match self.executor.fetch_json::<SummaryResponse>(url).await {
            Ok(summary) => Some(summary),
            Err(e) => {
                warn!(error = %e, "Literature summaries unavailable");
                None
            }
        }
    }
}

#[async_trait]
impl SourceAdapter for PubMedAdapter {
    fn source(&self) -> EvidenceSource {
        EvidenceSource::PubMed
    }

    #[instrument(skip(self, query), fields(slug = %query.slug, source = "pubmed"))]
    async fn query(&self, query: &EntityQuery) -> SourceRecord {
        let term = query.terms().join(" OR ");
        if term.is_empty() {
            return SourceRecord::empty(self.source());
        }

        let retmax = self.summary_limit.to_string();
        let url = match build_url(
            &self.base,
            &["esearch.fcgi"],
            &self.params(&[("term", term.as_str()), ("retmax", retmax.as_str())]),
        ) {
            Ok(url) => url,
            Err(e) => {
                warn!(error = %e, "Bad literature index URL");
                return SourceRecord::empty(self.source());
            }
        };
        let query_url = url.to_string();

        let search = match self.executor.fetch_json::<SearchResponse>(url).await {
            Ok(search) => search,
            Err(e) => {
                warn!(error = %e, "Literature index unavailable");
                return SourceRecord::absent(self.source(), Some(query_url));
            }
        };

        let ids: Vec<String> = search
            .esearchresult
            .idlist
            .iter()
            .take(self.summary_limit as usize)
            .cloned()
            .collect();
        let summary = self.summaries(&ids).await;

        let citation_url = build_url(
            "https://pubmed.ncbi.nlm.nih.gov/",
            &[],
            &[("term", query.primary_term().as_str())],
        )
        .ok()
        .map(|u| u.to_string());

        SourceRecord {
            source: self.source(),
            query_url: Some(query_url),
            citation_url,
            payload: SourcePayload::Literature(into_snapshot(search, summary)),
        }
    }
}
