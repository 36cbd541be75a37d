//! Source adapters
//!
//! Each adapter turns one external API into a normalized snapshot. Wire
//! shapes are decoded into lenient serde structs (every field optional or
//! defaulted) and converted by a single pure `into_snapshot` function per
//! adapter. An adapter never fails: fetch failures degrade to an empty record.

mod chembl;
mod clinical_trials;
mod community;
mod openfda;
mod pubchem;
mod pubmed;

pub use chembl::ChemblAdapter;
pub use clinical_trials::ClinicalTrialsAdapter;
pub use community::{HackerNewsAdapter, RedditAdapter};
pub use openfda::OpenFdaAdapter;
pub use pubchem::PubChemAdapter;
pub use pubmed::PubMedAdapter;

use crate::bundle::{
    CommunitySnapshot, CompoundSnapshot, LabelSnapshot, LiteratureSnapshot, MoleculeSnapshot,
    TrialSnapshot,
};
use crate::fetch::FetchExecutor;
use async_trait::async_trait;
use chrono::NaiveDate;
use peptrack_common::catalog::normalize_alias;
use peptrack_common::config::SourcesConfig;
use peptrack_common::store::{PeptideTarget, VendorTarget};
use peptrack_common::EvidenceSource;
use regex_lite::Regex;
use serde::Deserialize;
use std::collections::HashSet;
use std::sync::{Arc, OnceLock};

/// Most search terms an adapter will try for one entity
const MAX_TERMS: usize = 4;

/// What an adapter is asked about
#[derive(Debug, Clone, PartialEq)]
pub struct EntityQuery {
    pub slug: String,
    pub name: String,
    pub aliases: Vec<String>,
    /// Vendor web domain, when querying about a vendor
    pub domain: Option<String>,
}

impl EntityQuery {
    pub fn peptide(target: &PeptideTarget) -> Self {
        Self {
            slug: target.slug.clone(),
            name: target.name.clone(),
            aliases: target.aliases.clone(),
            domain: None,
        }
    }

    pub fn vendor(target: &VendorTarget) -> Self {
        Self {
            slug: target.slug.clone(),
            name: target.name.clone(),
            aliases: Vec::new(),
            domain: target.domain.clone(),
        }
    }

    /// Normalized, deduplicated search terms, canonical name first
    pub fn terms(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        std::iter::once(&self.name)
            .chain(&self.aliases)
            .map(|raw| normalize_search_term(raw))
            .filter(|term| !term.is_empty() && seen.insert(normalize_alias(term)))
            .take(MAX_TERMS)
            .collect()
    }

    /// Best single search term; falls back to the slug
    pub fn primary_term(&self) -> String {
        self.terms()
            .into_iter()
            .next()
            .unwrap_or_else(|| self.slug.replace('-', " "))
    }
}

fn parenthetical_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\([^)]*\)|\[[^\]]*\]").expect("static pattern"))
}

fn dosage_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b\d+(?:\.\d+)?\s*(?:mg|mcg|ug|g|iu|ml|units?)\b|\b(?:mg|mcg|ug|iu|ml|units?)\b")
            .expect("static pattern")
    })
}

/// Strip parentheticals, dosage tokens and punctuation from a display name
pub fn normalize_search_term(raw: &str) -> String {
    let without_parens = parenthetical_re().replace_all(raw, " ");
    let without_dosage = dosage_re().replace_all(&without_parens, " ");
    let cleaned: String = without_dosage
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' { c } else { ' ' })
        .collect();
    cleaned
        .split_whitespace()
        .map(|w| w.trim_matches('-'))
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Normalized result of one source
#[derive(Debug, Clone, PartialEq)]
pub enum SourcePayload {
    Trials(TrialSnapshot),
    Literature(LiteratureSnapshot),
    Label(LabelSnapshot),
    Compound(CompoundSnapshot),
    Molecule(MoleculeSnapshot),
    Community(CommunitySnapshot),
    Empty,
}

/// One adapter's answer for one entity
#[derive(Debug, Clone, PartialEq)]
pub struct SourceRecord {
    pub source: EvidenceSource,
    /// Exact API URL that was queried
    pub query_url: Option<String>,
    /// Human-navigable URL used for citations
    pub citation_url: Option<String>,
    pub payload: SourcePayload,
}

impl SourceRecord {
    pub fn empty(source: EvidenceSource) -> Self {
        Self {
            source,
            query_url: None,
            citation_url: None,
            payload: SourcePayload::Empty,
        }
    }

    fn absent(source: EvidenceSource, query_url: Option<String>) -> Self {
        Self {
            query_url,
            ..Self::empty(source)
        }
    }
}

/// A queryable external evidence source
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    fn source(&self) -> EvidenceSource;

    /// Never fails; an unreachable or empty source yields an empty record
    async fn query(&self, query: &EntityQuery) -> SourceRecord;
}

/// Adapters run for each entity kind
#[derive(Clone)]
pub struct AdapterSet {
    pub peptide: Vec<Arc<dyn SourceAdapter>>,
    pub vendor: Vec<Arc<dyn SourceAdapter>>,
}

impl AdapterSet {
    /// Live HTTP adapters sharing one executor
    pub fn http(executor: Arc<FetchExecutor>, sources: &SourcesConfig) -> Self {
        let reddit: Arc<dyn SourceAdapter> = Arc::new(RedditAdapter::new(executor.clone(), sources));
        let hackernews: Arc<dyn SourceAdapter> =
            Arc::new(HackerNewsAdapter::new(executor.clone(), sources));

        Self {
            peptide: vec![
                Arc::new(ClinicalTrialsAdapter::new(executor.clone(), sources)),
                Arc::new(PubMedAdapter::new(executor.clone(), sources)),
                Arc::new(OpenFdaAdapter::new(executor.clone(), sources)),
                Arc::new(PubChemAdapter::new(executor.clone(), sources)),
                Arc::new(ChemblAdapter::new(executor, sources)),
                reddit.clone(),
                hackernews.clone(),
            ],
            vendor: vec![reddit, hackernews],
        }
    }
}

/// Number that some APIs send as a string
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(untagged)]
pub(crate) enum FlexNumber {
    Int(i64),
    Float(f64),
    Text(String),
}

impl FlexNumber {
    pub(crate) fn as_f64(&self) -> Option<f64> {
        match self {
            FlexNumber::Int(v) => Some(*v as f64),
            FlexNumber::Float(v) => Some(*v),
            FlexNumber::Text(s) => s.trim().parse().ok(),
        }
    }
}

/// Parse "2021", "2021-03", "2021-03-15", "20210315" or "2021 Mar 15"
pub(crate) fn parse_partial_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(date);
    }
    if raw.len() == 8 && raw.chars().all(|c| c.is_ascii_digit()) {
        return NaiveDate::parse_from_str(raw, "%Y%m%d").ok();
    }
    if let Ok(date) = NaiveDate::parse_from_str(&format!("{}-01", raw), "%Y-%m-%d") {
        return Some(date);
    }
    let year: i32 = raw.get(..4)?.parse().ok()?;
    NaiveDate::from_ymd_opt(year, 1, 1)
}

/// Keep the first `limit` distinct strings, compared case-insensitively
pub(crate) fn distinct(values: impl IntoIterator<Item = String>, limit: usize) -> Vec<String> {
    let mut seen = HashSet::new();
    values
        .into_iter()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty() && seen.insert(v.to_lowercase()))
        .take(limit)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_parentheticals_and_dosage() {
        assert_eq!(
            normalize_search_term("BPC-157 (Body Protection Compound) 5mg"),
            "BPC-157"
        );
        assert_eq!(normalize_search_term("Semaglutide, 2.4 mg/week"), "Semaglutide week");
        assert_eq!(normalize_search_term("TB-500 [Thymosin Beta-4] 10 mg"), "TB-500");
        assert_eq!(normalize_search_term("Ipamorelin 300 mcg"), "Ipamorelin");
    }

    #[test]
    fn test_terms_are_deduplicated() {
        let query = EntityQuery {
            slug: "semaglutide".into(),
            name: "Semaglutide".into(),
            aliases: vec![
                "semaglutide".into(),
                "Ozempic (injection)".into(),
                "".into(),
                "Wegovy".into(),
                "Rybelsus".into(),
                "NN9535".into(),
            ],
            domain: None,
        };
        assert_eq!(query.terms(), vec!["Semaglutide", "Ozempic", "Wegovy", "Rybelsus"]);
        assert_eq!(query.primary_term(), "Semaglutide");
    }

    #[test]
    fn test_primary_term_falls_back_to_slug() {
        let query = EntityQuery {
            slug: "ghk-cu".into(),
            name: "(copper peptide)".into(),
            aliases: vec![],
            domain: None,
        };
        assert_eq!(query.primary_term(), "ghk cu");
    }

    #[test]
    fn test_partial_dates() {
        assert_eq!(parse_partial_date("2021-03-15"), NaiveDate::from_ymd_opt(2021, 3, 15));
        assert_eq!(parse_partial_date("2021-03"), NaiveDate::from_ymd_opt(2021, 3, 1));
        assert_eq!(parse_partial_date("20190704"), NaiveDate::from_ymd_opt(2019, 7, 4));
        assert_eq!(parse_partial_date("2018 Nov 2"), NaiveDate::from_ymd_opt(2018, 1, 1));
        assert_eq!(parse_partial_date("n/a"), None);
    }

    #[test]
    fn test_flex_number() {
        let values: Vec<FlexNumber> = serde_json::from_str(r#"[3, 2.5, "4.0", "x"]"#).unwrap();
        let parsed: Vec<Option<f64>> = values.iter().map(FlexNumber::as_f64).collect();
        assert_eq!(parsed, vec![Some(3.0), Some(2.5), Some(4.0), None]);
    }
}
