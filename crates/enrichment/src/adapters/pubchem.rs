//! PubChem PUG-REST: name to CID, then properties and description

use super::{EntityQuery, FlexNumber, SourceAdapter, SourcePayload, SourceRecord};
use crate::bundle::CompoundSnapshot;
use crate::fetch::{build_url, FetchExecutor};
use async_trait::async_trait;
use peptrack_common::config::SourcesConfig;
use peptrack_common::EvidenceSource;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{instrument, warn};

const PROPERTIES: &str = "MolecularFormula,MolecularWeight,IUPACName";

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
struct CidResponse {
    identifier_list: IdentifierList,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct IdentifierList {
    #[serde(rename = "CID")]
    cid: Vec<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
struct PropertyResponse {
    property_table: PropertyTable,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
struct PropertyTable {
    properties: Vec<Properties>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
struct Properties {
    molecular_formula: Option<String>,
    molecular_weight: Option<FlexNumber>,
    #[serde(rename = "IUPACName")]
    iupac_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
struct DescriptionResponse {
    information_list: InformationList,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
struct InformationList {
    information: Vec<Information>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
struct Information {
    description: Option<String>,
}

fn into_snapshot(
    cid: u64,
    properties: Option<PropertyResponse>,
    description: Option<DescriptionResponse>,
) -> CompoundSnapshot {
    let props = properties
        .and_then(|p| p.property_table.properties.into_iter().next())
        .unwrap_or_default();

    let description = description.and_then(|d| {
        d.information_list
            .information
            .into_iter()
            .filter_map(|i| i.description)
            .map(|d| d.trim().to_string())
            .find(|d| !d.is_empty())
    });

    CompoundSnapshot {
        cid: Some(cid),
        formula: props.molecular_formula,
        weight: props.molecular_weight.as_ref().and_then(FlexNumber::as_f64),
        iupac: props.iupac_name,
        description,
    }
}

pub struct PubChemAdapter {
    executor: Arc<FetchExecutor>,
    base: String,
}

impl PubChemAdapter {
    pub fn new(executor: Arc<FetchExecutor>, sources: &SourcesConfig) -> Self {
        Self {
            executor,
            base: sources.pubchem_base.clone(),
        }
    }

    /// Secondary lookups degrade to `None` on any failure
    async fn optional<T: DeserializeOwned>(&self, segments: &[&str]) -> Option<T> {
        let url = build_url(&self.base, segments, &[]).ok()?;
        match self.executor.fetch_json::<T>(url).await {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(error = %e, "Compound detail unavailable");
                None
            }
        }
    }
}

#[async_trait]
impl SourceAdapter for PubChemAdapter {
    fn source(&self) -> EvidenceSource {
        EvidenceSource::PubChem
    }

    #[instrument(skip(self, query), fields(slug = %query.slug, source = "pubchem"))]
    async fn query(&self, query: &EntityQuery) -> SourceRecord {
        let mut last_url = None;

        for term in query.terms() {
            let Ok(url) = build_url(&self.base, &["compound", "name", term.as_str(), "cids", "JSON"], &[]) else {
                continue;
            };
            last_url = Some(url.to_string());

            let cid = match self.executor.fetch_json::<CidResponse>(url).await {
                Ok(response) => response.identifier_list.cid.into_iter().next(),
                Err(e) if e.is_not_found() => None,
                Err(e) => {
                    warn!(error = %e, "Compound lookup unavailable");
                    break;
                }
            };
            let Some(cid) = cid else {
                continue;
            };

            let cid_text = cid.to_string();
            let properties = self
                .optional::<PropertyResponse>(&["compound", "cid", cid_text.as_str(), "property", PROPERTIES, "JSON"])
                .await;
            let description = self
                .optional::<DescriptionResponse>(&["compound", "cid", cid_text.as_str(), "description", "JSON"])
                .await;

            return SourceRecord {
                source: self.source(),
                query_url: last_url,
                citation_url: Some(format!("https://pubchem.ncbi.nlm.nih.gov/compound/{}", cid)),
                payload: SourcePayload::Compound(into_snapshot(cid, properties, description)),
            };
        }

        SourceRecord::absent(self.source(), last_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use peptrack_common::config::EnrichmentConfig;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_snapshot_with_string_weight() {
        let properties: PropertyResponse = serde_json::from_value(serde_json::json!({
            "PropertyTable": {"Properties": [{
                "CID": 56842121,
                "MolecularFormula": "C187H291N45O59",
                "MolecularWeight": "4114",
                "IUPACName": "long name"
            }]}
        }))
        .unwrap();
        let description: DescriptionResponse = serde_json::from_value(serde_json::json!({
            "InformationList": {"Information": [
                {"CID": 56842121, "Title": "Semaglutide"},
                {"CID": 56842121, "Description": "Semaglutide is a GLP-1 receptor agonist."}
            ]}
        }))
        .unwrap();

        let snapshot = into_snapshot(56842121, Some(properties), Some(description));
        assert_eq!(snapshot.cid, Some(56842121));
        assert_eq!(snapshot.weight, Some(4114.0));
        assert_eq!(
            snapshot.description.as_deref(),
            Some("Semaglutide is a GLP-1 receptor agonist.")
        );
    }

    #[test]
    fn test_snapshot_without_details() {
        let snapshot = into_snapshot(7, None, None);
        assert_eq!(snapshot.cid, Some(7));
        assert!(snapshot.formula.is_none());
        assert!(snapshot.description.is_none());
    }

    #[tokio::test]
    async fn test_unknown_name_is_absent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/compound/name/Unobtainium/cids/JSON"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let executor = FetchExecutor::new(&EnrichmentConfig {
            requests_per_second: 1000,
            ..EnrichmentConfig::default()
        })
        .unwrap();
        let adapter = PubChemAdapter::new(
            Arc::new(executor),
            &SourcesConfig {
                pubchem_base: server.uri(),
                ..SourcesConfig::default()
            },
        );
        let record = adapter
            .query(&EntityQuery {
                slug: "unobtainium".into(),
                name: "Unobtainium".into(),
                aliases: vec![],
                domain: None,
            })
            .await;
        assert_eq!(record.payload, SourcePayload::Empty);
        assert!(record.query_url.is_some());
    }
}
