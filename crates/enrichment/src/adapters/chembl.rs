//! ChEMBL molecule search, then mechanisms and indications for the best match

use super::{distinct, EntityQuery, FlexNumber, SourceAdapter, SourcePayload, SourceRecord};
use crate::bundle::MoleculeSnapshot;
use crate::fetch::{build_url, FetchExecutor};
use async_trait::async_trait;
use peptrack_common::config::SourcesConfig;
use peptrack_common::EvidenceSource;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{instrument, warn};

const MAX_MECHANISMS: usize = 5;
const MAX_INDICATIONS: usize = 12;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct MoleculeSearch {
    molecules: Vec<Molecule>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Molecule {
    molecule_chembl_id: Option<String>,
    pref_name: Option<String>,
    max_phase: Option<FlexNumber>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct MechanismList {
    mechanisms: Vec<Mechanism>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Mechanism {
    mechanism_of_action: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct IndicationList {
    drug_indications: Vec<Indication>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Indication {
    mesh_heading: Option<String>,
    efo_term: Option<String>,
}

fn into_snapshot(
    molecule: Molecule,
    mechanisms: Option<MechanismList>,
    indications: Option<IndicationList>,
) -> MoleculeSnapshot {
    MoleculeSnapshot {
        chembl_id: molecule.molecule_chembl_id,
        pref_name: molecule.pref_name,
        max_phase: molecule
            .max_phase
            .as_ref()
            .and_then(FlexNumber::as_f64)
            .map(|p| p.max(0.0) as f32)
            .unwrap_or(0.0),
        mechanisms: distinct(
            mechanisms
                .map(|m| m.mechanisms)
                .unwrap_or_default()
                .into_iter()
                .filter_map(|m| m.mechanism_of_action),
            MAX_MECHANISMS,
        ),
        indications: distinct(
            indications
                .map(|i| i.drug_indications)
                .unwrap_or_default()
                .into_iter()
                .filter_map(|i| i.mesh_heading.or(i.efo_term)),
            MAX_INDICATIONS,
        ),
    }
}

pub struct ChemblAdapter {
    executor: Arc<FetchExecutor>,
    base: String,
}

impl ChemblAdapter {
    pub fn new(executor: Arc<FetchExecutor>, sources: &SourcesConfig) -> Self {
        Self {
            executor,
            base: sources.chembl_base.clone(),
        }
    }

    async fn optional<T: DeserializeOwned>(&self, resource: &str, chembl_id: &str) -> Option<T> {
        let url = build_url(
            &self.base,
            &[resource],
            &[("molecule_chembl_id", chembl_id), ("limit", "50")],
        )
        .ok()?;
        match self.executor.fetch_json::<T>(url).await {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(error = %e, resource, "Molecule detail unavailable");
                None
            }
        }
    }
}

#[async_trait]
impl SourceAdapter for ChemblAdapter {
    fn source(&self) -> EvidenceSource {
        EvidenceSource::Chembl
    }

    #[instrument(skip(self, query), fields(slug = %query.slug, source = "chembl"))]
    async fn query(&self, query: &EntityQuery) -> SourceRecord {
        let term = query.primary_term();
        let url = match build_url(
            &self.base,
            &["molecule", "search.json"],
            &[("q", term.as_str()), ("limit", "1")],
        ) {
            Ok(url) => url,
            Err(e) => {
                warn!(error = %e, "Bad molecule search URL");
                return SourceRecord::empty(self.source());
            }
        };
        let query_url = url.to_string();

        let molecule = match self.executor.fetch_json::<MoleculeSearch>(url).await {
            Ok(search) => search.molecules.into_iter().next(),
            Err(e) => {
                if !e.is_not_found() {
                    warn!(error = %e, "Molecule search unavailable");
                }
                None
            }
        };
        let Some(molecule) = molecule else {
            return SourceRecord::absent(self.source(), Some(query_url));
        };
        let Some(chembl_id) = molecule.molecule_chembl_id.clone() else {
            return SourceRecord::absent(self.source(), Some(query_url));
        };

        let mechanisms = self.optional::<MechanismList>("mechanism.json", &chembl_id).await;
        let indications = self.optional::<IndicationList>("drug_indication.json", &chembl_id).await;

        SourceRecord {
            source: self.source(),
            query_url: Some(query_url),
            citation_url: Some(format!(
                "https://www.ebi.ac.uk/chembl/compound_report_card/{}/",
                chembl_id
            )),
            payload: SourcePayload::Molecule(into_snapshot(molecule, mechanisms, indications)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use peptrack_common::config::EnrichmentConfig;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_snapshot_prefers_mesh_heading() {
        let molecule: Molecule = serde_json::from_value(serde_json::json!({
            "molecule_chembl_id": "CHEMBL2108724",
            "pref_name": "SEMAGLUTIDE",
            "max_phase": "4.0"
        }))
        .unwrap();
        let indications: IndicationList = serde_json::from_value(serde_json::json!({
            "drug_indications": [
                {"mesh_heading": "Obesity", "efo_term": "obesity"},
                {"efo_term": "type II diabetes mellitus"},
                {"mesh_heading": "obesity"}
            ]
        }))
        .unwrap();

        let snapshot = into_snapshot(molecule, None, Some(indications));
        assert_eq!(snapshot.max_phase, 4.0);
        assert_eq!(snapshot.indications, vec!["Obesity", "type II diabetes mellitus"]);
        assert!(snapshot.mechanisms.is_empty());
    }

    #[tokio::test]
    async fn test_query_fetches_details() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/molecule/search.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "molecules": [{"molecule_chembl_id": "CHEMBL1", "pref_name": "TESAMORELIN", "max_phase": 4}]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/mechanism.json"))
            .and(query_param("molecule_chembl_id", "CHEMBL1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "mechanisms": [{"mechanism_of_action": "Growth hormone releasing hormone receptor agonist"}]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/drug_indication.json"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let executor = FetchExecutor::new(&EnrichmentConfig {
            max_retries: 0,
            requests_per_second: 1000,
            ..EnrichmentConfig::default()
        })
        .unwrap();
        let adapter = ChemblAdapter::new(
            Arc::new(executor),
            &SourcesConfig {
                chembl_base: server.uri(),
                ..SourcesConfig::default()
            },
        );
        let record = adapter
            .query(&EntityQuery {
                slug: "tesamorelin".into(),
                name: "Tesamorelin".into(),
                aliases: vec![],
                domain: None,
            })
            .await;

        match record.payload {
            SourcePayload::Molecule(molecule) => {
                assert_eq!(molecule.chembl_id.as_deref(), Some("CHEMBL1"));
                assert_eq!(molecule.mechanisms.len(), 1);
                assert!(molecule.indications.is_empty());
            }
            other => panic!("unexpected payload {other:?}"),
        }
        assert_eq!(
            record.citation_url.as_deref(),
            Some("https://www.ebi.ac.uk/chembl/compound_report_card/CHEMBL1/")
        );
    }
}
