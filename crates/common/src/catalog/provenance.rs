//! Provenance of stored content
//!
//! Machine-generated content is distinguished from curated content by type, not by
//! string prefix: a claim section is either `Curated(label)` or `Generated(source)`,
//! and only `EvidenceSource` values can be handed to the claim-replacement write.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// External source that produced a piece of evidence
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceSource {
    ClinicalTrials,
    PubMed,
    OpenFda,
    PubChem,
    Chembl,
    Reddit,
    HackerNews,
}

impl EvidenceSource {
    pub const ALL: [EvidenceSource; 7] = [
        EvidenceSource::ClinicalTrials,
        EvidenceSource::PubMed,
        EvidenceSource::OpenFda,
        EvidenceSource::PubChem,
        EvidenceSource::Chembl,
        EvidenceSource::Reddit,
        EvidenceSource::HackerNews,
    ];

    /// Stable key used in metrics labels and run summaries
    pub fn key(&self) -> &'static str {
        match self {
            EvidenceSource::ClinicalTrials => "clinicaltrials",
            EvidenceSource::PubMed => "pubmed",
            EvidenceSource::OpenFda => "openfda",
            EvidenceSource::PubChem => "pubchem",
            EvidenceSource::Chembl => "chembl",
            EvidenceSource::Reddit => "reddit",
            EvidenceSource::HackerNews => "hackernews",
        }
    }

    /// Human-readable source name
    pub fn display_name(&self) -> &'static str {
        match self {
            EvidenceSource::ClinicalTrials => "ClinicalTrials.gov",
            EvidenceSource::PubMed => "PubMed",
            EvidenceSource::OpenFda => "openFDA",
            EvidenceSource::PubChem => "PubChem",
            EvidenceSource::Chembl => "ChEMBL",
            EvidenceSource::Reddit => "Reddit",
            EvidenceSource::HackerNews => "Hacker News",
        }
    }

    /// Section tag stored on claims produced from this source
    pub fn section_tag(&self) -> &'static str {
        match self {
            EvidenceSource::ClinicalTrials => "auto-ingested clinical-trials",
            EvidenceSource::PubMed => "auto-ingested PubMed",
            EvidenceSource::OpenFda => "auto-ingested openFDA label",
            EvidenceSource::PubChem => "auto-ingested PubChem",
            EvidenceSource::Chembl => "auto-ingested ChEMBL",
            EvidenceSource::Reddit => "community signals: reddit",
            EvidenceSource::HackerNews => "community signals: hackernews",
        }
    }

    pub fn from_section_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.section_tag() == tag)
    }

    pub fn is_community(&self) -> bool {
        matches!(self, EvidenceSource::Reddit | EvidenceSource::HackerNews)
    }
}

impl fmt::Display for EvidenceSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for EvidenceSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|src| src.key() == s)
            .ok_or_else(|| format!("unknown evidence source '{}'", s))
    }
}

/// Who owns a stored row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentOrigin {
    Curated,
    Generated,
}

impl ContentOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentOrigin::Curated => "curated",
            ContentOrigin::Generated => "generated",
        }
    }
}

impl From<&str> for ContentOrigin {
    /// Unknown values are treated as curated so they are never overwritten
    fn from(s: &str) -> Self {
        match s {
            "generated" => ContentOrigin::Generated,
            _ => ContentOrigin::Curated,
        }
    }
}

/// Provenance bucket of a claim
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "origin", content = "section", rename_all = "snake_case")]
pub enum ClaimSection {
    /// Entered by a curator; the label is free text
    Curated(String),
    /// Produced by the enrichment pipeline
    Generated(EvidenceSource),
}

impl ClaimSection {
    pub fn origin(&self) -> ContentOrigin {
        match self {
            ClaimSection::Curated(_) => ContentOrigin::Curated,
            ClaimSection::Generated(_) => ContentOrigin::Generated,
        }
    }

    /// Display label stored in the `section` column
    pub fn label(&self) -> &str {
        match self {
            ClaimSection::Curated(label) => label,
            ClaimSection::Generated(source) => source.section_tag(),
        }
    }

    /// Rebuild from the stored `(origin, section)` pair.
    ///
    /// A generated row whose tag is no longer recognised is surfaced as curated so
    /// that no replacement pass can delete it.
    pub fn from_columns(origin: &str, section: &str) -> Self {
        match ContentOrigin::from(origin) {
            ContentOrigin::Generated => match EvidenceSource::from_section_tag(section) {
                Some(source) => ClaimSection::Generated(source),
                None => ClaimSection::Curated(section.to_string()),
            },
            ContentOrigin::Curated => ClaimSection::Curated(section.to_string()),
        }
    }
}

/// Context a dosing entry was derived from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DosingContext {
    ApprovedLabel,
    StudyReported,
    ExpertConsensus,
}

impl DosingContext {
    pub fn as_str(&self) -> &'static str {
        match self {
            DosingContext::ApprovedLabel => "approved-label",
            DosingContext::StudyReported => "study-reported",
            DosingContext::ExpertConsensus => "expert-consensus",
        }
    }
}

impl FromStr for DosingContext {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "approved-label" => Ok(DosingContext::ApprovedLabel),
            "study-reported" => Ok(DosingContext::StudyReported),
            "expert-consensus" => Ok(DosingContext::ExpertConsensus),
            other => Err(format!("unknown dosing context '{}'", other)),
        }
    }
}

/// Regulatory status of a peptide in one jurisdiction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegulatoryStatus {
    Approved,
    Investigational,
    NotApproved,
    Withdrawn,
}

impl RegulatoryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RegulatoryStatus::Approved => "approved",
            RegulatoryStatus::Investigational => "investigational",
            RegulatoryStatus::NotApproved => "not_approved",
            RegulatoryStatus::Withdrawn => "withdrawn",
        }
    }
}

impl FromStr for RegulatoryStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "approved" => Ok(RegulatoryStatus::Approved),
            "investigational" => Ok(RegulatoryStatus::Investigational),
            "not_approved" => Ok(RegulatoryStatus::NotApproved),
            "withdrawn" => Ok(RegulatoryStatus::Withdrawn),
            other => Err(format!("unknown regulatory status '{}'", other)),
        }
    }
}

/// Who asserted a regulatory status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssertedBy {
    Curator,
    Machine,
}

impl AssertedBy {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssertedBy::Curator => "curator",
            AssertedBy::Machine => "machine",
        }
    }
}

impl From<&str> for AssertedBy {
    fn from(s: &str) -> Self {
        match s {
            "machine" => AssertedBy::Machine,
            _ => AssertedBy::Curator,
        }
    }
}

/// Kind of catalog entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Peptide,
    Vendor,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Peptide => "peptide",
            EntityKind::Vendor => "vendor",
        }
    }
}

/// Reference to a peptide or vendor row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityRef {
    pub kind: EntityKind,
    pub id: i64,
}

impl EntityRef {
    pub fn peptide(id: i64) -> Self {
        Self { kind: EntityKind::Peptide, id }
    }

    pub fn vendor(id: i64) -> Self {
        Self { kind: EntityKind::Vendor, id }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_section_tags_round_trip() {
        for source in EvidenceSource::ALL {
            let section = ClaimSection::Generated(source);
            let rebuilt = ClaimSection::from_columns(section.origin().as_str(), section.label());
            assert_eq!(rebuilt, section);
        }
    }

    #[test]
    fn test_curated_section_never_parsed_as_generated() {
        let section = ClaimSection::from_columns("curated", "auto-ingested PubMed");
        assert_eq!(section, ClaimSection::Curated("auto-ingested PubMed".to_string()));
    }

    #[test]
    fn test_unknown_generated_tag_is_protected() {
        let section = ClaimSection::from_columns("generated", "legacy import");
        assert_eq!(section.origin(), ContentOrigin::Curated);
    }

    #[test]
    fn test_unknown_origin_defaults_to_curated() {
        assert_eq!(ContentOrigin::from("manual"), ContentOrigin::Curated);
        assert_eq!(AssertedBy::from(""), AssertedBy::Curator);
    }

    #[test]
    fn test_source_keys_parse() {
        assert_eq!("chembl".parse::<EvidenceSource>().unwrap(), EvidenceSource::Chembl);
        assert!(EvidenceSource::Reddit.is_community());
        assert!(!EvidenceSource::OpenFda.is_community());
    }
}
