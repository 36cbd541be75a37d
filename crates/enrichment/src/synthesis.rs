//! Content synthesis: turn a graded bundle into profile text, safety and
//! dosing entries, use-case mappings, regulatory proposals and claims.
//!
//! Everything here is template-composed from bundle facts and truncated to
//! a fixed budget. Text that only says "no data yet" is wrapped as a
//! placeholder so curated text always wins over it.

use crate::bundle::SourceBundle;
use peptrack_common::catalog::{placeholder, truncate_chars, DosingContext, RegulatoryStatus};
use peptrack_common::store::CitationInput;
use peptrack_common::{EvidenceGrade, EvidenceSource};

const INTRO_BUDGET: usize = 600;
const MECHANISM_BUDGET: usize = 700;
const EFFECTIVENESS_BUDGET: usize = 500;
const LONG_FORM_BUDGET: usize = 4000;
const SAFETY_BUDGET: usize = 1200;
const DOSING_BUDGET: usize = 800;
const CLAIM_BUDGET: usize = 400;
const SUMMARY_BUDGET: usize = 400;

pub const MAX_CLAIMS: usize = 6;

pub const FALLBACK_USE_CASE: &str = "evidence-tracking";

/// Claim order when more sources hit than there are claim slots
const CLAIM_PRIORITY: [EvidenceSource; 7] = [
    EvidenceSource::OpenFda,
    EvidenceSource::ClinicalTrials,
    EvidenceSource::PubMed,
    EvidenceSource::Chembl,
    EvidenceSource::PubChem,
    EvidenceSource::Reddit,
    EvidenceSource::HackerNews,
];

/// Strongest grade a claim from `source` can carry
fn source_ceiling(source: EvidenceSource) -> EvidenceGrade {
    match source {
        EvidenceSource::OpenFda | EvidenceSource::ClinicalTrials => EvidenceGrade::A,
        EvidenceSource::PubMed => EvidenceGrade::B,
        EvidenceSource::Chembl => EvidenceGrade::C,
        EvidenceSource::PubChem => EvidenceGrade::D,
        EvidenceSource::Reddit | EvidenceSource::HackerNews => EvidenceGrade::I,
    }
}

struct UseCaseRule {
    slug: &'static str,
    label: &'static str,
    keywords: &'static [&'static str],
}

const USE_CASE_RULES: &[UseCaseRule] = &[
    UseCaseRule {
        slug: "weight-management",
        label: "weight management",
        keywords: &["obesity", "overweight", "weight loss", "weight management", "body weight", "adiposity"],
    },
    UseCaseRule {
        slug: "glycemic-control",
        label: "glycemic control",
        keywords: &["diabetes", "glycemic", "glucose", "insulin", "hba1c"],
    },
    UseCaseRule {
        slug: "tissue-repair",
        label: "tissue repair",
        keywords: &["tendon", "wound", "ligament", "healing", "injury", "muscle repair", "fracture"],
    },
    UseCaseRule {
        slug: "gastrointestinal-health",
        label: "gastrointestinal health",
        keywords: &["gastric", "ulcer", "colitis", "crohn", "bowel", "intestinal", "gastro"],
    },
    UseCaseRule {
        slug: "cardiovascular-health",
        label: "cardiovascular health",
        keywords: &["cardiovascular", "heart", "hypertension", "cardiac", "atherosclerosis"],
    },
    UseCaseRule {
        slug: "cognitive-health",
        label: "cognitive health",
        keywords: &["cognitive", "alzheimer", "dementia", "memory", "neurodegenerat"],
    },
    UseCaseRule {
        slug: "growth-hormone-support",
        label: "growth hormone support",
        keywords: &["growth hormone", "lipodystrophy", "gh deficiency", "somatotropin"],
    },
    UseCaseRule {
        slug: "skin-health",
        label: "skin health",
        keywords: &["skin", "dermal", "wrinkle", "collagen", "photoaging", "alopecia"],
    },
    UseCaseRule {
        slug: "immune-support",
        label: "immune support",
        keywords: &["immune", "infection", "hiv", "sepsis", "inflammat"],
    },
    UseCaseRule {
        slug: "sleep-support",
        label: "sleep support",
        keywords: &["sleep", "insomnia"],
    },
];

#[derive(Debug, Clone, PartialEq)]
pub struct ProfileText {
    pub intro: String,
    pub mechanism: String,
    pub effectiveness: String,
    pub long_description: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SafetyText {
    pub adverse_effects: String,
    pub contraindications: String,
    pub interactions: String,
    pub monitoring: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DosingText {
    pub context: DosingContext,
    pub guidance: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UseCaseMatch {
    pub slug: &'static str,
    pub grade: EvidenceGrade,
    pub consumer_summary: String,
    pub clinician_summary: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedClaim {
    pub source: EvidenceSource,
    pub text: String,
    pub grade: EvidenceGrade,
    pub citation: CitationInput,
}

/// All machine-written content for one peptide
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedContent {
    pub profile: ProfileText,
    pub safety: SafetyText,
    pub dosing: DosingText,
    pub use_cases: Vec<UseCaseMatch>,
    pub claims: Vec<GeneratedClaim>,
}

pub fn synthesize(
    name: &str,
    class_name: Option<&str>,
    bundle: &SourceBundle,
    grade: EvidenceGrade,
) -> GeneratedContent {
    GeneratedContent {
        profile: profile(name, class_name, bundle, grade),
        safety: safety(bundle),
        dosing: dosing(bundle),
        use_cases: use_cases(name, bundle, grade),
        claims: claims(name, bundle, grade, &CLAIM_PRIORITY),
    }
}

/// Community claims only, for vendors
pub fn vendor_claims(name: &str, bundle: &SourceBundle) -> Vec<GeneratedClaim> {
    claims(
        name,
        bundle,
        EvidenceGrade::I,
        &[EvidenceSource::Reddit, EvidenceSource::HackerNews],
    )
}

/// Machine proposal for one jurisdiction
pub fn regulatory_status(bundle: &SourceBundle, jurisdiction: &str) -> RegulatoryStatus {
    if bundle.label.found && bundle.label.jurisdiction.eq_ignore_ascii_case(jurisdiction) {
        RegulatoryStatus::Approved
    } else {
        RegulatoryStatus::Investigational
    }
}

fn format_phase(phase: f32) -> String {
    if phase <= 0.0 {
        "no phase reported".to_string()
    } else if phase < 1.0 {
        "early phase 1".to_string()
    } else {
        format!("phase {}", phase as u32)
    }
}

fn label_phrase(bundle: &SourceBundle) -> Option<String> {
    if !bundle.label.found {
        return None;
    }
    let brands = if bundle.label.brand_names.is_empty() {
        String::new()
    } else {
        format!(" (marketed as {})", bundle.label.brand_names.join(", "))
    };
    Some(format!(
        "An approved {} drug label exists{}.",
        bundle.label.jurisdiction, brands
    ))
}

fn trial_phrase(bundle: &SourceBundle) -> String {
    let trials = &bundle.trials;
    if trials.total == 0 {
        return "No registered clinical trials were found.".to_string();
    }
    format!(
        "{} registered clinical trials reference it ({} completed, {} recruiting, {} active); most advanced: {}.",
        trials.total,
        trials.completed,
        trials.recruiting,
        trials.active,
        format_phase(trials.max_phase)
    )
}

fn profile(
    name: &str,
    class_name: Option<&str>,
    bundle: &SourceBundle,
    grade: EvidenceGrade,
) -> ProfileText {
    let class = class_name
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(|c| format!("a {} peptide", c.to_lowercase()))
        .unwrap_or_else(|| "a peptide".to_string());

    let mut intro = format!(
        "{} is {}. Current evidence grade: {} ({}).",
        name,
        class,
        grade,
        grade.describe()
    );
    if let Some(label) = label_phrase(bundle) {
        intro.push(' ');
        intro.push_str(&label);
    }
    intro.push(' ');
    intro.push_str(&trial_phrase(bundle));

    let mechanism = if !bundle.molecule.mechanisms.is_empty() {
        format!(
            "Reported mechanism of action: {}.",
            bundle.molecule.mechanisms.join("; ")
        )
    } else if let Some(description) = &bundle.compound.description {
        truncate_chars(description, MECHANISM_BUDGET)
    } else {
        format!(
            "No mechanism of action for {} is recorded in the chemistry databases checked.",
            name
        )
    };

    let effectiveness = format!(
        "Evidence grade {}: {}. {} The literature index lists {} publications.",
        grade,
        grade.describe(),
        trial_phrase(bundle),
        bundle.literature.count
    );

    let long_description = long_form(name, bundle, &intro, &mechanism);

    ProfileText {
        intro: truncate_chars(&intro, INTRO_BUDGET),
        mechanism: truncate_chars(&mechanism, MECHANISM_BUDGET),
        effectiveness: truncate_chars(&effectiveness, EFFECTIVENESS_BUDGET),
        long_description: truncate_chars(&long_description, LONG_FORM_BUDGET),
    }
}

fn long_form(name: &str, bundle: &SourceBundle, intro: &str, mechanism: &str) -> String {
    let mut paragraphs = vec![intro.to_string(), mechanism.to_string()];

    if bundle.trials.total > 0 {
        let mut p = trial_phrase(bundle);
        if !bundle.trials.conditions.is_empty() {
            p.push_str(&format!(
                " Conditions studied include {}.",
                bundle.trials.conditions.join(", ")
            ));
        }
        if !bundle.trials.titles.is_empty() {
            p.push_str(&format!(" Example studies: {}.", bundle.trials.titles.join("; ")));
        }
        paragraphs.push(p);
    }

    if bundle.literature.count > 0 {
        let recent: Vec<String> = bundle
            .literature
            .records
            .iter()
            .map(|r| match r.year {
                Some(year) => format!("\"{}\" ({})", r.title, year),
                None => format!("\"{}\"", r.title),
            })
            .collect();
        let mut p = format!(
            "The literature index returns {} publications mentioning {}.",
            bundle.literature.count, name
        );
        if !recent.is_empty() {
            p.push_str(&format!(" Recent titles: {}.", recent.join("; ")));
        }
        paragraphs.push(p);
    }

    if let Some(indications) = &bundle.label.indications {
        paragraphs.push(format!(
            "Labeled indications: {}",
            truncate_chars(indications, 800)
        ));
    }

    let compound = &bundle.compound;
    if compound.cid.is_some() {
        let mut facts = Vec::new();
        if let Some(formula) = &compound.formula {
            facts.push(format!("molecular formula {}", formula));
        }
        if let Some(weight) = compound.weight {
            facts.push(format!("molecular weight {:.1} g/mol", weight));
        }
        if !facts.is_empty() {
            paragraphs.push(format!("Chemistry: {}.", facts.join(", ")));
        }
    }

    if let Some(stats) = bundle.social_stats() {
        paragraphs.push(format!(
            "Community discussion: {} recent posts across {} platforms, average sentiment {:+.2}.",
            stats.review_count, stats.distinct_sources, stats.average_sentiment
        ));
    }

    paragraphs.join("\n\n")
}

fn label_field(value: Option<&String>, missing: &str) -> String {
    match value {
        Some(text) => truncate_chars(text, SAFETY_BUDGET),
        None => placeholder(missing),
    }
}

fn safety(bundle: &SourceBundle) -> SafetyText {
    let label = &bundle.label;
    SafetyText {
        adverse_effects: label_field(
            label.adverse_reactions.as_ref(),
            "No adverse reaction data from an approved label.",
        ),
        contraindications: label_field(
            label.contraindications.as_ref(),
            "No labeled contraindications found.",
        ),
        interactions: label_field(
            label.interactions.as_ref(),
            "No labeled drug interactions found.",
        ),
        monitoring: label_field(
            label.warnings.as_ref(),
            "No labeled warnings or monitoring guidance found.",
        ),
    }
}

fn dosing(bundle: &SourceBundle) -> DosingText {
    if let Some(dosage) = &bundle.label.dosage {
        return DosingText {
            context: DosingContext::ApprovedLabel,
            guidance: truncate_chars(
                &format!("Per the {} label: {}", bundle.label.jurisdiction, dosage),
                DOSING_BUDGET,
            ),
        };
    }
    if bundle.trials.total > 0 {
        return DosingText {
            context: DosingContext::StudyReported,
            guidance: placeholder(&format!(
                "Dosing varies across {} registered trials; see individual study protocols.",
                bundle.trials.total
            )),
        };
    }
    DosingText {
        context: DosingContext::ExpertConsensus,
        guidance: placeholder("No published dosing guidance was found."),
    }
}

fn use_cases(name: &str, bundle: &SourceBundle, grade: EvidenceGrade) -> Vec<UseCaseMatch> {
    // Trial conditions and label indications carry the overall grade;
    // literature titles and ChEMBL indications alone are capped at D
    let strong: Vec<String> = bundle
        .trials
        .conditions
        .iter()
        .chain(bundle.label.indications.iter())
        .map(|t| t.to_lowercase())
        .collect();
    let weak: Vec<String> = bundle
        .molecule
        .indications
        .iter()
        .chain(bundle.literature.records.iter().map(|r| &r.title))
        .map(|t| t.to_lowercase())
        .collect();

    let mut matches = Vec::new();
    for rule in USE_CASE_RULES {
        let hit = |texts: &[String]| {
            rule.keywords
                .iter()
                .find(|k| texts.iter().any(|t| t.contains(*k)))
                .copied()
        };
        let (keyword, rule_grade, basis) = match (hit(&strong), hit(&weak)) {
            (Some(k), _) => (k, grade, "trial conditions or labeled indications"),
            (None, Some(k)) => (k, grade.cap(EvidenceGrade::D), "literature or database indications"),
            (None, None) => continue,
        };

        matches.push(UseCaseMatch {
            slug: rule.slug,
            grade: rule_grade,
            consumer_summary: truncate_chars(
                &format!(
                    "{} has been studied for {}. Evidence grade {}: {}.",
                    name,
                    rule.label,
                    rule_grade,
                    rule_grade.describe()
                ),
                SUMMARY_BUDGET,
            ),
            clinician_summary: truncate_chars(
                &format!(
                    "Matched \"{}\" in {}. {}",
                    keyword,
                    basis,
                    trial_phrase(bundle)
                ),
                SUMMARY_BUDGET,
            ),
        });
    }

    if matches.is_empty() {
        matches.push(UseCaseMatch {
            slug: FALLBACK_USE_CASE,
            grade,
            consumer_summary: truncate_chars(
                &format!(
                    "{} is tracked while evidence for specific uses accumulates. Evidence grade {}.",
                    name, grade
                ),
                SUMMARY_BUDGET,
            ),
            clinician_summary: truncate_chars(
                &format!(
                    "No use-case keywords matched the available sources. {}",
                    trial_phrase(bundle)
                ),
                SUMMARY_BUDGET,
            ),
        });
    }

    matches
}

fn claim_text(source: EvidenceSource, bundle: &SourceBundle) -> Option<String> {
    let text = match source {
        EvidenceSource::OpenFda => {
            let mut text = label_phrase(bundle)?;
            if let Some(indications) = &bundle.label.indications {
                text.push_str(&format!(" Indications: {}", indications));
            }
            text
        }
        EvidenceSource::ClinicalTrials => {
            let mut text = trial_phrase(bundle);
            if !bundle.trials.conditions.is_empty() {
                text.push_str(&format!(" Conditions: {}.", bundle.trials.conditions.join(", ")));
            }
            text
        }
        EvidenceSource::PubMed => {
            let mut text = format!("{} indexed publications.", bundle.literature.count);
            if let Some(first) = bundle.literature.records.first() {
                text.push_str(&format!(" Most relevant: \"{}\"", first.title));
                if let Some(year) = first.year {
                    text.push_str(&format!(" ({})", year));
                }
                text.push('.');
            }
            text
        }
        EvidenceSource::Chembl => {
            let molecule = &bundle.molecule;
            let mut text = format!(
                "ChEMBL {}{}, most advanced: {}.",
                molecule.chembl_id.as_deref()?,
                molecule
                    .pref_name
                    .as_deref()
                    .map(|n| format!(" ({})", n))
                    .unwrap_or_default(),
                format_phase(molecule.max_phase)
            );
            if let Some(mechanism) = molecule.mechanisms.first() {
                text.push_str(&format!(" Mechanism: {}.", mechanism));
            }
            text
        }
        EvidenceSource::PubChem => {
            let compound = &bundle.compound;
            let mut text = format!("PubChem CID {}", compound.cid?);
            if let Some(formula) = &compound.formula {
                text.push_str(&format!(", formula {}", formula));
            }
            if let Some(weight) = compound.weight {
                text.push_str(&format!(", molecular weight {:.1} g/mol", weight));
            }
            text.push('.');
            text
        }
        EvidenceSource::Reddit | EvidenceSource::HackerNews => {
            let community = bundle.community_for(source)?;
            let posts = &community.posts;
            let average = posts.iter().map(|p| p.sentiment.value).sum::<f32>() / posts.len() as f32;
            let mut text = format!(
                "{} recent {} posts, average sentiment {:+.2}.",
                posts.len(),
                source.display_name(),
                average
            );
            if let Some(quote) = posts.iter().find_map(|p| p.quote.as_deref()) {
                text.push_str(&format!(" \"{}\"", quote));
            }
            text
        }
    };
    Some(truncate_chars(&text, CLAIM_BUDGET))
}

fn claims(
    name: &str,
    bundle: &SourceBundle,
    grade: EvidenceGrade,
    order: &[EvidenceSource],
) -> Vec<GeneratedClaim> {
    order
        .iter()
        .copied()
        .filter(|source| bundle.has_hit(*source))
        .filter_map(|source| {
            let url = bundle.citation_urls.get(&source)?.clone();
            let text = claim_text(source, bundle)?;
            let published_on = match source {
                EvidenceSource::ClinicalTrials => bundle.trials.latest_start,
                EvidenceSource::OpenFda => bundle.label.effective_date,
                _ => None,
            };
            Some(GeneratedClaim {
                source,
                text,
                grade: grade.cap(source_ceiling(source)),
                citation: CitationInput {
                    url,
                    title: Some(format!("{}: {}", source.display_name(), name)),
                    published_on,
                },
            })
        })
        .take(MAX_CLAIMS)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::{CommunitySnapshot, LiteratureRecord, UgcPost};
    use crate::sentiment::{Sentiment, SentimentLabel};
    use chrono::NaiveDate;
    use peptrack_common::catalog::is_placeholder;

    fn rich_bundle() -> SourceBundle {
        let mut bundle = SourceBundle::default();
        bundle.trials.total = 12;
        bundle.trials.completed = 7;
        bundle.trials.max_phase = 3.0;
        bundle.trials.conditions = vec!["Obesity".into(), "Type 2 Diabetes".into()];
        bundle.trials.latest_start = NaiveDate::from_ymd_opt(2023, 1, 10);
        bundle.literature.count = 900;
        bundle.literature.records = vec![LiteratureRecord {
            pmid: "1".into(),
            title: "Cardiovascular outcomes with semaglutide".into(),
            year: Some(2022),
            journal: None,
        }];
        bundle.label.found = true;
        bundle.label.jurisdiction = "US".into();
        bundle.label.brand_names = vec!["OZEMPIC".into()];
        bundle.label.dosage = Some("Start at 0.25 mg once weekly.".into());
        bundle.label.adverse_reactions = Some("Nausea, vomiting, diarrhea.".into());
        bundle.label.effective_date = NaiveDate::from_ymd_opt(2023, 9, 15);
        bundle.compound.cid = Some(56842121);
        bundle.molecule.chembl_id = Some("CHEMBL2108724".into());
        bundle.community = vec![CommunitySnapshot {
            source: EvidenceSource::Reddit,
            posts: vec![UgcPost {
                platform: EvidenceSource::Reddit,
                title: "t".into(),
                author: None,
                url: "https://www.reddit.com/r/x".into(),
                created_at: None,
                score: 3,
                matched_term: "Semaglutide".into(),
                quote: Some("Semaglutide helped me a lot.".into()),
                sentiment: Sentiment {
                    value: 0.6,
                    label: SentimentLabel::Positive,
                },
            }],
        }];
        for source in EvidenceSource::ALL {
            if source != EvidenceSource::HackerNews {
                bundle.hits.insert(source);
                bundle
                    .citation_urls
                    .insert(source, format!("https://cite.test/{}", source.key()));
            }
        }
        bundle
    }

    #[test]
    fn test_claims_capped_and_prioritized() {
        let content = synthesize("Semaglutide", Some("GLP-1 agonist"), &rich_bundle(), EvidenceGrade::A);
        assert_eq!(content.claims.len(), MAX_CLAIMS);
        let sources: Vec<EvidenceSource> = content.claims.iter().map(|c| c.source).collect();
        assert_eq!(sources[0], EvidenceSource::OpenFda);
        assert_eq!(sources[5], EvidenceSource::Reddit);

        let pubchem = content.claims.iter().find(|c| c.source == EvidenceSource::PubChem).unwrap();
        assert_eq!(pubchem.grade, EvidenceGrade::D);
        let reddit = content.claims.iter().find(|c| c.source == EvidenceSource::Reddit).unwrap();
        assert_eq!(reddit.grade, EvidenceGrade::I);
        assert!(reddit.text.contains("Semaglutide helped me"));

        let trials = content
            .claims
            .iter()
            .find(|c| c.source == EvidenceSource::ClinicalTrials)
            .unwrap();
        assert_eq!(trials.grade, EvidenceGrade::A);
        assert_eq!(trials.citation.published_on, NaiveDate::from_ymd_opt(2023, 1, 10));
        assert!(content.claims.iter().all(|c| c.text.chars().count() <= CLAIM_BUDGET));
    }

    #[test]
    fn test_label_drives_dosing_and_safety() {
        let content = synthesize("Semaglutide", None, &rich_bundle(), EvidenceGrade::A);
        assert_eq!(content.dosing.context, DosingContext::ApprovedLabel);
        assert!(!is_placeholder(&content.dosing.guidance));
        assert_eq!(content.safety.adverse_effects, "Nausea, vomiting, diarrhea.");
        assert!(is_placeholder(&content.safety.contraindications));
    }

    #[test]
    fn test_empty_bundle_is_all_placeholders() {
        let content = synthesize("Mystery Peptide", None, &SourceBundle::default(), EvidenceGrade::I);
        assert_eq!(content.dosing.context, DosingContext::ExpertConsensus);
        assert!(is_placeholder(&content.dosing.guidance));
        assert!(is_placeholder(&content.safety.adverse_effects));
        assert!(is_placeholder(&content.safety.monitoring));
        assert!(content.claims.is_empty());
        assert_eq!(content.use_cases.len(), 1);
        assert_eq!(content.use_cases[0].slug, FALLBACK_USE_CASE);
        assert!(content.profile.intro.contains("No registered clinical trials"));
    }

    #[test]
    fn test_trials_only_dosing_is_study_reported_placeholder() {
        let mut bundle = SourceBundle::default();
        bundle.trials.total = 2;
        let content = synthesize("BPC-157", None, &bundle, EvidenceGrade::D);
        assert_eq!(content.dosing.context, DosingContext::StudyReported);
        assert!(is_placeholder(&content.dosing.guidance));
    }

    #[test]
    fn test_use_case_grades_depend_on_basis() {
        let content = synthesize("Semaglutide", None, &rich_bundle(), EvidenceGrade::A);
        let by_slug = |slug: &str| content.use_cases.iter().find(|u| u.slug == slug).cloned();

        assert_eq!(by_slug("weight-management").unwrap().grade, EvidenceGrade::A);
        assert_eq!(by_slug("glycemic-control").unwrap().grade, EvidenceGrade::A);
        // only a literature title mentions cardiovascular outcomes
        assert_eq!(by_slug("cardiovascular-health").unwrap().grade, EvidenceGrade::D);
        assert!(by_slug(FALLBACK_USE_CASE).is_none());
    }

    #[test]
    fn test_text_budgets() {
        let mut bundle = rich_bundle();
        bundle.label.adverse_reactions = Some("nausea ".repeat(1000));
        bundle.trials.titles = vec!["A very long study title".repeat(50)];
        let content = synthesize("Semaglutide", None, &bundle, EvidenceGrade::A);
        assert!(content.safety.adverse_effects.chars().count() <= SAFETY_BUDGET);
        assert!(content.profile.long_description.chars().count() <= LONG_FORM_BUDGET);
        assert!(content.profile.intro.chars().count() <= INTRO_BUDGET);
    }

    #[test]
    fn test_regulatory_proposals() {
        let bundle = rich_bundle();
        assert_eq!(regulatory_status(&bundle, "US"), RegulatoryStatus::Approved);
        assert_eq!(regulatory_status(&bundle, "EU"), RegulatoryStatus::Investigational);
        assert_eq!(
            regulatory_status(&SourceBundle::default(), "US"),
            RegulatoryStatus::Investigational
        );
    }

    #[test]
    fn test_vendor_claims_are_community_only() {
        let claims = vendor_claims("Acme Peptides", &rich_bundle());
        assert_eq!(claims.len(), 1);
        assert_eq!(claims[0].source, EvidenceSource::Reddit);
        assert_eq!(claims[0].citation.title.as_deref(), Some("Reddit: Acme Peptides"));
    }

    #[test]
    fn test_synthesis_is_deterministic() {
        let bundle = rich_bundle();
        assert_eq!(
            synthesize("Semaglutide", None, &bundle, EvidenceGrade::A),
            synthesize("Semaglutide", None, &bundle, EvidenceGrade::A)
        );
    }
}
