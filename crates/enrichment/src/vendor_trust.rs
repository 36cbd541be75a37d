//! Vendor trust scoring
//!
//! A vendor with no declared trust signals is unrated, not rated zero.

use crate::bundle::SocialStats;
use peptrack_common::store::RatingSnapshotInput;
use std::collections::BTreeSet;

pub const METHOD_VERSION: &str = "trust-v2";

const BASE_RATING: f64 = 2.5;
const SIGNAL_FACTOR: f64 = 0.5;
const LISTING_RATING_BONUS: f64 = 0.02;
const LISTING_RATING_CAP: f64 = 0.5;
const SENTIMENT_FACTOR: f64 = 0.5;
const MAX_RATING: f64 = 5.0;

const BASE_CONFIDENCE: f64 = 0.35;
const SIGNAL_CONFIDENCE: f64 = 0.08;
const LISTING_CONFIDENCE_BONUS: f64 = 0.01;
const LISTING_CONFIDENCE_CAP: f64 = 0.15;
const REVIEW_CONFIDENCE_BONUS: f64 = 0.01;
const REVIEW_CONFIDENCE_CAP: f64 = 0.15;
const SOURCE_CONFIDENCE_BONUS: f64 = 0.05;
const SOURCE_CONFIDENCE_CAP: f64 = 0.1;
const MAX_CONFIDENCE: f64 = 0.98;

const UNKNOWN_SIGNAL_WEIGHT: f64 = 0.25;

const SIGNAL_WEIGHTS: &[(&str, f64)] = &[
    ("third_party_testing", 1.0),
    ("lab_verified", 0.9),
    ("coa_published", 0.8),
    ("hplc_tested", 0.7),
    ("mass_spec_tested", 0.6),
    ("established_brand", 0.5),
    ("money_back_guarantee", 0.4),
    ("secure_checkout", 0.3),
    ("responsive_support", 0.3),
    ("domestic_shipping", 0.2),
    ("crypto_payment_only", -0.6),
    ("no_contact_info", -0.8),
    ("counterfeit_reports", -1.2),
    ("regulator_warning_letter", -1.5),
];

#[derive(Debug, Clone, PartialEq)]
pub struct TrustScore {
    pub rating: Option<f64>,
    pub confidence: Option<f64>,
    pub reason_tags: Vec<String>,
}

impl TrustScore {
    pub fn unrated() -> Self {
        Self {
            rating: None,
            confidence: None,
            reason_tags: vec!["no-trust-signals".to_string()],
        }
    }

    pub fn snapshot_input(&self, vendor_id: i64) -> RatingSnapshotInput {
        RatingSnapshotInput {
            vendor_id,
            rating: self.rating,
            confidence: self.confidence,
            method_version: METHOD_VERSION.to_string(),
            reason_tags: self.reason_tags.clone(),
        }
    }
}

fn normalize_signal(signal: &str) -> String {
    signal
        .trim()
        .to_lowercase()
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("_")
}

fn signal_weight(signal: &str) -> Option<f64> {
    SIGNAL_WEIGHTS
        .iter()
        .find(|(name, _)| *name == signal)
        .map(|(_, weight)| *weight)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Score a vendor from its declared signals, listing count and optional
/// social statistics
pub fn score(signals: &[String], listing_count: u32, social: Option<&SocialStats>) -> TrustScore {
    let signals: BTreeSet<String> = signals
        .iter()
        .map(|s| normalize_signal(s))
        .filter(|s| !s.is_empty())
        .collect();
    if signals.is_empty() {
        return TrustScore::unrated();
    }

    let mut reason_tags = Vec::new();
    let mut weight_sum = 0.0;
    for signal in &signals {
        match signal_weight(signal) {
            Some(weight) if weight < 0.0 => {
                reason_tags.push(format!("risk:{}", signal));
                weight_sum += weight;
            }
            Some(weight) => {
                reason_tags.push(format!("signal:{}", signal));
                weight_sum += weight;
            }
            None => {
                reason_tags.push(format!("unrecognized:{}", signal));
                weight_sum += UNKNOWN_SIGNAL_WEIGHT;
            }
        }
    }

    let listings = f64::from(listing_count);
    let mut rating = BASE_RATING
        + weight_sum * SIGNAL_FACTOR
        + (listings * LISTING_RATING_BONUS).min(LISTING_RATING_CAP);
    let mut confidence = BASE_CONFIDENCE
        + signals.len() as f64 * SIGNAL_CONFIDENCE
        + (listings * LISTING_CONFIDENCE_BONUS).min(LISTING_CONFIDENCE_CAP);
    if listing_count > 0 {
        reason_tags.push(format!("listings:{}", listing_count));
    }

    if let Some(stats) = social.filter(|s| s.review_count > 0) {
        let sentiment = f64::from(stats.average_sentiment);
        rating += sentiment * SENTIMENT_FACTOR;
        confidence += (f64::from(stats.review_count) * REVIEW_CONFIDENCE_BONUS).min(REVIEW_CONFIDENCE_CAP)
            + (f64::from(stats.distinct_sources) * SOURCE_CONFIDENCE_BONUS).min(SOURCE_CONFIDENCE_CAP);
        reason_tags.push(format!("reviews:{}", stats.review_count));
        reason_tags.push(
            if sentiment >= 0.2 {
                "community:positive"
            } else if sentiment <= -0.2 {
                "community:negative"
            } else {
                "community:mixed"
            }
            .to_string(),
        );
    }

    TrustScore {
        rating: Some(round2(rating.clamp(0.0, MAX_RATING))),
        confidence: Some(round2(confidence.clamp(0.0, MAX_CONFIDENCE))),
        reason_tags,
    }
}
