//! Lexicon sentiment scoring and quote extraction for community posts

use peptrack_common::catalog::truncate_chars;
use serde::{Deserialize, Serialize};

/// Denominator floor so a single weak hit cannot saturate the score
const MIN_DENOMINATOR: f32 = 1.25;

/// Total signal below which sparse text is nudged toward neutral-positive
const SPARSE_SIGNAL: f32 = 0.5;
const SPARSE_BIAS: f32 = 0.05;

const POSITIVE_THRESHOLD: f32 = 0.2;
const NEGATIVE_THRESHOLD: f32 = -0.2;

/// Quotes shorter than this are dropped unless they mention a safety event
const MIN_QUOTE_CHARS: usize = 25;
const QUOTE_BUDGET: usize = 240;
const SUBSTANTIVE_CHARS: std::ops::RangeInclusive<usize> = 40..=280;

const POSITIVE: &[(&str, f32)] = &[
    ("excellent", 1.0),
    ("legit", 0.9),
    ("reliable", 0.8),
    ("recommend", 0.8),
    ("recommended", 0.8),
    ("trusted", 0.8),
    ("great", 0.7),
    ("effective", 0.7),
    ("fast shipping", 0.6),
    ("helped", 0.6),
    ("love", 0.6),
    ("satisfied", 0.6),
    ("good", 0.5),
    ("works", 0.5),
    ("pure", 0.5),
    ("quality", 0.4),
];

const NEGATIVE: &[(&str, f32)] = &[
    ("scam", 1.5),
    ("fake", 1.2),
    ("contaminated", 1.2),
    ("never again", 1.0),
    ("underdosed", 1.0),
    ("didn t work", 0.9),
    ("did not work", 0.9),
    ("terrible", 0.9),
    ("bunk", 0.9),
    ("avoid", 0.8),
    ("sketchy", 0.8),
    ("seized", 0.7),
    ("poor", 0.6),
    ("bad", 0.5),
    ("side effects", 0.4),
    ("nausea", 0.4),
    ("refund", 0.4),
    ("warning", 0.3),
];

/// Phrases that keep a short sentence eligible as a quote
const SAFETY_PHRASES: &[&str] = &[
    "side effect",
    "nausea",
    "vomit",
    "hospital",
    "allergic",
    "reaction",
    "injection site",
    "emergency",
];

const BOILERPLATE: &[&str] = &[
    "thanks",
    "thank you",
    "thanks in advance",
    "same",
    "this",
    "bump",
    "following",
    "deleted",
    "removed",
    "lol",
    "hi all",
    "hello everyone",
    "any thoughts",
    "edit",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SentimentLabel {
    Positive,
    Negative,
    Mixed,
    /// No lexicon entry matched at all
    Neutral,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sentiment {
    pub value: f32,
    pub label: SentimentLabel,
}

/// Lowercase, strip punctuation to spaces, split into words
fn tokens(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Whole-word occurrences of `phrase` in `words`
fn count_phrase(words: &[String], phrase: &str) -> usize {
    let needle: Vec<&str> = phrase.split(' ').collect();
    if needle.is_empty() || needle.len() > words.len() {
        return 0;
    }
    words
        .windows(needle.len())
        .filter(|w| w.iter().zip(&needle).all(|(a, b)| a == b))
        .count()
}

fn weigh(words: &[String], lexicon: &[(&str, f32)]) -> f32 {
    lexicon
        .iter()
        .map(|(phrase, weight)| count_phrase(words, phrase) as f32 * weight)
        .sum()
}

/// Positive and negative lexicon weight carried by `text`
pub fn signal_weights(text: &str) -> (f32, f32) {
    let words = tokens(text);
    (weigh(&words, POSITIVE), weigh(&words, NEGATIVE))
}

/// Score `text` into a value in [-1, 1] and a label
pub fn score(text: &str) -> Sentiment {
    let (positive, negative) = signal_weights(text);
    let total = positive + negative;

    if total == 0.0 {
        return Sentiment {
            value: SPARSE_BIAS,
            label: SentimentLabel::Neutral,
        };
    }

    let mut value = (positive - negative) / total.max(MIN_DENOMINATOR);
    if total < SPARSE_SIGNAL {
        value += SPARSE_BIAS;
    }
    let value = (value.clamp(-1.0, 1.0) * 100.0).round() / 100.0;

    let label = if value >= POSITIVE_THRESHOLD {
        SentimentLabel::Positive
    } else if value <= NEGATIVE_THRESHOLD {
        SentimentLabel::Negative
    } else if value >= 0.0 {
        SentimentLabel::Positive
    } else {
        SentimentLabel::Mixed
    };

    Sentiment { value, label }
}

/// Split on sentence punctuation followed by whitespace, and on newlines
fn sentences(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '\n' || c == '\r' {
            out.push(std::mem::take(&mut current));
            continue;
        }
        current.push(c);
        if matches!(c, '.' | '!' | '?') && chars.peek().map_or(true, |n| n.is_whitespace()) {
            out.push(std::mem::take(&mut current));
        }
    }
    out.push(current);

    out.into_iter()
        .map(|s| s.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|s| !s.is_empty())
        .collect()
}

fn is_boilerplate(sentence: &str) -> bool {
    let words = tokens(sentence);
    if words.len() <= 1 {
        return true;
    }
    let joined = words.join(" ");
    joined.starts_with("edit ") || BOILERPLATE.contains(&joined.as_str())
}

fn mentions_safety(sentence: &str) -> bool {
    let lower = sentence.to_lowercase();
    SAFETY_PHRASES.iter().any(|p| lower.contains(p))
}

/// Pick the most informative sentence from a post.
///
/// Ranked by mention of `term`, presence of sentiment signal, then a
/// substantive length; ties keep the earliest sentence.
pub fn extract_quote(title: &str, body: &str, term: &str) -> Option<String> {
    let term = term.to_lowercase();
    let mut best: Option<((bool, bool, bool), String)> = None;

    for sentence in sentences(title).into_iter().chain(sentences(body)) {
        if is_boilerplate(&sentence) {
            continue;
        }
        let len = sentence.chars().count();
        if len < MIN_QUOTE_CHARS && !mentions_safety(&sentence) {
            continue;
        }

        let (positive, negative) = signal_weights(&sentence);
        let rank = (
            !term.is_empty() && sentence.to_lowercase().contains(&term),
            positive + negative > 0.0,
            SUBSTANTIVE_CHARS.contains(&len),
        );

        if best.as_ref().map_or(true, |(top, _)| rank > *top) {
            best = Some((rank, sentence));
        }
    }

    best.map(|(_, sentence)| truncate_chars(&sentence, QUOTE_BUDGET))
}
