//! Slug, alias and placeholder helpers

use std::sync::OnceLock;

/// Marker carried by machine-generated text that is not yet backed by source data.
/// Curated text never contains it.
pub const PLACEHOLDER_MARKER: &str = "[pending curation]";

/// URL-safe, lowercase, hyphenated slug
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut last_dash = true;
    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
    }
    slug.trim_end_matches('-').to_string()
}

/// Case/format-normalized alias used for comparisons.
///
/// Lowercases, folds every run of non-alphanumeric characters to one space, so
/// "BPC-157", "bpc 157" and "BPC_157" compare equal.
pub fn normalize_alias(alias: &str) -> String {
    static SEPARATORS: OnceLock<regex_lite::Regex> = OnceLock::new();
    let re = SEPARATORS.get_or_init(|| {
        regex_lite::Regex::new(r"[^a-z0-9]+").expect("static separator pattern")
    });
    let lowered = alias.to_lowercase();
    re.replace_all(&lowered, " ").trim().to_string()
}

/// Truncate to at most `max_chars` characters, ending with "..." when cut.
/// Cuts at the last word boundary inside the budget when one exists.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    let text = text.trim();
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    if max_chars <= 3 {
        return text.chars().take(max_chars).collect();
    }
    let budget = max_chars - 3;
    let cut: String = text.chars().take(budget).collect();
    let trimmed = match cut.rfind(char::is_whitespace) {
        Some(pos) if pos > budget / 2 => &cut[..pos],
        _ => cut.as_str(),
    };
    format!("{}...", trimmed.trim_end_matches(|c: char| c.is_whitespace() || c == ','))
}

/// Wrap text as a placeholder
pub fn placeholder(text: &str) -> String {
    format!("{} {}", PLACEHOLDER_MARKER, text.trim())
}

pub fn is_placeholder(text: &str) -> bool {
    text.contains(PLACEHOLDER_MARKER)
}

/// Outcome of merging a generated value into a stored field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldMerge {
    /// Stored value stays as it is
    Keep,
    /// Stored value is replaced with the generated one
    Replace(String),
}

/// Precedence rule for machine writes into curatable text fields:
/// - empty, missing or placeholder fields take the generated value;
/// - fields a previous machine write produced take newer generated text;
/// - a placeholder never replaces real text;
/// - curated (non-placeholder) fields are never overwritten.
pub fn merge_field(existing: Option<&str>, generated: &str, machine_owned: bool) -> FieldMerge {
    match existing {
        Some(current) if current == generated => FieldMerge::Keep,
        _ if generated.trim().is_empty() => FieldMerge::Keep,
        Some(current) if !current.trim().is_empty() && !is_placeholder(current) => {
            if machine_owned && !is_placeholder(generated) {
                FieldMerge::Replace(generated.to_string())
            } else {
                FieldMerge::Keep
            }
        }
        _ => FieldMerge::Replace(generated.to_string()),
    }
}
