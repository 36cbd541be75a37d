//! Evidence grade scale

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Ordered confidence label for a claim or use-case mapping.
///
/// Variants are declared weakest first so the derived `Ord` ranks `A` highest;
/// `Iterator::max` over grades yields the best one.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum EvidenceGrade {
    /// Insufficient evidence
    #[default]
    I,
    D,
    C,
    B,
    A,
}

impl EvidenceGrade {
    pub const ALL: [EvidenceGrade; 5] = [
        EvidenceGrade::A,
        EvidenceGrade::B,
        EvidenceGrade::C,
        EvidenceGrade::D,
        EvidenceGrade::I,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EvidenceGrade::A => "A",
            EvidenceGrade::B => "B",
            EvidenceGrade::C => "C",
            EvidenceGrade::D => "D",
            EvidenceGrade::I => "I",
        }
    }

    /// Short consumer-facing phrase for the grade
    pub fn describe(&self) -> &'static str {
        match self {
            EvidenceGrade::A => "strong evidence from approved labeling or late-stage trials",
            EvidenceGrade::B => "moderate evidence from mid-stage trials or a substantial literature base",
            EvidenceGrade::C => "limited evidence from early studies",
            EvidenceGrade::D => "preliminary evidence only",
            EvidenceGrade::I => "insufficient evidence",
        }
    }

    /// Best grade in a collection, `I` when empty
    pub fn best<I: IntoIterator<Item = EvidenceGrade>>(grades: I) -> EvidenceGrade {
        grades.into_iter().max().unwrap_or_default()
    }

    /// The weaker of two grades
    pub fn cap(self, ceiling: EvidenceGrade) -> EvidenceGrade {
        self.min(ceiling)
    }
}

impl fmt::Display for EvidenceGrade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EvidenceGrade {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "A" => Ok(EvidenceGrade::A),
            "B" => Ok(EvidenceGrade::B),
            "C" => Ok(EvidenceGrade::C),
            "D" => Ok(EvidenceGrade::D),
            "I" => Ok(EvidenceGrade::I),
            other => Err(format!("unknown evidence grade '{}'", other)),
        }
    }
}
