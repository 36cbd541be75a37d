//! Evidence grade inference
//!
//! The grade is the first rule in `RULES` whose predicate holds. Rules are
//! ordered most-confident first; thresholds come from `GradingConfig`.

use crate::bundle::SourceBundle;
use peptrack_common::config::GradingConfig;
use peptrack_common::EvidenceGrade;

/// The counts and flags grading looks at
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GradeInputs {
    pub label_found: bool,
    pub completed_trials: u32,
    pub total_trials: u32,
    pub max_phase: f32,
    pub literature_count: u64,
}

impl From<&SourceBundle> for GradeInputs {
    fn from(bundle: &SourceBundle) -> Self {
        Self {
            label_found: bundle.label.found,
            completed_trials: bundle.trials.completed,
            total_trials: bundle.trials.total,
            max_phase: bundle.max_phase(),
            literature_count: bundle.literature.count,
        }
    }
}

pub struct GradeRule {
    pub name: &'static str,
    pub grade: EvidenceGrade,
    pub applies: fn(&GradeInputs, &GradingConfig) -> bool,
}

pub const RULES: &[GradeRule] = &[
    GradeRule {
        name: "label-with-completed-trials",
        grade: EvidenceGrade::A,
        applies: |i, c| i.label_found && i.completed_trials >= c.label_completed_trials,
    },
    GradeRule {
        name: "late-phase-with-trial-volume",
        grade: EvidenceGrade::A,
        applies: |i, c| i.max_phase >= c.top_tier_phase && i.total_trials >= c.top_tier_total_trials,
    },
    GradeRule {
        name: "mid-phase-or-completed-trials-or-literature",
        grade: EvidenceGrade::B,
        applies: |i, c| {
            i.max_phase >= c.mid_tier_phase
                || i.completed_trials >= c.b_completed_trials
                || i.literature_count >= c.b_literature_count
        },
    },
    GradeRule {
        name: "trial-or-literature-volume",
        grade: EvidenceGrade::C,
        applies: |i, c| i.total_trials >= c.c_total_trials || i.literature_count >= c.c_literature_count,
    },
    GradeRule {
        name: "any-trial-or-literature",
        grade: EvidenceGrade::D,
        applies: |i, _| i.total_trials > 0 || i.literature_count > 0,
    },
];

/// First matching rule, if any
pub fn matching_rule(inputs: &GradeInputs, config: &GradingConfig) -> Option<&'static GradeRule> {
    RULES.iter().find(|rule| (rule.applies)(inputs, config))
}

pub fn grade_inputs(inputs: &GradeInputs, config: &GradingConfig) -> EvidenceGrade {
    matching_rule(inputs, config)
        .map(|rule| rule.grade)
        .unwrap_or(EvidenceGrade::I)
}

/// Grade a whole bundle
pub fn infer_grade(bundle: &SourceBundle, config: &GradingConfig) -> EvidenceGrade {
    grade_inputs(&GradeInputs::from(bundle), config)
}

/// Name of the rule that decided the grade, for logs
pub fn explain(bundle: &SourceBundle, config: &GradingConfig) -> &'static str {
    matching_rule(&GradeInputs::from(bundle), config)
        .map(|rule| rule.name)
        .unwrap_or("no-evidence")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grade(inputs: GradeInputs) -> EvidenceGrade {
        grade_inputs(&inputs, &GradingConfig::default())
    }

    #[test]
    fn test_label_with_completed_trials_is_a() {
        let mut bundle = SourceBundle::default();
        bundle.label.found = true;
        bundle.trials.completed = 6;
        bundle.trials.total = 6;
        assert_eq!(infer_grade(&bundle, &GradingConfig::default()), EvidenceGrade::A);
        assert_eq!(explain(&bundle, &GradingConfig::default()), "label-with-completed-trials");
    }

    #[test]
    fn test_few_trials_no_label_is_d() {
        let mut bundle = SourceBundle::default();
        bundle.trials.total = 3;
        assert_eq!(infer_grade(&bundle, &GradingConfig::default()), EvidenceGrade::D);
    }

    #[test]
    fn test_empty_bundle_is_i() {
        let bundle = SourceBundle::default();
        assert_eq!(infer_grade(&bundle, &GradingConfig::default()), EvidenceGrade::I);
        assert_eq!(explain(&bundle, &GradingConfig::default()), "no-evidence");
    }

    #[test]
    fn test_late_phase_volume_is_a() {
        assert_eq!(
            grade(GradeInputs {
                max_phase: 3.0,
                total_trials: 8,
                ..Default::default()
            }),
            EvidenceGrade::A
        );
        assert_eq!(
            grade(GradeInputs {
                max_phase: 3.0,
                total_trials: 7,
                ..Default::default()
            }),
            EvidenceGrade::B
        );
    }

    #[test]
    fn test_b_and_c_boundaries() {
        assert_eq!(grade(GradeInputs { literature_count: 40, ..Default::default() }), EvidenceGrade::B);
        assert_eq!(grade(GradeInputs { literature_count: 39, ..Default::default() }), EvidenceGrade::C);
        assert_eq!(grade(GradeInputs { literature_count: 12, ..Default::default() }), EvidenceGrade::C);
        assert_eq!(grade(GradeInputs { literature_count: 11, ..Default::default() }), EvidenceGrade::D);
        assert_eq!(grade(GradeInputs { total_trials: 5, ..Default::default() }), EvidenceGrade::C);
        assert_eq!(
            grade(GradeInputs { completed_trials: 3, total_trials: 3, ..Default::default() }),
            EvidenceGrade::B
        );
    }

    #[test]
    fn test_label_alone_is_not_enough() {
        assert_eq!(grade(GradeInputs { label_found: true, ..Default::default() }), EvidenceGrade::I);
    }

    #[test]
    fn test_chembl_phase_counts_toward_mid_tier() {
        let mut bundle = SourceBundle::default();
        bundle.molecule.max_phase = 2.0;
        assert_eq!(infer_grade(&bundle, &GradingConfig::default()), EvidenceGrade::B);
    }

    #[test]
    fn test_grade_monotonic_in_completed_trials() {
        let config = GradingConfig::default();
        for label_found in [false, true] {
            for total_trials in [0, 2, 5, 9] {
                for literature_count in [0, 12, 40] {
                    for max_phase in [0.0, 2.0, 3.0] {
                        let mut previous = EvidenceGrade::I;
                        for completed_trials in 0..=10 {
                            let inputs = GradeInputs {
                                label_found,
                                completed_trials,
                                total_trials: total_trials.max(completed_trials),
                                max_phase,
                                literature_count,
                            };
                            let current = grade_inputs(&inputs, &config);
                            assert!(
                                current >= previous,
                                "grade dropped from {previous:?} to {current:?} for {inputs:?}"
                            );
                            previous = current;
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn test_thresholds_are_configurable() {
        let strict = GradingConfig {
            c_literature_count: 100,
            ..GradingConfig::default()
        };
        let inputs = GradeInputs { literature_count: 20, ..Default::default() };
        assert_eq!(grade_inputs(&inputs, &strict), EvidenceGrade::D);
    }
}
