//! Extraction quality assessment — the escalation decision.
//!
//! Aggregates a pattern pass into an overall confidence and decides whether
//! the AI collaborator is worth its cost. Fields that were never found are
//! excluded from the average: absence is not failure.

use serde::{Deserialize, Serialize};

use super::patterns::{ExtractionResultSet, ProfileField};

/// Default overall-confidence bar below which escalation triggers.
pub const DEFAULT_ESCALATION_THRESHOLD: f32 = 0.75;

/// Default stricter bar applied to priority fields individually.
pub const DEFAULT_PRIORITY_BAR: f32 = 0.85;

/// Default minimum share of schema fields that must be extracted.
pub const DEFAULT_MIN_COVERAGE_RATIO: f32 = 0.5;

#[derive(Debug, Clone)]
pub struct AssessorConfig {
    /// Escalate when mean confidence over extracted fields falls below this.
    pub escalation_threshold: f32,
    /// Fields whose individual confidence is held to `priority_bar`; a single
    /// weak priority field forces escalation regardless of the overall mean.
    pub priority_fields: Vec<ProfileField>,
    pub priority_bar: f32,
    /// Escalate when fewer than this share of schema fields were extracted.
    pub min_coverage_ratio: f32,
    /// Per-field bar used to build the escalation field list.
    pub field_confidence_threshold: f32,
}

impl Default for AssessorConfig {
    fn default() -> Self {
        Self {
            escalation_threshold: DEFAULT_ESCALATION_THRESHOLD,
            priority_fields: vec![
                ProfileField::SiretNumber,
                ProfileField::CuiNumber,
                ProfileField::Turnover,
                ProfileField::Iban,
            ],
            priority_bar: DEFAULT_PRIORITY_BAR,
            min_coverage_ratio: DEFAULT_MIN_COVERAGE_RATIO,
            field_confidence_threshold: 0.70,
        }
    }
}

/// Outcome of assessing one result set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityAssessment {
    pub overall_confidence: f32,
    pub extracted_count: usize,
    pub total_fields: usize,
    pub needs_escalation: bool,
    /// Fields worth sending to the AI: weak or missing priority fields plus
    /// any extracted field below the per-field bar.
    pub escalation_fields: Vec<ProfileField>,
}

/// Assess a pattern pass.
pub fn assess(results: &ExtractionResultSet, config: &AssessorConfig) -> QualityAssessment {
    let total_fields = ProfileField::all().len();
    let extracted_count = results.len();

    // Mean over extracted fields only — missing fields are not zeros.
    let overall_confidence = if extracted_count == 0 {
        0.0
    } else {
        results.values().map(|f| f.confidence).sum::<f32>() / extracted_count as f32
    };

    let mut escalation_fields: Vec<ProfileField> = Vec::new();
    for field in ProfileField::all() {
        let is_priority = config.priority_fields.contains(field);
        match results.get(field) {
            Some(extracted) => {
                let bar = if is_priority {
                    config.priority_bar
                } else {
                    config.field_confidence_threshold
                };
                if extracted.confidence < bar {
                    escalation_fields.push(*field);
                }
            }
            None if is_priority => escalation_fields.push(*field),
            None => {}
        }
    }

    let coverage_short =
        (extracted_count as f32) < config.min_coverage_ratio * total_fields as f32;
    let weak_priority = config.priority_fields.iter().any(|f| match results.get(f) {
        Some(extracted) => extracted.confidence < config.priority_bar,
        None => true,
    });

    let needs_escalation = overall_confidence < config.escalation_threshold
        || coverage_short
        || weak_priority;

    QualityAssessment {
        overall_confidence,
        extracted_count,
        total_fields,
        needs_escalation,
        escalation_fields,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::patterns::{ExtractedField, FieldSource};

    fn set_with(fields: &[(ProfileField, f32)]) -> ExtractionResultSet {
        let mut set = ExtractionResultSet::new();
        for (field, conf) in fields {
            set.insert(
                *field,
                ExtractedField::new("x".into(), *conf, FieldSource::Pattern),
            );
        }
        set
    }

    fn no_priority_config() -> AssessorConfig {
        AssessorConfig {
            priority_fields: vec![],
            min_coverage_ratio: 0.0,
            ..AssessorConfig::default()
        }
    }

    #[test]
    fn missing_fields_do_not_drag_down_confidence() {
        // Two strong fields out of twenty: the mean must ignore the absences.
        let set = set_with(&[
            (ProfileField::SiretNumber, 0.98),
            (ProfileField::FarmName, 0.90),
        ]);
        let assessment = assess(&set, &no_priority_config());
        assert!((assessment.overall_confidence - 0.94).abs() < 0.001);
        assert_eq!(assessment.extracted_count, 2);
        assert_eq!(assessment.total_fields, ProfileField::all().len());
    }

    #[test]
    fn empty_set_has_zero_confidence() {
        let assessment = assess(&ExtractionResultSet::new(), &AssessorConfig::default());
        assert_eq!(assessment.overall_confidence, 0.0);
        assert!(assessment.needs_escalation);
    }

    #[test]
    fn low_overall_confidence_escalates() {
        let set = set_with(&[
            (ProfileField::FarmName, 0.5),
            (ProfileField::Address, 0.6),
        ]);
        let assessment = assess(&set, &no_priority_config());
        assert!(assessment.needs_escalation);
    }

    #[test]
    fn strong_results_do_not_escalate() {
        let set = set_with(&[
            (ProfileField::FarmName, 0.9),
            (ProfileField::Address, 0.85),
        ]);
        let assessment = assess(&set, &no_priority_config());
        assert!(!assessment.needs_escalation);
    }

    #[test]
    fn sparse_coverage_escalates_despite_high_confidence() {
        let set = set_with(&[(ProfileField::FarmName, 0.98)]);
        let config = AssessorConfig {
            priority_fields: vec![],
            ..AssessorConfig::default()
        };
        let assessment = assess(&set, &config);
        assert!(assessment.needs_escalation, "1/20 fields is below 50% coverage");
    }

    #[test]
    fn weak_priority_field_cannot_hide_behind_strong_mean() {
        // Overall mean is excellent, but SIRET (priority) is weak.
        let set = set_with(&[
            (ProfileField::SiretNumber, 0.45),
            (ProfileField::CuiNumber, 0.98),
            (ProfileField::Turnover, 0.98),
            (ProfileField::Iban, 0.98),
            (ProfileField::FarmName, 0.98),
            (ProfileField::Address, 0.98),
            (ProfileField::LegalForm, 0.98),
            (ProfileField::ContactEmail, 0.98),
            (ProfileField::ContactPhone, 0.98),
            (ProfileField::ApeCode, 0.98),
        ]);
        let assessment = assess(&set, &AssessorConfig::default());
        assert!(assessment.overall_confidence > 0.9);
        assert!(assessment.needs_escalation);
        assert!(assessment.escalation_fields.contains(&ProfileField::SiretNumber));
    }

    #[test]
    fn missing_priority_field_listed_for_escalation() {
        let set = set_with(&[
            (ProfileField::SiretNumber, 0.98),
            (ProfileField::CuiNumber, 0.98),
            (ProfileField::Iban, 0.98),
        ]);
        let assessment = assess(&set, &AssessorConfig::default());
        // Turnover is priority and absent
        assert!(assessment.escalation_fields.contains(&ProfileField::Turnover));
        assert!(assessment.needs_escalation);
    }

    #[test]
    fn non_priority_weak_field_listed_but_does_not_force_escalation() {
        let set = set_with(&[
            (ProfileField::SiretNumber, 0.98),
            (ProfileField::CuiNumber, 0.98),
            (ProfileField::Turnover, 0.98),
            (ProfileField::Iban, 0.98),
            (ProfileField::FarmName, 0.98),
            (ProfileField::Address, 0.5),
            (ProfileField::LegalForm, 0.98),
            (ProfileField::ContactEmail, 0.98),
            (ProfileField::ContactPhone, 0.98),
            (ProfileField::ApeCode, 0.98),
        ]);
        let assessment = assess(&set, &AssessorConfig::default());
        assert!(assessment.escalation_fields.contains(&ProfileField::Address));
        assert!(!assessment.needs_escalation);
    }
}
