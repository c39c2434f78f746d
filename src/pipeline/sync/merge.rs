//! Deterministic form merge.
//!
//! For each field the winning source is the one with the highest confidence;
//! ties prefer the most recently produced source, then manual over
//! extraction. Manual edits carry confidence 1.0 and are the newest input in
//! practice, so a human correction always wins.

use chrono::NaiveDateTime;

use super::types::{FormDataState, MergeInputs};

struct Candidate {
    value: serde_json::Value,
    confidence: f32,
    tag: String,
    produced_at: NaiveDateTime,
    is_manual: bool,
}

fn beats(challenger: &Candidate, incumbent: &Candidate) -> bool {
    if challenger.confidence != incumbent.confidence {
        return challenger.confidence > incumbent.confidence;
    }
    if challenger.produced_at != incumbent.produced_at {
        return challenger.produced_at > incumbent.produced_at;
    }
    challenger.is_manual && !incumbent.is_manual
}

/// Recompute the full form from the merge inputs.
pub fn merge_form_data(inputs: &MergeInputs) -> FormDataState {
    let mut winners: std::collections::BTreeMap<String, Candidate> =
        std::collections::BTreeMap::new();

    let mut consider = |field: String, candidate: Candidate| match winners.get(&field) {
        Some(current) if !beats(&candidate, current) => {}
        _ => {
            winners.insert(field, candidate);
        }
    };

    for extraction in &inputs.extractions {
        for (field, extracted) in &extraction.fields {
            consider(
                field.as_str().to_string(),
                Candidate {
                    value: extracted.value.to_json(),
                    confidence: extracted.confidence,
                    tag: format!("extraction_{}", extracted.source.as_str()),
                    produced_at: extraction.completed_at,
                    is_manual: false,
                },
            );
        }
    }

    for edit in &inputs.edits {
        consider(
            edit.field.clone(),
            Candidate {
                value: edit.value.clone(),
                confidence: 1.0,
                tag: format!("manual_edit_{}", edit.document_id),
                produced_at: edit.edited_at,
                is_manual: true,
            },
        );
    }

    let now = chrono::Utc::now().naive_utc().format("%Y-%m-%dT%H:%M:%S%.3f").to_string();
    let mut form = FormDataState::new();
    for (field, winner) in winners {
        form.set_field(&field, winner.value, &winner.tag, &now);
    }
    form
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::jobs::StoredExtraction;
    use crate::pipeline::patterns::{
        ExtractedField, ExtractionResultSet, FieldSource, ProfileField,
    };
    use crate::review::ReviewEdit;
    use chrono::NaiveDate;
    use uuid::Uuid;

    fn at(hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 8, 1)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    fn extraction(
        document_id: Uuid,
        completed_at: NaiveDateTime,
        fields: &[(ProfileField, &str, f32, FieldSource)],
    ) -> StoredExtraction {
        let mut set = ExtractionResultSet::new();
        for (field, value, conf, source) in fields {
            set.insert(*field, ExtractedField::new((*value).into(), *conf, *source));
        }
        StoredExtraction {
            document_id,
            job_id: None,
            fields: set,
            overall_confidence: 0.9,
            ai_invoked: false,
            completed_at,
        }
    }

    #[test]
    fn manual_edit_beats_pattern_result() {
        let doc = Uuid::new_v4();
        let inputs = MergeInputs {
            extractions: vec![extraction(
                doc,
                at(10),
                &[(ProfileField::FarmName, "Pattern Farm", 0.6, FieldSource::Pattern)],
            )],
            edits: vec![ReviewEdit {
                document_id: doc,
                field: "farm_name".into(),
                value: serde_json::json!("Edited Farm"),
                edited_at: at(11),
            }],
        };

        let form = merge_form_data(&inputs);
        assert_eq!(form.get("farm_name"), Some(&serde_json::json!("Edited Farm")));
        assert_eq!(
            form.source_of("farm_name"),
            Some(format!("manual_edit_{doc}").as_str())
        );
    }

    #[test]
    fn highest_confidence_extraction_wins() {
        let doc_a = Uuid::new_v4();
        let doc_b = Uuid::new_v4();
        let inputs = MergeInputs {
            extractions: vec![
                extraction(
                    doc_a,
                    at(10),
                    &[(ProfileField::Turnover, "100", 0.55, FieldSource::Ai)],
                ),
                extraction(
                    doc_b,
                    at(9),
                    &[(ProfileField::Turnover, "250", 0.98, FieldSource::Pattern)],
                ),
            ],
            edits: vec![],
        };

        let form = merge_form_data(&inputs);
        assert_eq!(form.get("turnover"), Some(&serde_json::json!("250")));
        assert_eq!(form.source_of("turnover"), Some("extraction_pattern"));
    }

    #[test]
    fn equal_confidence_prefers_most_recent() {
        let inputs = MergeInputs {
            extractions: vec![
                extraction(
                    Uuid::new_v4(),
                    at(9),
                    &[(ProfileField::Address, "old address", 0.8, FieldSource::Pattern)],
                ),
                extraction(
                    Uuid::new_v4(),
                    at(12),
                    &[(ProfileField::Address, "new address", 0.8, FieldSource::Pattern)],
                ),
            ],
            edits: vec![],
        };

        let form = merge_form_data(&inputs);
        assert_eq!(form.get("address"), Some(&serde_json::json!("new address")));
    }

    #[test]
    fn fields_union_across_sources() {
        let doc = Uuid::new_v4();
        let inputs = MergeInputs {
            extractions: vec![extraction(
                doc,
                at(10),
                &[
                    (ProfileField::SiretNumber, "73282932000074", 0.98, FieldSource::Pattern),
                    (ProfileField::FarmName, "EARL du Vallon", 0.9, FieldSource::Pattern),
                ],
            )],
            edits: vec![ReviewEdit {
                document_id: doc,
                field: "contact_email".into(),
                value: serde_json::json!("f@exemple.fr"),
                edited_at: at(11),
            }],
        };

        let form = merge_form_data(&inputs);
        let mut names = form.field_names();
        names.sort();
        assert_eq!(names, vec!["contact_email", "farm_name", "siret_number"]);
    }

    #[test]
    fn empty_inputs_give_empty_form() {
        let form = merge_form_data(&MergeInputs::default());
        assert!(form.is_empty());
    }

    #[test]
    fn merge_is_deterministic() {
        let doc = Uuid::new_v4();
        let inputs = MergeInputs {
            extractions: vec![extraction(
                doc,
                at(10),
                &[(ProfileField::FarmName, "X", 0.9, FieldSource::Pattern)],
            )],
            edits: vec![],
        };
        let a = merge_form_data(&inputs);
        let b = merge_form_data(&inputs);
        assert_eq!(a.get("farm_name"), b.get("farm_name"));
        assert_eq!(a.source_of("farm_name"), b.source_of("farm_name"));
    }
}
