//! Discrete per-field merge of pattern and AI results.
//!
//! Never a numeric blend: each field takes exactly one candidate so its
//! `source` stays traceable for audit. The pattern result is kept whenever
//! its confidence reaches the preference threshold; below it the AI result
//! wins whenever present — including at equal confidence (see DESIGN.md).
//! AI-only fields are always included.

use crate::pipeline::patterns::ExtractionResultSet;

/// Pattern results at or above this confidence are kept over AI results.
pub const PATTERN_PREFERENCE_THRESHOLD: f32 = 0.70;

pub fn merge_results(
    pattern: &ExtractionResultSet,
    ai: &ExtractionResultSet,
    preference_threshold: f32,
) -> ExtractionResultSet {
    let mut merged = pattern.clone();

    for (field, ai_field) in ai {
        match merged.get(field) {
            Some(existing) if existing.confidence >= preference_threshold => {
                // Deterministic source kept at the trusted end
            }
            _ => {
                merged.insert(*field, ai_field.clone());
            }
        }
    }

    merged
}
