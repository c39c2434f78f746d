//! Deterministic pattern extraction.
//!
//! Three extractor families (French registry, Romanian registry, financial)
//! scan raw text with ordered regex lists — most specific pattern first,
//! first match wins per field. Matched identifiers are checked against their
//! checksum validator: a pass raises confidence to a fixed ceiling, a failure
//! lowers it to a mid-range value but keeps the match.
//!
//! `PatternEngine` merges the family outputs: the highest-confidence
//! candidate wins a field; ties keep the earlier-registered family.

pub mod financial;
pub mod french;
pub mod numeric;
pub mod romanian;
pub mod types;

pub use financial::FinancialExtractor;
pub use french::FrenchRegistryExtractor;
pub use romanian::RomanianRegistryExtractor;
pub use types::*;

use regex::Regex;

use crate::pipeline::validators;

// ──────────────────────────────────────────────
// Shared scanning machinery
// ──────────────────────────────────────────────

/// One compiled pattern with its fixed base confidence.
pub(crate) struct FieldPattern {
    pub regex: Regex,
    pub confidence: f32,
}

impl FieldPattern {
    pub fn new(pattern: &str, confidence: f32) -> Self {
        Self {
            regex: Regex::new(pattern).expect("built-in pattern must compile"),
            confidence,
        }
    }
}

/// How a raw match is turned into a typed value.
pub(crate) enum ValueKind {
    /// Digits/letters with separators stripped (spaces, dots, dashes).
    Identifier,
    /// Identifier, additionally uppercased (IBAN).
    UppercaseIdentifier,
    /// Free text, trimmed of surrounding whitespace and trailing punctuation.
    Text,
    /// Locale-aware number.
    Number,
    /// Whole count.
    Count,
}

/// Ordered pattern list for one field.
pub(crate) struct FieldRules {
    pub field: ProfileField,
    pub kind: ValueKind,
    pub patterns: Vec<FieldPattern>,
}

/// Scan the rule table: for each field, the first matching pattern whose
/// value normalizes wins; later patterns are fallbacks only.
pub(crate) fn scan_rules(text: &str, rules: &[FieldRules]) -> ExtractionResultSet {
    let mut results = ExtractionResultSet::new();

    for rule in rules {
        for pattern in &rule.patterns {
            let Some(caps) = pattern.regex.captures(text) else {
                continue;
            };
            let Some(m) = caps.get(1) else { continue };
            let raw = m.as_str();

            let Some(value) = normalize_value(&rule.kind, raw) else {
                // Shape matched but the value does not normalize (e.g. a
                // number that fails to parse) — fall through to the next
                // pattern family rather than dropping the field outright.
                continue;
            };

            let confidence = checksum_adjusted(rule.field, &value, pattern.confidence);
            results.insert(
                rule.field,
                ExtractedField::new(value, confidence, FieldSource::Pattern)
                    .with_span(m.start(), m.end())
                    .with_raw_match(raw),
            );
            break;
        }
    }

    results
}

pub(crate) fn normalize_value(kind: &ValueKind, raw: &str) -> Option<FieldValue> {
    match kind {
        ValueKind::Identifier => {
            let compact: String = raw
                .chars()
                .filter(|c| !matches!(c, ' ' | '.' | '-'))
                .collect();
            (!compact.is_empty()).then(|| FieldValue::Text(compact))
        }
        ValueKind::UppercaseIdentifier => {
            let compact: String = raw
                .chars()
                .filter(|c| !matches!(c, ' ' | '.' | '-'))
                .map(|c| c.to_ascii_uppercase())
                .collect();
            (!compact.is_empty()).then(|| FieldValue::Text(compact))
        }
        ValueKind::Text => {
            let trimmed = raw.trim().trim_end_matches([',', ';', '.']).trim();
            (!trimmed.is_empty()).then(|| FieldValue::Text(trimmed.to_string()))
        }
        ValueKind::Number => numeric::parse_localized_number(raw).map(FieldValue::Number),
        ValueKind::Count => numeric::parse_count(raw).map(|n| FieldValue::Number(n as f64)),
    }
}

/// Apply the checksum verdict for identifier fields: pass raises to the
/// ceiling, failure lowers to the mid-range floor, other fields keep their
/// base confidence.
pub(crate) fn checksum_adjusted(field: ProfileField, value: &FieldValue, base: f32) -> f32 {
    let Some(text) = value.as_text() else {
        return base;
    };
    let verdict = match field {
        ProfileField::SirenNumber => Some(validators::siren_checksum(text)),
        ProfileField::SiretNumber => Some(validators::siret_checksum(text)),
        ProfileField::CuiNumber => Some(validators::cui_checksum(text)),
        ProfileField::Cnp => Some(validators::cnp_checksum(text)),
        ProfileField::Iban => Some(validators::iban_checksum(text)),
        _ => None,
    };
    match verdict {
        Some(true) => confidence::CHECKSUM_VALID,
        Some(false) => confidence::CHECKSUM_FAILED,
        None => base,
    }
}

// ──────────────────────────────────────────────
// Engine
// ──────────────────────────────────────────────

/// The full deterministic pass: every registered family, outputs merged.
///
/// Construct once at startup and pass by reference — extractors compile
/// their regexes in `new()` and are stateless afterwards.
pub struct PatternEngine {
    extractors: Vec<Box<dyn PatternExtractor>>,
}

impl PatternEngine {
    /// Engine with the standard families. Registration order matters:
    /// ties between families keep the earlier one.
    pub fn new() -> Self {
        Self::with_extractors(vec![
            Box::new(FrenchRegistryExtractor::new()),
            Box::new(RomanianRegistryExtractor::new()),
            Box::new(FinancialExtractor::new()),
        ])
    }

    pub fn with_extractors(extractors: Vec<Box<dyn PatternExtractor>>) -> Self {
        Self { extractors }
    }

    pub fn extract(&self, text: &str) -> ExtractionResultSet {
        let mut merged = ExtractionResultSet::new();

        for extractor in &self.extractors {
            let family = extractor.family();
            for (field, candidate) in extractor.extract(text) {
                match merged.get(&field) {
                    Some(existing) if existing.confidence >= candidate.confidence => {
                        tracing::trace!(
                            field = field.as_str(),
                            family = family.as_str(),
                            "Lower-confidence duplicate match discarded"
                        );
                    }
                    _ => {
                        merged.insert(field, candidate);
                    }
                }
            }
        }

        merged
    }
}

impl Default for PatternEngine {
    fn default() -> Self {
        Self::new()
    }
}
