//! Financial filings, subsidy descriptions and contact details.
//!
//! Language-neutral family: turnover and employee counts from FR/RO
//! financial statements, subsidy ceilings ("montant maximum de 50 000 €",
//! "sumă maximă de 200.000 lei"), bank accounts, agricultural surface,
//! emails and phone numbers.

use regex::Regex;

use super::{
    confidence, numeric, scan_rules, ExtractedField, ExtractionResultSet, ExtractorFamily,
    FieldPattern, FieldRules, FieldSource, FieldValue, PatternExtractor, ProfileField, ValueKind,
};

/// Subsidy-amount pattern: captures the amount and its currency marker in one
/// pass so both fields share a source span.
struct AmountPattern {
    regex: Regex,
    confidence: f32,
}

pub struct FinancialExtractor {
    rules: Vec<FieldRules>,
    amount_patterns: Vec<AmountPattern>,
}

impl FinancialExtractor {
    pub fn new() -> Self {
        let rules = vec![
            FieldRules {
                field: ProfileField::Iban,
                kind: ValueKind::UppercaseIdentifier,
                patterns: vec![
                    FieldPattern::new(
                        r"(?i)IBAN\s*:?\s*([A-Z]{2}\s?\d{2}(?:\s?[A-Z0-9]{1,4}){3,8})",
                        confidence::LABELED,
                    ),
                    FieldPattern::new(
                        r"\b((?:FR|RO)\d{2}[A-Z0-9]{11,28})\b",
                        confidence::BARE,
                    ),
                ],
            },
            FieldRules {
                field: ProfileField::Turnover,
                kind: ValueKind::Number,
                patterns: vec![FieldPattern::new(
                    r"(?i)(?:chiffre\s+d['’]affaires(?:\s+net)?|cifra\s+de\s+afaceri(?:\s+net[ăa])?|turnover)\s*:?\s*(\d[\d \u{00A0}.,]*\d|\d)",
                    confidence::LABELED,
                )],
            },
            FieldRules {
                field: ProfileField::EmployeeCount,
                kind: ValueKind::Count,
                patterns: vec![
                    FieldPattern::new(
                        r"(?i)(?:effectif(?:\s+moyen)?|nombre\s+de\s+salari[ée]s|num[ăa]r\s+(?:mediu\s+)?de\s+salaria[țţt]i)\s*:?\s*(\d[\d ]*)\b",
                        confidence::LABELED,
                    ),
                    FieldPattern::new(
                        r"(?i)\b(\d[\d ]*)\s+salari[ațéţț]+[si]?\b",
                        confidence::CONTEXTUAL,
                    ),
                ],
            },
            FieldRules {
                field: ProfileField::LandAreaHa,
                kind: ValueKind::Number,
                patterns: vec![
                    FieldPattern::new(
                        r"(?i)(?:surface\s+agricole(?:\s+utile)?|superficie|suprafa[țţt][ăa](?:\s+agricol[ăa])?)\s*(?:de|:)?\s*(\d[\d .,]*\d|\d)\s*(?:ha\b|hectares?\b|hectare\b)",
                        confidence::CONTEXTUAL,
                    ),
                    FieldPattern::new(
                        r"(?i)\b(\d[\d .,]*\d|\d)\s*(?:ha|hectares?|hectare)\b",
                        confidence::BARE,
                    ),
                ],
            },
            FieldRules {
                field: ProfileField::ContactEmail,
                kind: ValueKind::Text,
                patterns: vec![FieldPattern::new(
                    r"\b([A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,})\b",
                    confidence::LABELED,
                )],
            },
            FieldRules {
                field: ProfileField::ContactPhone,
                kind: ValueKind::Identifier,
                patterns: vec![
                    FieldPattern::new(
                        r"(?i)(?:t[ée]l(?:[ée]phone)?\.?|telefon|tel\.?)\s*:?\s*((?:\+\d{2,3}[ .]?)?\d{1,4}(?:[ .]?\d{2,4}){2,5})\b",
                        confidence::LABELED,
                    ),
                    FieldPattern::new(
                        r"(\+(?:33|40)[ .]?\d{1,3}(?:[ .]?\d{2,4}){2,4})\b",
                        confidence::CONTEXTUAL,
                    ),
                ],
            },
        ];

        let amount_patterns = vec![
            AmountPattern {
                regex: Regex::new(
                    r"(?i)(?:montant\s+maxim(?:um|al)|aide\s+maximale|plafond(?:\s+de\s+l['’]aide)?|sum[ăa]\s+maxim[ăa]|valoare\s+maxim[ăa])\s*(?:de|:)?\s*(\d[\d \u{00A0}.,]*\d|\d)\s*(€|EUR|euros?|lei|RON)\b",
                )
                .expect("built-in pattern must compile"),
                confidence: confidence::LABELED,
            },
            AmountPattern {
                regex: Regex::new(
                    r"(?i)(?:jusqu'[àa]|p[âa]n[ăa]\s+la)\s*(\d[\d \u{00A0}.,]*\d|\d)\s*(€|EUR|euros?|lei|RON)\b",
                )
                .expect("built-in pattern must compile"),
                confidence: confidence::CONTEXTUAL,
            },
        ];

        Self {
            rules,
            amount_patterns,
        }
    }

    fn scan_amounts(&self, text: &str, results: &mut ExtractionResultSet) {
        for pattern in &self.amount_patterns {
            let Some(caps) = pattern.regex.captures(text) else {
                continue;
            };
            let (Some(amount_match), Some(currency_match)) = (caps.get(1), caps.get(2)) else {
                continue;
            };
            let Some(amount) = numeric::parse_localized_number(amount_match.as_str()) else {
                continue;
            };

            results.insert(
                ProfileField::MaxAmount,
                ExtractedField::new(
                    FieldValue::Number(amount),
                    pattern.confidence,
                    FieldSource::Pattern,
                )
                .with_span(amount_match.start(), amount_match.end())
                .with_raw_match(amount_match.as_str()),
            );
            results.insert(
                ProfileField::Currency,
                ExtractedField::new(
                    FieldValue::Text(normalize_currency(currency_match.as_str())),
                    pattern.confidence,
                    FieldSource::Pattern,
                )
                // Both fields point at the amount span for auditability
                .with_span(amount_match.start(), amount_match.end())
                .with_raw_match(currency_match.as_str()),
            );
            break;
        }
    }
}

fn normalize_currency(raw: &str) -> String {
    match raw.to_lowercase().as_str() {
        "€" | "eur" | "euro" | "euros" => "EUR".to_string(),
        "lei" | "ron" => "RON".to_string(),
        other => other.to_uppercase(),
    }
}

impl Default for FinancialExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl PatternExtractor for FinancialExtractor {
    fn family(&self) -> ExtractorFamily {
        ExtractorFamily::Financial
    }

    fn extract(&self, text: &str) -> ExtractionResultSet {
        let mut results = scan_rules(text, &self.rules);
        self.scan_amounts(text, &mut results);
        results
    }
}
