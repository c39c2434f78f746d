//! Romanian registry extracts (certificat de înregistrare, ONRC extras).
//!
//! Covers the identifiers ONRC paperwork actually carries: CUI/CIF fiscal
//! codes, trade-registry numbers (J40/1234/2020), administrator CNPs, CAEN
//! activity codes. Handles both modern comma-below diacritics (ș, ț) and the
//! legacy cedilla forms (ş, ţ) still found in older documents.

use super::{
    confidence, scan_rules, ExtractionResultSet, ExtractorFamily, FieldPattern, FieldRules,
    PatternExtractor, ProfileField, ValueKind,
};

pub struct RomanianRegistryExtractor {
    rules: Vec<FieldRules>,
}

impl RomanianRegistryExtractor {
    pub fn new() -> Self {
        let rules = vec![
            FieldRules {
                field: ProfileField::CuiNumber,
                kind: ValueKind::Identifier,
                patterns: vec![
                    FieldPattern::new(
                        r"(?i)\b(?:C\.?U\.?I\.?|C\.?I\.?F\.?|cod\s+unic\s+de\s+[îi]nregistrare|cod\s+fiscal)\s*:?\s*(?:RO\s?)?(\d{2,10})\b",
                        confidence::LABELED,
                    ),
                    FieldPattern::new(r"\bRO\s?(\d{2,10})\b", confidence::CONTEXTUAL),
                ],
            },
            FieldRules {
                field: ProfileField::OnrcNumber,
                kind: ValueKind::UppercaseIdentifier,
                patterns: vec![
                    FieldPattern::new(
                        r"(?i)(?:num[ăa]r\s+de\s+ordine|nr\.?\s*(?:de\s+ordine)?)\s+[îi]n\s+registrul\s+comer[țţt]ului\s*:?\s*([JFC]\s?\d{1,2}/\d{1,7}/\d{4})\b",
                        confidence::LABELED,
                    ),
                    FieldPattern::new(r"\b([JFC]\d{1,2}/\d{1,7}/\d{4})\b", confidence::CONTEXTUAL),
                ],
            },
            FieldRules {
                field: ProfileField::Cnp,
                kind: ValueKind::Identifier,
                patterns: vec![
                    FieldPattern::new(
                        r"(?i)\bC\.?N\.?P\.?\s*:?\s*(\d{13})\b",
                        confidence::LABELED,
                    ),
                    FieldPattern::new(r"\b(\d{13})\b", confidence::BARE),
                ],
            },
            FieldRules {
                field: ProfileField::CaenCode,
                kind: ValueKind::Identifier,
                patterns: vec![FieldPattern::new(
                    r"(?i)(?:cod\s+)?CAEN\s*:?\s*(\d{4})\b",
                    confidence::LABELED,
                )],
            },
            FieldRules {
                field: ProfileField::FarmName,
                kind: ValueKind::Text,
                patterns: vec![FieldPattern::new(
                    r"(?i)denumirea?(?:\s+(?:firmei|societ[ăa][țţt]ii))?\s*:?\s*([^\n]+)",
                    confidence::LABELED,
                )],
            },
            FieldRules {
                field: ProfileField::LegalForm,
                kind: ValueKind::Identifier,
                patterns: vec![
                    FieldPattern::new(
                        r"(?i)forma\s+(?:juridic[ăa]|de\s+organizare)\s*:?\s*([^\n]+)",
                        confidence::LABELED,
                    ),
                    FieldPattern::new(
                        r"\b(S\.?R\.?L\.?|P\.?F\.?A\.?|[ÎI]\.I\.|S\.?C\.?A\.?)\b",
                        confidence::CONTEXTUAL,
                    ),
                ],
            },
            FieldRules {
                field: ProfileField::Address,
                kind: ValueKind::Text,
                patterns: vec![FieldPattern::new(
                    r"(?i)(?:sediul?\s+social|adres[ăa])\s*:?\s*([^\n]+)",
                    confidence::CONTEXTUAL,
                )],
            },
            FieldRules {
                field: ProfileField::RegistrationDate,
                kind: ValueKind::Text,
                patterns: vec![FieldPattern::new(
                    r"(?i)data\s+(?:[îi]nregistr[ăa]rii|[îi]nfiin[țţt][ăa]rii|eliber[ăa]rii)\s*:?\s*(\d{1,2}[./]\d{1,2}[./]\d{4})",
                    confidence::LABELED,
                )],
            },
        ];
        Self { rules }
    }
}

impl Default for RomanianRegistryExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl PatternExtractor for RomanianRegistryExtractor {
    fn family(&self) -> ExtractorFamily {
        ExtractorFamily::RomanianRegistry
    }

    fn extract(&self, text: &str) -> ExtractionResultSet {
        scan_rules(text, &self.rules)
    }
}
