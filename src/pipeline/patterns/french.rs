//! French registry extracts (Kbis, avis de situation SIRENE).
//!
//! Field vocabulary follows the documents the greffes and INSEE actually
//! produce: labeled SIREN/SIRET lines, RCS mentions, APE/NAF activity codes,
//! TVA intracommunautaire numbers.

use super::{
    confidence, scan_rules, ExtractedField, ExtractionResultSet, ExtractorFamily, FieldPattern,
    FieldRules, FieldSource, FieldValue, PatternExtractor, ProfileField, ValueKind,
};

pub struct FrenchRegistryExtractor {
    rules: Vec<FieldRules>,
}

impl FrenchRegistryExtractor {
    pub fn new() -> Self {
        let rules = vec![
            FieldRules {
                field: ProfileField::SiretNumber,
                kind: ValueKind::Identifier,
                patterns: vec![
                    FieldPattern::new(
                        r"(?i)SIRET(?:\s+n[°o])?\s*:?\s*(\d{3}[ .]?\d{3}[ .]?\d{3}[ .]?\d{5})\b",
                        confidence::LABELED,
                    ),
                    FieldPattern::new(r"\b(\d{14})\b", confidence::BARE),
                ],
            },
            FieldRules {
                field: ProfileField::SirenNumber,
                kind: ValueKind::Identifier,
                patterns: vec![
                    FieldPattern::new(
                        r"(?i)SIREN(?:\s+n[°o])?\s*:?\s*(\d{3}[ .]?\d{3}[ .]?\d{3})\b",
                        confidence::LABELED,
                    ),
                    FieldPattern::new(
                        r"(?i)R\.?C\.?S\.?[^\n\d]{0,40}(\d{3}[ .]?\d{3}[ .]?\d{3})\b",
                        confidence::CONTEXTUAL,
                    ),
                    FieldPattern::new(r"\b(\d{9})\b", confidence::BARE),
                ],
            },
            FieldRules {
                field: ProfileField::VatNumber,
                kind: ValueKind::UppercaseIdentifier,
                patterns: vec![
                    FieldPattern::new(
                        r"(?i)TVA(?:\s+intracommunautaire)?(?:\s+n[°o])?\s*:?\s*(FR\s?\d{2}\s?\d{3}\s?\d{3}\s?\d{3})\b",
                        confidence::LABELED,
                    ),
                    FieldPattern::new(r"\b(FR\d{11})\b", confidence::CONTEXTUAL),
                ],
            },
            FieldRules {
                field: ProfileField::ApeCode,
                kind: ValueKind::UppercaseIdentifier,
                patterns: vec![FieldPattern::new(
                    r"(?i)(?:code\s+)?(?:APE|NAF)\s*:?\s*(\d{2}\.?\d{2}[A-Za-z])\b",
                    confidence::LABELED,
                )],
            },
            FieldRules {
                field: ProfileField::FarmName,
                kind: ValueKind::Text,
                patterns: vec![FieldPattern::new(
                    r"(?i)(?:d[ée]nomination(?:\s+sociale)?|raison\s+sociale)\s*:?\s*([^\n]+)",
                    confidence::LABELED,
                )],
            },
            FieldRules {
                field: ProfileField::LegalForm,
                kind: ValueKind::Text,
                patterns: vec![
                    FieldPattern::new(
                        r"(?i)forme\s+juridique\s*:?\s*([^\n]+)",
                        confidence::LABELED,
                    ),
                    FieldPattern::new(
                        r"\b(EARL|GAEC|SCEA|EURL|SARL|SASU|SAS)\b",
                        confidence::CONTEXTUAL,
                    ),
                ],
            },
            FieldRules {
                field: ProfileField::Address,
                kind: ValueKind::Text,
                patterns: vec![FieldPattern::new(
                    r"(?i)(?:si[èe]ge\s+social|adresse(?:\s+du\s+si[èe]ge)?)\s*:?\s*([^\n]+)",
                    confidence::CONTEXTUAL,
                )],
            },
            FieldRules {
                field: ProfileField::RegistrationDate,
                kind: ValueKind::Text,
                patterns: vec![
                    FieldPattern::new(
                        r"(?i)date\s+d'immatriculation\s*:?\s*(\d{1,2}[/.]\d{1,2}[/.]\d{4})",
                        confidence::LABELED,
                    ),
                    FieldPattern::new(
                        r"(?i)immatricul[ée]e?\s+(?:au\s+RCS[^\n]{0,40}?)?le\s+(\d{1,2}[/.]\d{1,2}[/.]\d{4})",
                        confidence::LABELED,
                    ),
                ],
            },
        ];
        Self { rules }
    }
}

impl Default for FrenchRegistryExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl PatternExtractor for FrenchRegistryExtractor {
    fn family(&self) -> ExtractorFamily {
        ExtractorFamily::FrenchRegistry
    }

    fn extract(&self, text: &str) -> ExtractionResultSet {
        let mut results = scan_rules(text, &self.rules);

        // SIREN is the first 9 digits of the SIRET; derive it when only the
        // establishment number was printed.
        if !results.contains_key(&ProfileField::SirenNumber) {
            if let Some(siret) = results.get(&ProfileField::SiretNumber) {
                if let Some(digits) = siret.value.as_text() {
                    if digits.len() == 14 {
                        let siren = digits[..9].to_string();
                        let conf = super::checksum_adjusted(
                            ProfileField::SirenNumber,
                            &FieldValue::Text(siren.clone()),
                            siret.confidence,
                        );
                        results.insert(
                            ProfileField::SirenNumber,
                            ExtractedField::new(
                                FieldValue::Text(siren),
                                conf,
                                FieldSource::Calculation,
                            ),
                        );
                    }
                }
            }
        }

        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(text: &str) -> ExtractionResultSet {
        FrenchRegistryExtractor::new().extract(text)
    }

    #[test]
    fn labeled_siret_with_valid_checksum() {
        let results = extract("SIRET: 73282932000074");
        let field = results.get(&ProfileField::SiretNumber).expect("siret");
        assert_eq!(field.value.as_text(), Some("73282932000074"));
        assert!(field.confidence >= 0.95, "got {}", field.confidence);
        assert_eq!(field.source, FieldSource::Pattern);
        assert!(field.span.is_some());
    }

    #[test]
    fn grouped_siret_is_compacted() {
        let results = extract("SIRET n° 732 829 320 00074");
        let field = results.get(&ProfileField::SiretNumber).expect("siret");
        assert_eq!(field.value.as_text(), Some("73282932000074"));
        assert_eq!(field.raw_match.as_deref(), Some("732 829 320 00074"));
    }

    #[test]
    fn checksum_failure_keeps_value_with_lower_confidence() {
        let valid = extract("SIRET: 73282932000074");
        let invalid = extract("SIRET: 73282932000075");
        let valid_conf = valid.get(&ProfileField::SiretNumber).unwrap().confidence;
        let field = invalid.get(&ProfileField::SiretNumber).expect("kept despite checksum");
        assert_eq!(field.value.as_text(), Some("73282932000075"));
        assert!(
            field.confidence < valid_conf,
            "invalid {} must be below valid {}",
            field.confidence,
            valid_conf
        );
    }

    #[test]
    fn bare_fourteen_digits_low_confidence() {
        // No label anywhere — bare fallback, then checksum raises it
        let results = extract("référence interne 73282932000074 du dossier");
        let field = results.get(&ProfileField::SiretNumber).expect("siret");
        assert!(field.confidence >= 0.95); // checksum passed
    }

    #[test]
    fn siren_derived_from_siret() {
        let results = extract("SIRET: 73282932000074");
        let siren = results.get(&ProfileField::SirenNumber).expect("derived siren");
        assert_eq!(siren.value.as_text(), Some("732829320"));
        assert_eq!(siren.source, FieldSource::Calculation);
        assert!(siren.confidence >= 0.95); // 732829320 passes Luhn
    }

    #[test]
    fn explicit_siren_preferred_over_derivation() {
        let results = extract("SIREN: 732 829 320\nSIRET: 73282932000074");
        let siren = results.get(&ProfileField::SirenNumber).unwrap();
        assert_eq!(siren.source, FieldSource::Pattern);
        assert_eq!(siren.value.as_text(), Some("732829320"));
    }

    #[test]
    fn rcs_mention_yields_siren() {
        let results = extract("RCS Dijon 732 829 320");
        let siren = results.get(&ProfileField::SirenNumber).expect("siren");
        assert_eq!(siren.value.as_text(), Some("732829320"));
        assert!(siren.confidence >= 0.95);
    }

    #[test]
    fn kbis_style_extract_covers_many_fields() {
        let text = "Extrait Kbis\n\
                    Dénomination sociale: EARL du Vallon\n\
                    Forme juridique: Exploitation agricole à responsabilité limitée\n\
                    Siège social: 12 route des Vignes, 21200 Beaune\n\
                    SIREN: 732 829 320\n\
                    Code APE: 0111Z\n\
                    TVA intracommunautaire: FR 83 732 829 320\n\
                    Date d'immatriculation: 15/03/2012";
        let results = extract(text);

        assert_eq!(
            results.get(&ProfileField::FarmName).unwrap().value.as_text(),
            Some("EARL du Vallon")
        );
        assert_eq!(
            results.get(&ProfileField::ApeCode).unwrap().value.as_text(),
            Some("0111Z")
        );
        assert_eq!(
            results.get(&ProfileField::VatNumber).unwrap().value.as_text(),
            Some("FR83732829320")
        );
        assert_eq!(
            results.get(&ProfileField::Address).unwrap().value.as_text(),
            Some("12 route des Vignes, 21200 Beaune")
        );
        assert_eq!(
            results.get(&ProfileField::RegistrationDate).unwrap().value.as_text(),
            Some("15/03/2012")
        );
        assert!(results
            .get(&ProfileField::LegalForm)
            .unwrap()
            .value
            .as_text()
            .unwrap()
            .starts_with("Exploitation agricole"));
    }

    #[test]
    fn legal_form_acronym_fallback() {
        let results = extract("GAEC des Prés Verts, élevage laitier");
        assert_eq!(
            results.get(&ProfileField::LegalForm).unwrap().value.as_text(),
            Some("GAEC")
        );
    }

    #[test]
    fn no_match_means_absent_not_zero_confidence() {
        let results = extract("Aucun identifiant ici.");
        assert!(!results.contains_key(&ProfileField::SiretNumber));
        assert!(!results.contains_key(&ProfileField::SirenNumber));
    }

    #[test]
    fn extractor_is_stateless_across_calls() {
        let extractor = FrenchRegistryExtractor::new();
        let a = extractor.extract("SIRET: 73282932000074");
        let _ = extractor.extract("texte sans identifiants");
        let b = extractor.extract("SIRET: 73282932000074");
        assert_eq!(a, b);
    }
}
