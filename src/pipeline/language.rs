//! Lightweight language detection for imported document text.
//!
//! Detects French vs Romanian using keyword frequency and diacritic counts.
//! No external dependencies — a simple heuristic is enough to pick which
//! pattern family to prioritize and to label documents for the consultant.

use crate::models::enums::DocumentLanguage;

const FRENCH_INDICATORS: &[&str] = &[
    // Common French words unlikely in Romanian business text
    "le ", "la ", "les ", "un ", "une ", "des ", "du ", "et ", "est ",
    "au ", "aux ", "pour ", "par ", "sur ", "dans ", "avec ", "qui ",
    "que ", "ce ", "cette ", "dont ",
    // Business / registry French
    "société", "dénomination", "siège social", "immatriculation",
    "chiffre d'affaires", "exploitation", "greffe", "capital social",
    "montant", "aide", "subvention", "exercice", "salariés",
    // French-specific contractions
    "d'", "l'", "n'", "s'", "qu'",
];

const ROMANIAN_INDICATORS: &[&str] = &[
    // Common Romanian words rarely found in French text
    "și ", "sau ", "din ", "care ", "este ", "sunt ", "pentru ", "prin ",
    "către ", "asupra ", "între ", "după ", "fără ",
    // Business / registry Romanian
    "societate", "denumire", "sediul social", "înregistrare",
    "cifra de afaceri", "exploatație", "registrul comerțului",
    "capital social", "suma", "ajutor", "subvenție", "salariați",
    "județ", "comuna", "hectare",
];

/// Detect the primary language of document text.
///
/// Uses case-insensitive keyword frequency plus diacritic scoring. French
/// wins ties — the primary client base produces French paperwork. Text too
/// short to score defaults to French for the same reason.
pub fn detect_language(text: &str) -> DocumentLanguage {
    if text.trim().len() < 20 {
        return DocumentLanguage::French;
    }

    let lower = text.to_lowercase();

    let french_score = count_indicators(&lower, FRENCH_INDICATORS) + french_diacritics(&lower);
    let romanian_score =
        count_indicators(&lower, ROMANIAN_INDICATORS) + romanian_diacritics(&lower);

    if romanian_score > french_score {
        DocumentLanguage::Romanian
    } else {
        DocumentLanguage::French
    }
}

fn count_indicators(lower_text: &str, indicators: &[&str]) -> u32 {
    let mut score = 0u32;
    for &indicator in indicators {
        score += lower_text.matches(indicator).count() as u32;
    }
    score
}

/// French-only diacritics. Characters shared with Romanian (â, î) count for
/// neither side.
fn french_diacritics(lower_text: &str) -> u32 {
    let count = lower_text
        .chars()
        .filter(|c| matches!(c, 'é' | 'è' | 'ê' | 'ë' | 'ç' | 'ù' | 'û' | 'ü' | 'ô' | 'œ' | 'æ'))
        .count() as u32;
    count / 2
}

/// Romanian-only diacritics: ă, ș, ț (including the legacy cedilla forms).
fn romanian_diacritics(lower_text: &str) -> u32 {
    let count = lower_text
        .chars()
        .filter(|c| matches!(c, 'ă' | 'ș' | 'ş' | 'ț' | 'ţ'))
        .count() as u32;
    count / 2
}
