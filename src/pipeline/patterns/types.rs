//! Core types for deterministic field extraction.
//!
//! Every extracted value carries its confidence, provenance and source span
//! so later stages (merge, review, form sync) can audit where a value came
//! from. Absence of a field means "not found", never zero confidence.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

// ═══════════════════════════════════════════
// Profile field schema
// ═══════════════════════════════════════════

/// The fixed field schema the pipeline extracts into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileField {
    FarmName,
    LegalForm,
    SirenNumber,
    SiretNumber,
    VatNumber,
    CuiNumber,
    OnrcNumber,
    Cnp,
    Iban,
    ApeCode,
    CaenCode,
    Address,
    ContactEmail,
    ContactPhone,
    Turnover,
    EmployeeCount,
    LandAreaHa,
    MaxAmount,
    Currency,
    RegistrationDate,
}

impl ProfileField {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FarmName => "farm_name",
            Self::LegalForm => "legal_form",
            Self::SirenNumber => "siren_number",
            Self::SiretNumber => "siret_number",
            Self::VatNumber => "vat_number",
            Self::CuiNumber => "cui_number",
            Self::OnrcNumber => "onrc_number",
            Self::Cnp => "cnp",
            Self::Iban => "iban",
            Self::ApeCode => "ape_code",
            Self::CaenCode => "caen_code",
            Self::Address => "address",
            Self::ContactEmail => "contact_email",
            Self::ContactPhone => "contact_phone",
            Self::Turnover => "turnover",
            Self::EmployeeCount => "employee_count",
            Self::LandAreaHa => "land_area_ha",
            Self::MaxAmount => "max_amount",
            Self::Currency => "currency",
            Self::RegistrationDate => "registration_date",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Self::all().iter().find(|f| f.as_str() == s).copied()
    }

    pub fn all() -> &'static [ProfileField] {
        &[
            Self::FarmName,
            Self::LegalForm,
            Self::SirenNumber,
            Self::SiretNumber,
            Self::VatNumber,
            Self::CuiNumber,
            Self::OnrcNumber,
            Self::Cnp,
            Self::Iban,
            Self::ApeCode,
            Self::CaenCode,
            Self::Address,
            Self::ContactEmail,
            Self::ContactPhone,
            Self::Turnover,
            Self::EmployeeCount,
            Self::LandAreaHa,
            Self::MaxAmount,
            Self::Currency,
            Self::RegistrationDate,
        ]
    }
}

impl std::fmt::Display for ProfileField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ═══════════════════════════════════════════
// Extracted values
// ═══════════════════════════════════════════

/// A typed field value. Numbers cover amounts, counts and areas; everything
/// else stays text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    Number(f64),
}

impl FieldValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            Self::Number(_) => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(_) => None,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Text(s) => serde_json::Value::String(s.clone()),
            Self::Number(n) => serde_json::json!(n),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<f64> for FieldValue {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

/// Where a field value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldSource {
    Pattern,
    Ai,
    Calculation,
    Lookup,
    Manual,
}

impl FieldSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pattern => "pattern",
            Self::Ai => "ai",
            Self::Calculation => "calculation",
            Self::Lookup => "lookup",
            Self::Manual => "manual",
        }
    }
}

/// Byte offsets of a match in the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextSpan {
    pub start: usize,
    pub end: usize,
}

/// A single extracted field with confidence and provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedField {
    pub value: FieldValue,
    pub confidence: f32,
    pub source: FieldSource,
    pub span: Option<TextSpan>,
    pub raw_match: Option<String>,
}

impl ExtractedField {
    pub fn new(value: FieldValue, confidence: f32, source: FieldSource) -> Self {
        // Manual edits are trusted by convention
        let confidence = if source == FieldSource::Manual {
            1.0
        } else {
            confidence.clamp(0.0, 1.0)
        };
        Self {
            value,
            confidence,
            source,
            span: None,
            raw_match: None,
        }
    }

    pub fn with_span(mut self, start: usize, end: usize) -> Self {
        self.span = Some(TextSpan { start, end });
        self
    }

    pub fn with_raw_match(mut self, raw: &str) -> Self {
        self.raw_match = Some(raw.to_string());
        self
    }
}

/// Per-field results of one extraction pass. BTreeMap keeps iteration
/// deterministic so identical input yields byte-identical output.
pub type ExtractionResultSet = BTreeMap<ProfileField, ExtractedField>;

// ═══════════════════════════════════════════
// Extractor boundary
// ═══════════════════════════════════════════

/// Which jurisdiction/domain family an extractor covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractorFamily {
    FrenchRegistry,
    RomanianRegistry,
    Financial,
}

impl ExtractorFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FrenchRegistry => "french_registry",
            Self::RomanianRegistry => "romanian_registry",
            Self::Financial => "financial",
        }
    }
}

/// A deterministic regex-based extractor. Stateless across calls.
pub trait PatternExtractor: Send + Sync {
    fn family(&self) -> ExtractorFamily;

    fn extract(&self, text: &str) -> ExtractionResultSet;
}

/// Fixed per-pattern confidence constants. Checksum outcomes override the
/// base constants on identifier fields.
pub mod confidence {
    /// Strongly anchored patterns with an explicit label ("SIRET:", "CUI:").
    pub const LABELED: f32 = 0.90;

    /// Patterns anchored on nearby context rather than an explicit label.
    pub const CONTEXTUAL: f32 = 0.80;

    /// Bare-shape fallback patterns (digit runs with no anchor).
    pub const BARE: f32 = 0.55;

    /// Identifier passed its checksum.
    pub const CHECKSUM_VALID: f32 = 0.98;

    /// Identifier shape matched but the checksum failed. Kept as a signal,
    /// never dropped.
    pub const CHECKSUM_FAILED: f32 = 0.45;
}
