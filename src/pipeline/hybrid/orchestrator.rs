//! Hybrid extraction orchestrator.
//!
//! Fast deterministic pass first, quality assessment, then at most one AI
//! call covering every weak field, then a discrete per-field merge. AI
//! failure never fails the orchestration — the caller gets pattern-only
//! results with lowered confidence and an explicit failure message.

use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::ai::{ai_result_set, FieldModel, ModelRequest};
use super::merge::{merge_results, PATTERN_PREFERENCE_THRESHOLD};
use crate::models::enums::DocumentLanguage;
use crate::pipeline::patterns::{ExtractionResultSet, FieldSource, PatternEngine, ProfileField};
use crate::pipeline::quality::{assess, AssessorConfig, QualityAssessment};
use crate::pipeline::sanitize::sanitize_text;

/// Confidence multiplier applied when escalation was needed but the AI call
/// failed: results are kept, visibly weaker.
const DEGRADED_CONFIDENCE_FACTOR: f32 = 0.9;

/// Degraded confidence never reaches zero — the values are still real matches.
const DEGRADED_CONFIDENCE_FLOOR: f32 = 0.05;

#[derive(Error, Debug)]
pub enum HybridError {
    #[error("Extraction cancelled")]
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct HybridOptions {
    /// Per-field bar under which a field joins the escalation list.
    pub confidence_threshold: f32,
    /// Fields held to the assessor's stricter priority bar.
    pub priority_fields: Vec<ProfileField>,
    /// Force the AI call even when patterns are sufficient (narrative fields
    /// patterns cannot express).
    pub use_ai_for_narrative: bool,
    /// Merge preference bar (see `merge`).
    pub pattern_preference_threshold: f32,
}

impl HybridOptions {
    /// Priority fields differ by jurisdiction: French paperwork never
    /// carries a CUI, Romanian paperwork never a SIRET.
    pub fn for_language(language: DocumentLanguage) -> Self {
        let priority_fields = match language {
            DocumentLanguage::French => vec![
                ProfileField::SiretNumber,
                ProfileField::Turnover,
                ProfileField::Iban,
            ],
            DocumentLanguage::Romanian => vec![
                ProfileField::CuiNumber,
                ProfileField::Turnover,
                ProfileField::Iban,
            ],
        };
        Self {
            priority_fields,
            ..Self::default()
        }
    }
}

impl Default for HybridOptions {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.70,
            priority_fields: vec![
                ProfileField::SiretNumber,
                ProfileField::Turnover,
                ProfileField::Iban,
            ],
            use_ai_for_narrative: false,
            pattern_preference_threshold: PATTERN_PREFERENCE_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DocumentMetadata {
    pub document_id: Uuid,
    pub file_name: Option<String>,
    pub language: Option<DocumentLanguage>,
}

/// Cost telemetry: how much AI spend the deterministic pass avoided.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostBreakdown {
    pub pattern_fields: usize,
    pub ai_fields: usize,
    pub total_fields: usize,
    /// Share of extracted fields that never needed the model.
    pub ai_cost_avoided_ratio: f32,
}

impl CostBreakdown {
    fn from_results(results: &ExtractionResultSet) -> Self {
        let total_fields = results.len();
        let ai_fields = results
            .values()
            .filter(|f| f.source == FieldSource::Ai)
            .count();
        let pattern_fields = total_fields - ai_fields;
        let ai_cost_avoided_ratio = if total_fields == 0 {
            0.0
        } else {
            pattern_fields as f32 / total_fields as f32
        };
        Self {
            pattern_fields,
            ai_fields,
            total_fields,
            ai_cost_avoided_ratio,
        }
    }
}

#[derive(Debug, Clone)]
pub struct HybridOutcome {
    pub document_id: Uuid,
    pub fields: ExtractionResultSet,
    /// Assessment of the pattern pass (pre-merge), kept for audit.
    pub assessment: QualityAssessment,
    pub ai_invoked: bool,
    /// Set when escalation was needed but the model call failed; the fields
    /// are pattern-only with degraded confidence.
    pub ai_failure: Option<String>,
    pub cost: CostBreakdown,
    pub pattern_elapsed_ms: u64,
    pub total_elapsed_ms: u64,
}

impl HybridOutcome {
    /// Mean confidence over the merged fields (absent fields excluded).
    pub fn overall_confidence(&self) -> f32 {
        if self.fields.is_empty() {
            return 0.0;
        }
        self.fields.values().map(|f| f.confidence).sum::<f32>() / self.fields.len() as f32
    }
}

/// Constructed once at startup with its collaborators injected; shared by
/// reference across workers.
pub struct HybridExtractor {
    engine: PatternEngine,
    model: Arc<dyn FieldModel>,
}

impl HybridExtractor {
    pub fn new(engine: PatternEngine, model: Arc<dyn FieldModel>) -> Self {
        Self { engine, model }
    }

    pub async fn process(
        &self,
        text: &str,
        metadata: &DocumentMetadata,
        options: &HybridOptions,
        cancel: &CancellationToken,
    ) -> Result<HybridOutcome, HybridError> {
        let start = Instant::now();
        let clean = sanitize_text(text);

        // Step 1: deterministic pass (CPU-only, never suspends)
        let pattern_start = Instant::now();
        let pattern_results = self.engine.extract(&clean);
        let pattern_elapsed_ms = pattern_start.elapsed().as_millis() as u64;

        // Step 2: escalation decision
        let assessor_config = AssessorConfig {
            priority_fields: options.priority_fields.clone(),
            field_confidence_threshold: options.confidence_threshold,
            ..AssessorConfig::default()
        };
        let assessment = assess(&pattern_results, &assessor_config);

        let escalate = assessment.needs_escalation
            || !assessment.escalation_fields.is_empty()
            || options.use_ai_for_narrative;

        tracing::debug!(
            document_id = %metadata.document_id,
            extracted = assessment.extracted_count,
            overall_confidence = assessment.overall_confidence,
            escalate,
            "Pattern pass complete"
        );

        // Step 3: at most one AI call for the whole document
        let mut ai_invoked = false;
        let mut ai_failure: Option<String> = None;
        let mut ai_results: Option<ExtractionResultSet> = None;

        if escalate {
            ai_invoked = true;
            let request = ModelRequest {
                document_id: metadata.document_id,
                document_text: clean.clone(),
                force_ai: options.use_ai_for_narrative,
            };

            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!(document_id = %metadata.document_id, "Extraction cancelled mid-escalation");
                    return Err(HybridError::Cancelled);
                }
                result = self.model.extract_fields(&request) => match result {
                    Ok(response) => {
                        tracing::debug!(
                            document_id = %metadata.document_id,
                            ai_fields = response.extracted_fields.len(),
                            confidence = response.confidence,
                            "AI escalation returned"
                        );
                        ai_results = Some(ai_result_set(&response));
                    }
                    Err(e) => {
                        tracing::warn!(
                            document_id = %metadata.document_id,
                            error = %e,
                            "AI escalation failed, degrading to pattern-only results"
                        );
                        ai_failure = Some(e.to_string());
                    }
                }
            }
        }

        // Step 4: discrete merge, or degraded pattern-only fallback
        let fields = match (&ai_results, &ai_failure) {
            (Some(ai), _) => merge_results(
                &pattern_results,
                ai,
                options.pattern_preference_threshold,
            ),
            (None, Some(_)) => degrade(pattern_results),
            (None, None) => pattern_results,
        };

        // Step 5: cost telemetry
        let cost = CostBreakdown::from_results(&fields);
        let total_elapsed_ms = start.elapsed().as_millis() as u64;

        tracing::info!(
            document_id = %metadata.document_id,
            language = ?metadata.language,
            pattern_fields = cost.pattern_fields,
            ai_fields = cost.ai_fields,
            ai_cost_avoided = cost.ai_cost_avoided_ratio,
            pattern_elapsed_ms,
            total_elapsed_ms,
            ai_invoked,
            degraded = ai_failure.is_some(),
            "Hybrid extraction complete"
        );

        Ok(HybridOutcome {
            document_id: metadata.document_id,
            fields,
            assessment,
            ai_invoked,
            ai_failure,
            cost,
            pattern_elapsed_ms,
            total_elapsed_ms,
        })
    }
}

fn degrade(mut results: ExtractionResultSet) -> ExtractionResultSet {
    for field in results.values_mut() {
        field.confidence =
            (field.confidence * DEGRADED_CONFIDENCE_FACTOR).max(DEGRADED_CONFIDENCE_FLOOR);
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::hybrid::ai::MockFieldModel;
    use std::time::Duration;

    /// French dossier rich enough that no field needs escalation.
    const STRONG_FRENCH_DOC: &str = "Extrait Kbis\n\
        Dénomination sociale: EARL du Vallon\n\
        Forme juridique: EARL\n\
        Siège social: 12 route des Vignes, 21200 Beaune\n\
        SIREN: 732 829 320\n\
        SIRET: 73282932000074\n\
        Code APE: 0111Z\n\
        TVA intracommunautaire: FR 83 732 829 320\n\
        Date d'immatriculation: 15/03/2012\n\
        Chiffre d'affaires net: 250 000\n\
        Effectif moyen: 4\n\
        surface agricole utile de 120,5 ha\n\
        IBAN: FR14 2004 1010 0505 0001 3M02 606\n\
        Contact: ferme.vallon@exemple.fr, tél. 03 80 22 00 11";

    fn metadata() -> DocumentMetadata {
        DocumentMetadata {
            document_id: Uuid::new_v4(),
            file_name: Some("kbis.txt".into()),
            language: Some(DocumentLanguage::French),
        }
    }

    fn extractor(model: MockFieldModel) -> (HybridExtractor, Arc<MockFieldModel>) {
        let model = Arc::new(model);
        (
            HybridExtractor::new(PatternEngine::new(), model.clone()),
            model,
        )
    }

    #[tokio::test]
    async fn strong_patterns_skip_the_model() {
        let (extractor, model) = extractor(MockFieldModel::with_fields(&[], 0.9));
        let options = HybridOptions::for_language(DocumentLanguage::French);

        let outcome = extractor
            .process(STRONG_FRENCH_DOC, &metadata(), &options, &CancellationToken::new())
            .await
            .unwrap();

        assert!(!outcome.ai_invoked, "escalation fields: {:?}", outcome.assessment.escalation_fields);
        assert_eq!(model.call_count(), 0);
        assert!(outcome.cost.ai_fields == 0);
        assert!((outcome.cost.ai_cost_avoided_ratio - 1.0).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn identical_input_without_escalation_is_byte_identical() {
        let (extractor, _) = extractor(MockFieldModel::with_fields(&[], 0.9));
        let options = HybridOptions::for_language(DocumentLanguage::French);
        let meta = metadata();

        let first = extractor
            .process(STRONG_FRENCH_DOC, &meta, &options, &CancellationToken::new())
            .await
            .unwrap();
        let second = extractor
            .process(STRONG_FRENCH_DOC, &meta, &options, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(
            serde_json::to_vec(&first.fields).unwrap(),
            serde_json::to_vec(&second.fields).unwrap()
        );
    }

    #[tokio::test]
    async fn weak_extraction_escalates_once_and_merges() {
        let (extractor, model) = extractor(MockFieldModel::with_fields(
            &[
                ("farm_name", serde_json::json!("Ferma Câmpului SRL")),
                ("turnover", serde_json::json!(1_200_000.0)),
                ("address", serde_json::json!("comuna Prejmer, Brașov")),
            ],
            0.82,
        ));
        let options = HybridOptions::for_language(DocumentLanguage::Romanian);

        // Sparse document: CUI present but almost everything else missing
        let outcome = extractor
            .process("CUI: 1590082", &metadata(), &options, &CancellationToken::new())
            .await
            .unwrap();

        assert!(outcome.ai_invoked);
        assert_eq!(model.call_count(), 1, "one call covers all weak fields");
        assert!(outcome.ai_failure.is_none());

        // Pattern field kept (0.98 ≥ 0.7), AI-only fields included
        let cui = outcome.fields.get(&ProfileField::CuiNumber).unwrap();
        assert_eq!(cui.source, FieldSource::Pattern);
        let name = outcome.fields.get(&ProfileField::FarmName).unwrap();
        assert_eq!(name.source, FieldSource::Ai);
        assert_eq!(outcome.cost.ai_fields, 3);
    }

    #[tokio::test]
    async fn model_failure_degrades_but_preserves_pattern_values() {
        let (extractor, _) = extractor(MockFieldModel::failing());
        let options = HybridOptions::for_language(DocumentLanguage::Romanian);

        let outcome = extractor
            .process("CUI: 1590082", &metadata(), &options, &CancellationToken::new())
            .await
            .unwrap();

        assert!(outcome.ai_invoked);
        let failure = outcome.ai_failure.as_ref().expect("failure must be observable");
        assert!(!failure.is_empty());

        let cui = outcome.fields.get(&ProfileField::CuiNumber).expect("value preserved");
        assert_eq!(cui.value.as_text(), Some("1590082"));
        assert!(cui.confidence < 0.98, "confidence must be lowered");
        assert!(cui.confidence > 0.0, "but never zeroed");
    }

    #[tokio::test]
    async fn cancellation_aborts_the_ai_call() {
        let (extractor, _) = extractor(
            MockFieldModel::with_fields(&[], 0.9).with_delay(Duration::from_secs(30)),
        );
        let options = HybridOptions::for_language(DocumentLanguage::Romanian);

        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = extractor
            .process("CUI: 1590082", &metadata(), &options, &cancel)
            .await;
        assert!(matches!(result, Err(HybridError::Cancelled)));
    }

    #[tokio::test]
    async fn narrative_flag_forces_model_even_when_patterns_strong() {
        let (extractor, model) = extractor(MockFieldModel::with_fields(
            &[("address", serde_json::json!("12 route des Vignes, Beaune"))],
            0.9,
        ));
        let mut options = HybridOptions::for_language(DocumentLanguage::French);
        options.use_ai_for_narrative = true;

        let outcome = extractor
            .process(STRONG_FRENCH_DOC, &metadata(), &options, &CancellationToken::new())
            .await
            .unwrap();

        assert!(outcome.ai_invoked);
        assert_eq!(model.call_count(), 1);
    }
}
