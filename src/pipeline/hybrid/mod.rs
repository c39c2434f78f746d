//! Hybrid pattern/AI extraction: cheap deterministic pass first, one AI call
//! only when the quality assessor says the patterns are not enough.

pub mod ai;
pub mod merge;
pub mod orchestrator;

pub use ai::{FieldModel, HttpFieldModel, MockFieldModel, ModelError, ModelRequest, ModelResponse};
pub use merge::{merge_results, PATTERN_PREFERENCE_THRESHOLD};
pub use orchestrator::{
    CostBreakdown, DocumentMetadata, HybridError, HybridExtractor, HybridOptions, HybridOutcome,
};
