//! Extraction ↔ review ↔ form synchronization.
//!
//! Three logical stores feed one destination: completed extraction results,
//! human review edits, and the flat form consumed by profile persistence.
//! Whenever any of them changes for a document, the coordinator recomputes
//! the owning farm's form under a fixed priority order (manual edit > AI >
//! pattern, by confidence) with provenance shadow keys for audit.

pub mod coordinator;
pub mod merge;
pub mod store;
pub mod types;

pub use coordinator::{SyncConfig, SyncCoordinator};
pub use merge::merge_form_data;
pub use store::{get_form_data, load_merge_inputs, persist_form_data, FormStore, SqliteFormStore};
pub use types::{FormDataState, MergeInputs, SyncError};
