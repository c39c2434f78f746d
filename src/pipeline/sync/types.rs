//! Form state and merge inputs.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db::DatabaseError;
use crate::pipeline::jobs::{JobError, StoredExtraction};
use crate::review::ReviewEdit;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Job store error: {0}")]
    Jobs(#[from] JobError),

    #[error("Form store error: {0}")]
    Store(String),
}

/// Everything a merge reads: completed extractions of the farm's documents
/// plus all human review edits. Snapshotted at the start of each merge.
#[derive(Debug, Clone, Default)]
pub struct MergeInputs {
    pub extractions: Vec<StoredExtraction>,
    pub edits: Vec<ReviewEdit>,
}

/// The destination form: a flat field → value map with shadow keys recording
/// provenance (`{field}_source`) and write time (`{field}_sync_timestamp`).
/// Derived state — recomputed wholesale, never patched incrementally beyond
/// per-field overwrite.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FormDataState {
    values: BTreeMap<String, serde_json::Value>,
}

impl FormDataState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write a field and its shadow keys.
    pub fn set_field(
        &mut self,
        field: &str,
        value: serde_json::Value,
        source: &str,
        sync_timestamp: &str,
    ) {
        self.values.insert(field.to_string(), value);
        self.values.insert(
            format!("{field}_source"),
            serde_json::Value::String(source.to_string()),
        );
        self.values.insert(
            format!("{field}_sync_timestamp"),
            serde_json::Value::String(sync_timestamp.to_string()),
        );
    }

    /// Insert one raw entry (used when rehydrating persisted rows, where
    /// shadow keys arrive as ordinary rows).
    pub(crate) fn insert_raw(&mut self, key: String, value: serde_json::Value) {
        self.values.insert(key, value);
    }

    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.values.get(key)
    }

    /// Provenance of a field, from its shadow key.
    pub fn source_of(&self, field: &str) -> Option<&str> {
        self.values
            .get(&format!("{field}_source"))
            .and_then(|v| v.as_str())
    }

    pub fn sync_timestamp_of(&self, field: &str) -> Option<&str> {
        self.values
            .get(&format!("{field}_sync_timestamp"))
            .and_then(|v| v.as_str())
    }

    /// Number of entries including shadow keys.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &serde_json::Value)> {
        self.values.iter()
    }

    /// Field names without their shadow keys.
    pub fn field_names(&self) -> Vec<&str> {
        self.values
            .keys()
            .filter(|k| !k.ends_with("_source") && !k.ends_with("_sync_timestamp"))
            .map(String::as_str)
            .collect()
    }
}
