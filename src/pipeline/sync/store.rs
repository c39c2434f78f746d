//! SQLite-backed form store.

use std::sync::Mutex;

use rusqlite::{params, Connection};
use uuid::Uuid;

use super::types::{FormDataState, MergeInputs, SyncError};
use crate::db::DatabaseError;
use crate::models::document::list_documents_for_farm;
use crate::pipeline::jobs::get_extraction_result;
use crate::review::edits_for_farm;

/// Sources and sink of one farm's form state.
pub trait FormStore: Send + Sync {
    /// Snapshot every input the merge reads, as of now.
    fn load_inputs(&self, farm_id: &Uuid) -> Result<MergeInputs, SyncError>;

    /// Replace the persisted form wholesale.
    fn persist(&self, farm_id: &Uuid, form: &FormDataState) -> Result<(), SyncError>;
}

pub struct SqliteFormStore {
    conn: Mutex<Connection>,
}

impl SqliteFormStore {
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }
}

impl FormStore for SqliteFormStore {
    fn load_inputs(&self, farm_id: &Uuid) -> Result<MergeInputs, SyncError> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| SyncError::Store("connection lock poisoned".into()))?;
        load_merge_inputs(&conn, farm_id)
    }

    fn persist(&self, farm_id: &Uuid, form: &FormDataState) -> Result<(), SyncError> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| SyncError::Store("connection lock poisoned".into()))?;
        persist_form_data(&conn, farm_id, form)
    }
}

/// Gather all completed extractions of the farm's documents plus its review
/// edits.
pub fn load_merge_inputs(conn: &Connection, farm_id: &Uuid) -> Result<MergeInputs, SyncError> {
    let mut extractions = Vec::new();
    for document in list_documents_for_farm(conn, farm_id)? {
        if let Some(extraction) = get_extraction_result(conn, &document.id)? {
            extractions.push(extraction);
        }
    }
    let edits = edits_for_farm(conn, farm_id).map_err(|e| SyncError::Store(e.to_string()))?;
    Ok(MergeInputs { extractions, edits })
}

/// Replace the farm's `form_data` rows with the given state. Wholesale
/// replacement removes fields whose last source was rejected.
pub fn persist_form_data(
    conn: &Connection,
    farm_id: &Uuid,
    form: &FormDataState,
) -> Result<(), SyncError> {
    conn.execute(
        "DELETE FROM form_data WHERE farm_id = ?1",
        params![farm_id.to_string()],
    )
    .map_err(DatabaseError::from)?;

    for (field, value) in form.iter() {
        conn.execute(
            "INSERT INTO form_data (farm_id, field, value) VALUES (?1, ?2, ?3)",
            params![farm_id.to_string(), field, value.to_string()],
        )
        .map_err(DatabaseError::from)?;
    }
    Ok(())
}

/// Load the persisted form state for a farm.
pub fn get_form_data(conn: &Connection, farm_id: &Uuid) -> Result<FormDataState, SyncError> {
    let mut stmt = conn
        .prepare("SELECT field, value FROM form_data WHERE farm_id = ?1")
        .map_err(DatabaseError::from)?;
    let rows = stmt
        .query_map(params![farm_id.to_string()], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })
        .map_err(DatabaseError::from)?;

    // Shadow keys are ordinary rows; rehydrate everything verbatim.
    let mut form = FormDataState::new();
    for row in rows {
        let (field, value) = row.map_err(DatabaseError::from)?;
        let value: serde_json::Value =
            serde_json::from_str(&value).unwrap_or(serde_json::Value::Null);
        form.insert_raw(field, value);
    }
    Ok(form)
}
