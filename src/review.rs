//! Human review of extraction results.
//!
//! Review edits are the highest-trust source in the form merge: each edit is
//! a per-field correction at confidence 1.0, keyed by document. Accepting an
//! extraction promotes all its fields into edits (a bulk manual
//! confirmation); rejecting one deletes the extraction result and its edits,
//! reverting those fields to whatever the next-best source yields.

use chrono::{NaiveDateTime, Utc};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::pipeline::jobs::{get_extraction_result, JobError};

#[derive(Error, Debug)]
pub enum ReviewError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Job store error: {0}")]
    Jobs(#[from] JobError),

    #[error("No extraction result for document {0}")]
    NoExtraction(Uuid),
}

/// One human correction. Never auto-deleted except by rejecting the parent
/// extraction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewEdit {
    pub document_id: Uuid,
    pub field: String,
    pub value: serde_json::Value,
    pub edited_at: NaiveDateTime,
}

/// Record (or overwrite) a single field correction.
pub fn record_edit(
    conn: &Connection,
    document_id: &Uuid,
    field: &str,
    value: serde_json::Value,
) -> Result<ReviewEdit, ReviewError> {
    let edit = ReviewEdit {
        document_id: *document_id,
        field: field.to_string(),
        value,
        edited_at: Utc::now().naive_utc(),
    };

    conn.execute(
        "INSERT OR REPLACE INTO review_edits (document_id, field, value, edited_at)
         VALUES (?1, ?2, ?3, ?4)",
        params![
            edit.document_id.to_string(),
            edit.field,
            edit.value.to_string(),
            edit.edited_at.to_string(),
        ],
    )
    .map_err(DatabaseError::from)?;

    tracing::debug!(document_id = %document_id, field, "Review edit recorded");
    Ok(edit)
}

pub fn edits_for_document(
    conn: &Connection,
    document_id: &Uuid,
) -> Result<Vec<ReviewEdit>, ReviewError> {
    let mut stmt = conn
        .prepare(
            "SELECT document_id, field, value, edited_at FROM review_edits
             WHERE document_id = ?1 ORDER BY field",
        )
        .map_err(DatabaseError::from)?;
    let rows = stmt
        .query_map(params![document_id.to_string()], edit_row_mapper)
        .map_err(DatabaseError::from)?;
    collect_edits(rows)
}

/// All edits across a farm's documents, for the form merge.
pub fn edits_for_farm(conn: &Connection, farm_id: &Uuid) -> Result<Vec<ReviewEdit>, ReviewError> {
    let mut stmt = conn
        .prepare(
            "SELECT e.document_id, e.field, e.value, e.edited_at
             FROM review_edits e
             JOIN documents d ON d.id = e.document_id
             WHERE d.farm_id = ?1
             ORDER BY e.document_id, e.field",
        )
        .map_err(DatabaseError::from)?;
    let rows = stmt
        .query_map(params![farm_id.to_string()], edit_row_mapper)
        .map_err(DatabaseError::from)?;
    collect_edits(rows)
}

/// Accept an extraction: promote every extracted field into a review edit —
/// equivalent to a bulk manual edit at confidence 1.0. Returns the number of
/// fields promoted.
pub fn accept_extraction(conn: &Connection, document_id: &Uuid) -> Result<usize, ReviewError> {
    let Some(extraction) = get_extraction_result(conn, document_id)? else {
        return Err(ReviewError::NoExtraction(*document_id));
    };

    let mut promoted = 0usize;
    for (field, extracted) in &extraction.fields {
        record_edit(conn, document_id, field.as_str(), extracted.value.to_json())?;
        promoted += 1;
    }

    tracing::info!(document_id = %document_id, fields = promoted, "Extraction accepted");
    Ok(promoted)
}

/// Reject an extraction: remove the result and every review edit keyed to
/// it. The next form merge reverts those fields to the next-best source, or
/// to absent.
pub fn reject_extraction(conn: &Connection, document_id: &Uuid) -> Result<(), ReviewError> {
    conn.execute(
        "DELETE FROM extraction_results WHERE document_id = ?1",
        params![document_id.to_string()],
    )
    .map_err(DatabaseError::from)?;
    conn.execute(
        "DELETE FROM review_edits WHERE document_id = ?1",
        params![document_id.to_string()],
    )
    .map_err(DatabaseError::from)?;

    tracing::info!(document_id = %document_id, "Extraction rejected");
    Ok(())
}

fn edit_row_mapper(row: &rusqlite::Row<'_>) -> rusqlite::Result<(String, String, String, String)> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
}

fn collect_edits(
    rows: impl Iterator<Item = rusqlite::Result<(String, String, String, String)>>,
) -> Result<Vec<ReviewEdit>, ReviewError> {
    let mut edits = Vec::new();
    for row in rows {
        let (document_id, field, value, edited_at) = row.map_err(DatabaseError::from)?;
        edits.push(ReviewEdit {
            document_id: Uuid::parse_str(&document_id).unwrap_or_default(),
            field,
            value: serde_json::from_str(&value).unwrap_or(serde_json::Value::Null),
            edited_at: NaiveDateTime::parse_from_str(&edited_at, "%Y-%m-%d %H:%M:%S%.f")
                .unwrap_or_default(),
        });
    }
    Ok(edits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_memory_database;
    use crate::models::document::{import_document, ImportOutcome};
    use crate::models::enums::DocumentType;
    use crate::models::farm::{insert_farm, FarmProfile};
    use crate::pipeline::jobs::{claim_next, enqueue, mark_completed, NewJob};
    use crate::pipeline::patterns::{
        ExtractedField, ExtractionResultSet, FieldSource, ProfileField,
    };
    use crate::pipeline::sync::{load_merge_inputs, merge_form_data};

    fn setup() -> (Connection, Uuid, Uuid) {
        let conn = open_memory_database().unwrap();
        let farm = FarmProfile::new("Test Farm");
        insert_farm(&conn, &farm).unwrap();
        let doc_id = match import_document(
            &conn,
            &farm.id,
            DocumentType::RegistrationExtract,
            "doc.txt",
            "url",
            "content",
            None,
        )
        .unwrap()
        {
            ImportOutcome::Imported(doc) => doc.id,
            _ => panic!(),
        };
        (conn, farm.id, doc_id)
    }

    fn complete_extraction(conn: &Connection, doc_id: &Uuid, fields: &[(ProfileField, &str, f32)]) {
        enqueue(conn, &NewJob::for_document(*doc_id, "url")).unwrap();
        let job = claim_next(conn, Utc::now().naive_utc()).unwrap().unwrap();
        let mut set = ExtractionResultSet::new();
        for (field, value, conf) in fields {
            set.insert(
                *field,
                ExtractedField::new((*value).into(), *conf, FieldSource::Pattern),
            );
        }
        mark_completed(conn, &job, 10, &set, 0.9, false).unwrap();
    }

    #[test]
    fn record_and_list_edits() {
        let (conn, _, doc_id) = setup();
        record_edit(&conn, &doc_id, "farm_name", serde_json::json!("Corrected")).unwrap();
        record_edit(&conn, &doc_id, "turnover", serde_json::json!(300000.0)).unwrap();

        let edits = edits_for_document(&conn, &doc_id).unwrap();
        assert_eq!(edits.len(), 2);
        assert_eq!(edits[0].field, "farm_name");
        assert_eq!(edits[0].value, serde_json::json!("Corrected"));
    }

    #[test]
    fn re_editing_a_field_overwrites() {
        let (conn, _, doc_id) = setup();
        record_edit(&conn, &doc_id, "farm_name", serde_json::json!("First")).unwrap();
        record_edit(&conn, &doc_id, "farm_name", serde_json::json!("Second")).unwrap();

        let edits = edits_for_document(&conn, &doc_id).unwrap();
        assert_eq!(edits.len(), 1);
        assert_eq!(edits[0].value, serde_json::json!("Second"));
    }

    #[test]
    fn accept_promotes_all_fields_to_edits() {
        let (conn, farm_id, doc_id) = setup();
        complete_extraction(
            &conn,
            &doc_id,
            &[(ProfileField::FarmName, "Test Farm", 0.9)],
        );

        let promoted = accept_extraction(&conn, &doc_id).unwrap();
        assert_eq!(promoted, 1);

        let edits = edits_for_document(&conn, &doc_id).unwrap();
        assert_eq!(edits[0].field, "farm_name");
        assert_eq!(edits[0].value, serde_json::json!("Test Farm"));

        // A subsequent form sync surfaces the accepted value as manual
        let inputs = load_merge_inputs(&conn, &farm_id).unwrap();
        let form = merge_form_data(&inputs);
        assert_eq!(form.get("farm_name"), Some(&serde_json::json!("Test Farm")));
        assert_eq!(
            form.source_of("farm_name"),
            Some(format!("manual_edit_{doc_id}").as_str())
        );
    }

    #[test]
    fn accept_without_extraction_fails() {
        let (conn, _, doc_id) = setup();
        let err = accept_extraction(&conn, &doc_id);
        assert!(matches!(err, Err(ReviewError::NoExtraction(id)) if id == doc_id));
    }

    #[test]
    fn reject_removes_extraction_and_edits() {
        let (conn, farm_id, doc_id) = setup();
        complete_extraction(
            &conn,
            &doc_id,
            &[(ProfileField::FarmName, "Wrong Name", 0.9)],
        );
        accept_extraction(&conn, &doc_id).unwrap();

        reject_extraction(&conn, &doc_id).unwrap();

        assert!(edits_for_document(&conn, &doc_id).unwrap().is_empty());
        assert!(get_extraction_result(&conn, &doc_id).unwrap().is_none());

        // The next merge reverts the field to absent
        let inputs = load_merge_inputs(&conn, &farm_id).unwrap();
        let form = merge_form_data(&inputs);
        assert!(form.get("farm_name").is_none());
    }

    #[test]
    fn reject_reverts_to_next_best_source() {
        let (conn, farm_id, doc_a) = setup();
        // Second document with its own extraction for the same field
        let doc_b = match import_document(
            &conn,
            &farm_id,
            DocumentType::FinancialStatement,
            "other.txt",
            "url",
            "other content",
            None,
        )
        .unwrap()
        {
            ImportOutcome::Imported(doc) => doc.id,
            _ => panic!(),
        };

        complete_extraction(&conn, &doc_a, &[(ProfileField::FarmName, "From A", 0.95)]);
        complete_extraction(&conn, &doc_b, &[(ProfileField::FarmName, "From B", 0.6)]);

        let inputs = load_merge_inputs(&conn, &farm_id).unwrap();
        let form = merge_form_data(&inputs);
        assert_eq!(form.get("farm_name"), Some(&serde_json::json!("From A")));

        reject_extraction(&conn, &doc_a).unwrap();

        let inputs = load_merge_inputs(&conn, &farm_id).unwrap();
        let form = merge_form_data(&inputs);
        assert_eq!(
            form.get("farm_name"),
            Some(&serde_json::json!("From B")),
            "rejection reverts to the next-best source"
        );
    }

    #[test]
    fn farm_wide_edit_listing_spans_documents() {
        let (conn, farm_id, doc_a) = setup();
        let doc_b = match import_document(
            &conn, &farm_id, DocumentType::Other, "b.txt", "url", "b content", None,
        )
        .unwrap()
        {
            ImportOutcome::Imported(doc) => doc.id,
            _ => panic!(),
        };

        record_edit(&conn, &doc_a, "farm_name", serde_json::json!("A")).unwrap();
        record_edit(&conn, &doc_b, "iban", serde_json::json!("B")).unwrap();

        let edits = edits_for_farm(&conn, &farm_id).unwrap();
        assert_eq!(edits.len(), 2);
    }
}
