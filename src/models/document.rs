//! Imported documents and duplicate detection by content hash.

use chrono::{NaiveDateTime, Utc};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use super::enums::{DocumentLanguage, DocumentType};
use crate::db::DatabaseError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    pub farm_id: Uuid,
    pub doc_type: DocumentType,
    pub file_name: String,
    pub source_url: String,
    pub content_hash: String,
    pub language: Option<DocumentLanguage>,
    pub byte_size: u64,
    pub imported_at: NaiveDateTime,
}

/// Outcome of an import attempt.
#[derive(Debug)]
pub enum ImportOutcome {
    Imported(Document),
    /// Identical content already imported for this farm.
    Duplicate { existing_id: Uuid },
}

/// SHA-256 of the raw document text, hex-encoded.
pub fn content_hash(text: &str) -> String {
    use std::fmt::Write;

    let digest = Sha256::digest(text.as_bytes());
    let mut out = String::with_capacity(64);
    for byte in digest {
        let _ = write!(out, "{byte:02x}");
    }
    out
}

/// Import a document, refusing byte-identical duplicates for the same farm.
pub fn import_document(
    conn: &Connection,
    farm_id: &Uuid,
    doc_type: DocumentType,
    file_name: &str,
    source_url: &str,
    text: &str,
    language: Option<DocumentLanguage>,
) -> Result<ImportOutcome, DatabaseError> {
    let hash = content_hash(text);

    if let Some(existing_id) = find_by_hash(conn, farm_id, &hash)? {
        tracing::info!(
            farm_id = %farm_id,
            file_name,
            "Duplicate document content, skipping import"
        );
        return Ok(ImportOutcome::Duplicate { existing_id });
    }

    let doc = Document {
        id: Uuid::new_v4(),
        farm_id: *farm_id,
        doc_type,
        file_name: file_name.to_string(),
        source_url: source_url.to_string(),
        content_hash: hash,
        language,
        byte_size: text.len() as u64,
        imported_at: Utc::now().naive_utc(),
    };
    insert_document(conn, &doc)?;
    Ok(ImportOutcome::Imported(doc))
}

pub fn insert_document(conn: &Connection, doc: &Document) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO documents (id, farm_id, doc_type, file_name, source_url,
         content_hash, language, byte_size, imported_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            doc.id.to_string(),
            doc.farm_id.to_string(),
            doc.doc_type.as_str(),
            doc.file_name,
            doc.source_url,
            doc.content_hash,
            doc.language.map(|l| l.as_str()),
            doc.byte_size as i64,
            doc.imported_at.to_string(),
        ],
    )?;
    Ok(())
}

pub fn get_document(conn: &Connection, id: &Uuid) -> Result<Option<Document>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, farm_id, doc_type, file_name, source_url, content_hash,
         language, byte_size, imported_at
         FROM documents WHERE id = ?1",
    )?;

    let result = stmt.query_row(params![id.to_string()], |row| {
        Ok(DocumentRow {
            id: row.get::<_, String>(0)?,
            farm_id: row.get::<_, String>(1)?,
            doc_type: row.get::<_, String>(2)?,
            file_name: row.get(3)?,
            source_url: row.get(4)?,
            content_hash: row.get(5)?,
            language: row.get::<_, Option<String>>(6)?,
            byte_size: row.get::<_, i64>(7)?,
            imported_at: row.get::<_, String>(8)?,
        })
    });

    match result {
        Ok(row) => Ok(Some(document_from_row(row)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn list_documents_for_farm(
    conn: &Connection,
    farm_id: &Uuid,
) -> Result<Vec<Document>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, farm_id, doc_type, file_name, source_url, content_hash,
         language, byte_size, imported_at
         FROM documents WHERE farm_id = ?1 ORDER BY imported_at ASC",
    )?;

    let rows = stmt.query_map(params![farm_id.to_string()], |row| {
        Ok(DocumentRow {
            id: row.get::<_, String>(0)?,
            farm_id: row.get::<_, String>(1)?,
            doc_type: row.get::<_, String>(2)?,
            file_name: row.get(3)?,
            source_url: row.get(4)?,
            content_hash: row.get(5)?,
            language: row.get::<_, Option<String>>(6)?,
            byte_size: row.get::<_, i64>(7)?,
            imported_at: row.get::<_, String>(8)?,
        })
    })?;

    let mut docs = Vec::new();
    for row in rows {
        docs.push(document_from_row(row?)?);
    }
    Ok(docs)
}

fn find_by_hash(
    conn: &Connection,
    farm_id: &Uuid,
    hash: &str,
) -> Result<Option<Uuid>, DatabaseError> {
    let result = conn.query_row(
        "SELECT id FROM documents WHERE farm_id = ?1 AND content_hash = ?2 LIMIT 1",
        params![farm_id.to_string(), hash],
        |row| row.get::<_, String>(0),
    );
    match result {
        Ok(id) => Ok(Uuid::parse_str(&id).ok()),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

struct DocumentRow {
    id: String,
    farm_id: String,
    doc_type: String,
    file_name: String,
    source_url: String,
    content_hash: String,
    language: Option<String>,
    byte_size: i64,
    imported_at: String,
}

fn document_from_row(row: DocumentRow) -> Result<Document, DatabaseError> {
    use std::str::FromStr;

    Ok(Document {
        id: Uuid::parse_str(&row.id).map_err(|_| DatabaseError::InvalidEnum {
            field: "documents.id".into(),
            value: row.id.clone(),
        })?,
        farm_id: Uuid::parse_str(&row.farm_id).map_err(|_| DatabaseError::InvalidEnum {
            field: "documents.farm_id".into(),
            value: row.farm_id.clone(),
        })?,
        doc_type: DocumentType::from_str(&row.doc_type)?,
        file_name: row.file_name,
        source_url: row.source_url,
        content_hash: row.content_hash,
        language: row
            .language
            .as_deref()
            .map(DocumentLanguage::from_str)
            .transpose()?,
        byte_size: row.byte_size as u64,
        imported_at: NaiveDateTime::parse_from_str(&row.imported_at, "%Y-%m-%d %H:%M:%S%.f")
            .unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_memory_database;
    use crate::models::farm::{insert_farm, FarmProfile};

    fn setup() -> (Connection, Uuid) {
        let conn = open_memory_database().unwrap();
        let farm = FarmProfile::new("Ferme Test");
        insert_farm(&conn, &farm).unwrap();
        (conn, farm.id)
    }

    #[test]
    fn import_stores_document() {
        let (conn, farm_id) = setup();
        let outcome = import_document(
            &conn,
            &farm_id,
            DocumentType::RegistrationExtract,
            "kbis.txt",
            "data:text/plain,whatever",
            "Extrait Kbis\nSIRET: 73282932000074",
            Some(DocumentLanguage::French),
        )
        .unwrap();

        let doc = match outcome {
            ImportOutcome::Imported(doc) => doc,
            ImportOutcome::Duplicate { .. } => panic!("should not be duplicate"),
        };
        let loaded = get_document(&conn, &doc.id).unwrap().unwrap();
        assert_eq!(loaded.file_name, "kbis.txt");
        assert_eq!(loaded.doc_type, DocumentType::RegistrationExtract);
        assert_eq!(loaded.language, Some(DocumentLanguage::French));
        assert_eq!(loaded.byte_size, doc.byte_size);
    }

    #[test]
    fn duplicate_content_detected() {
        let (conn, farm_id) = setup();
        let text = "Cifra de afaceri: 1.200.000 lei";

        let first = import_document(
            &conn, &farm_id, DocumentType::FinancialStatement,
            "bilant.txt", "url-a", text, Some(DocumentLanguage::Romanian),
        )
        .unwrap();
        let first_id = match first {
            ImportOutcome::Imported(doc) => doc.id,
            _ => panic!("first import must succeed"),
        };

        // Same content, different file name — still a duplicate
        let second = import_document(
            &conn, &farm_id, DocumentType::FinancialStatement,
            "bilant-copy.txt", "url-b", text, Some(DocumentLanguage::Romanian),
        )
        .unwrap();
        match second {
            ImportOutcome::Duplicate { existing_id } => assert_eq!(existing_id, first_id),
            ImportOutcome::Imported(_) => panic!("duplicate not detected"),
        }
    }

    #[test]
    fn content_hash_is_stable_hex() {
        let a = content_hash("abc");
        let b = content_hash("abc");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn documents_listed_in_import_order() {
        let (conn, farm_id) = setup();
        for (i, text) in ["one", "two", "three"].iter().enumerate() {
            import_document(
                &conn, &farm_id, DocumentType::Other,
                &format!("doc-{i}.txt"), "url", text, None,
            )
            .unwrap();
        }
        let docs = list_documents_for_farm(&conn, &farm_id).unwrap();
        assert_eq!(docs.len(), 3);
    }
}
