//! Document record CRUD operations.

use super::results::load_results;
use crate::database::Database;
use crate::error::{DbError, DbResult};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};
use vitae_core::{sortable_timestamp, ContentType, DocumentRecord};

const DOCUMENT_COLUMNS: &str = "file_id, file_name, content_type, raw_payload_ref, creation_date";

impl Database {
    /// Insert a freshly uploaded document. Any `results` on the record are ignored;
    /// the log starts empty and only grows through `append_result`.
    pub fn create_document(&self, record: &DocumentRecord) -> DbResult<()> {
        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO documents (file_id, file_name, content_type, raw_payload_ref, creation_date)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                record.file_id,
                record.file_name,
                record.content_type.as_str(),
                record.raw_payload_ref,
                sortable_timestamp(&record.creation_date),
            ],
        )?;
        Ok(())
    }

    /// Get a document with its result log.
    pub fn get_document(&self, file_id: &str) -> DbResult<Option<DocumentRecord>> {
        let conn = self.conn()?;
        load_document(&conn, file_id)
    }

    /// Find a document whose raw payload has the given content address.
    pub fn find_document_by_payload(&self, payload_ref: &str) -> DbResult<Option<DocumentRecord>> {
        let conn = self.conn()?;
        let file_id: Option<String> = conn
            .query_row(
                "SELECT file_id FROM documents WHERE raw_payload_ref = ?1
                 ORDER BY creation_date ASC LIMIT 1",
                params![payload_ref],
                |row| row.get(0),
            )
            .optional()?;

        match file_id {
            Some(id) => load_document(&conn, &id),
            None => Ok(None),
        }
    }

    /// List documents, newest first.
    pub fn list_documents(&self, limit: Option<i64>) -> DbResult<Vec<DocumentRecord>> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {} FROM documents ORDER BY creation_date DESC LIMIT ?1",
            DOCUMENT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![limit.unwrap_or(100)], row_to_document)?;
        let documents = rows.collect::<Result<Vec<_>, _>>()?;
        with_results(&conn, documents)
    }

    /// Documents uploaded on a given (UTC) calendar day, oldest first.
    pub fn documents_created_on(&self, day: NaiveDate) -> DbResult<Vec<DocumentRecord>> {
        let start = day.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
        let end = day.succ_opt().and_then(|d| d.and_hms_opt(0, 0, 0)).map(|dt| dt.and_utc());
        let (Some(start), Some(end)) = (start, end) else {
            return Ok(Vec::new());
        };

        let conn = self.conn()?;
        let sql = format!(
            "SELECT {} FROM documents
             WHERE creation_date >= ?1 AND creation_date < ?2
             ORDER BY creation_date ASC",
            DOCUMENT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(
            params![sortable_timestamp(&start), sortable_timestamp(&end)],
            row_to_document,
        )?;
        let documents = rows.collect::<Result<Vec<_>, _>>()?;
        with_results(&conn, documents)
    }

    /// Remove a document and, through cascading keys, its results and ledger rows.
    /// Administrative only; the pipeline never deletes.
    pub fn delete_document(&self, file_id: &str) -> DbResult<()> {
        let conn = self.conn()?;
        let rows = conn.execute("DELETE FROM documents WHERE file_id = ?1", params![file_id])?;

        if rows == 0 {
            return Err(DbError::NotFound(format!("Document not found: {}", file_id)));
        }

        Ok(())
    }

    /// Total number of documents.
    pub fn document_count(&self) -> DbResult<i64> {
        let conn = self.conn()?;
        let count = conn.query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))?;
        Ok(count)
    }
}

/// Load one document and its results on an existing connection.
pub(crate) fn load_document(conn: &Connection, file_id: &str) -> DbResult<Option<DocumentRecord>> {
    let sql = format!("SELECT {} FROM documents WHERE file_id = ?1", DOCUMENT_COLUMNS);
    let record = conn
        .query_row(&sql, params![file_id], row_to_document)
        .optional()?;

    match record {
        Some(mut record) => {
            record.results = load_results(conn, &record.file_id)?;
            Ok(Some(record))
        }
        None => Ok(None),
    }
}

fn with_results(conn: &Connection, documents: Vec<DocumentRecord>) -> DbResult<Vec<DocumentRecord>> {
    documents
        .into_iter()
        .map(|mut record| {
            record.results = load_results(conn, &record.file_id)?;
            Ok(record)
        })
        .collect()
}

fn row_to_document(row: &rusqlite::Row) -> rusqlite::Result<DocumentRecord> {
    let content_type_str: String = row.get(2)?;
    let creation_date_str: String = row.get(4)?;

    let content_type = ContentType::from_str(&content_type_str).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            2,
            Type::Text,
            format!("unknown content type: {}", content_type_str).into(),
        )
    })?;

    Ok(DocumentRecord {
        file_id: row.get(0)?,
        file_name: row.get(1)?,
        content_type,
        raw_payload_ref: row.get(3)?,
        creation_date: parse_timestamp(4, &creation_date_str)?,
        results: Vec::new(),
    })
}

pub(crate) fn parse_timestamp(idx: usize, value: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_create_and_get_document() {
        let db = Database::open_in_memory().unwrap();
        let record = DocumentRecord::new("cv.pdf", ContentType::Pdf, "ref-1");
        db.create_document(&record).unwrap();

        let loaded = db.get_document(&record.file_id).unwrap().unwrap();
        assert_eq!(loaded.file_name, "cv.pdf");
        assert_eq!(loaded.content_type, ContentType::Pdf);
        assert!(loaded.results.is_empty());
        assert_eq!(loaded.creation_date, record.creation_date);
    }

    #[test]
    fn test_missing_document_is_none() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.get_document("nope").unwrap().is_none());
        assert!(db.delete_document("nope").unwrap_err().is_not_found());
    }

    #[test]
    fn test_file_id_is_unique() {
        let db = Database::open_in_memory().unwrap();
        let record = DocumentRecord::new("cv.pdf", ContentType::Pdf, "ref-1");
        db.create_document(&record).unwrap();
        assert!(db.create_document(&record).is_err());
    }

    #[test]
    fn test_documents_created_on_day() {
        let db = Database::open_in_memory().unwrap();
        let jan1 = Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap();
        let jan2 = Utc.with_ymd_and_hms(2024, 1, 2, 9, 0, 0).unwrap();

        db.create_document(&DocumentRecord::new("a.pdf", ContentType::Pdf, "a").with_creation_date(jan1))
            .unwrap();
        db.create_document(&DocumentRecord::new("b.pdf", ContentType::Pdf, "b").with_creation_date(jan2))
            .unwrap();

        let day = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let found = db.documents_created_on(day).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].file_name, "a.pdf");
    }

    #[test]
    fn test_find_by_payload() {
        let db = Database::open_in_memory().unwrap();
        let record = DocumentRecord::new("cv.png", ContentType::Png, "deadbeef");
        db.create_document(&record).unwrap();

        let found = db.find_document_by_payload("deadbeef").unwrap().unwrap();
        assert_eq!(found.file_id, record.file_id);
        assert!(db.find_document_by_payload("other").unwrap().is_none());
        assert_eq!(db.document_count().unwrap(), 1);
    }
}
