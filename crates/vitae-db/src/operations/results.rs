//! Append-only stage result log.

use super::documents::parse_timestamp;
use crate::database::Database;
use crate::error::{DbError, DbResult};
use rusqlite::types::Type;
use rusqlite::{params, Connection};
use vitae_core::{sortable_timestamp, StageResult};

impl Database {
    /// Append one entry to a document's result log.
    ///
    /// The insert reads the next sequence number and checks the document in a
    /// single statement, so concurrent writers from other stages never clobber
    /// each other's entries.
    pub fn append_result(&self, file_id: &str, entry: &StageResult) -> DbResult<()> {
        let conn = self.conn()?;
        let data = serde_json::to_string(&entry.data)?;
        let metadata = serde_json::to_string(&entry.metadata)?;
        let timestamp = entry.timestamp.as_ref().map(sortable_timestamp);

        let rows = conn.execute(
            r#"
            INSERT INTO stage_results (file_id, seq, process, data, duration, timestamp, metadata)
            SELECT d.file_id,
                   (SELECT COALESCE(MAX(seq), -1) + 1 FROM stage_results WHERE file_id = d.file_id),
                   ?2, ?3, ?4, ?5, ?6
            FROM documents d
            WHERE d.file_id = ?1
            "#,
            params![file_id, entry.process, data, entry.duration, timestamp, metadata],
        )?;

        if rows == 0 {
            return Err(DbError::NotFound(format!("Document not found: {}", file_id)));
        }

        Ok(())
    }

    /// The result log of a document in insertion order.
    pub fn get_results(&self, file_id: &str) -> DbResult<Vec<StageResult>> {
        let conn = self.conn()?;
        load_results(&conn, file_id)
    }
}

pub(crate) fn load_results(conn: &Connection, file_id: &str) -> DbResult<Vec<StageResult>> {
    let mut stmt = conn.prepare(
        "SELECT process, data, duration, timestamp, metadata
         FROM stage_results WHERE file_id = ?1 ORDER BY seq ASC",
    )?;

    let rows = stmt.query_map(params![file_id], |row| {
        let data: String = row.get(1)?;
        let timestamp: Option<String> = row.get(3)?;
        let metadata: String = row.get(4)?;

        Ok(StageResult {
            process: row.get(0)?,
            data: serde_json::from_str(&data)
                .map_err(|e| rusqlite::Error::FromSqlConversionFailure(1, Type::Text, Box::new(e)))?,
            duration: row.get(2)?,
            timestamp: timestamp.map(|t| parse_timestamp(3, &t)).transpose()?,
            metadata: serde_json::from_str(&metadata)
                .map_err(|e| rusqlite::Error::FromSqlConversionFailure(4, Type::Text, Box::new(e)))?,
        })
    })?;

    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{SubsecRound, Utc};
    use serde_json::json;
    use vitae_core::{ContentType, DocumentRecord};

    fn setup() -> (Database, DocumentRecord) {
        let db = Database::open_in_memory().unwrap();
        let record = DocumentRecord::new("cv.pdf", ContentType::Pdf, "ref");
        db.create_document(&record).unwrap();
        (db, record)
    }

    #[test]
    fn test_append_preserves_order() {
        let (db, record) = setup();
        db.append_result(&record.file_id, &StageResult::new("OCR", json!("hello"), 0.5))
            .unwrap();
        db.append_result(&record.file_id, &StageResult::new("NER", json!({"name": "Ana"}), 1.0))
            .unwrap();

        let results = db.get_results(&record.file_id).unwrap();
        let processes: Vec<_> = results.iter().map(|r| r.process.as_str()).collect();
        assert_eq!(processes, vec!["OCR", "NER"]);
        assert_eq!(results[1].data["name"], "Ana");
    }

    #[test]
    fn test_append_round_trips_metadata_and_timestamp() {
        let (db, record) = setup();
        let mut metadata = serde_json::Map::new();
        metadata.insert("ocr_backend".to_string(), json!("tesseract"));
        let now = Utc::now().trunc_subsecs(0);
        let entry = StageResult::new("OCR", json!("text"), 2.25)
            .with_timestamp(now)
            .with_metadata(metadata);

        db.append_result(&record.file_id, &entry).unwrap();

        let loaded = db.get_document(&record.file_id).unwrap().unwrap();
        assert_eq!(loaded.results, vec![entry]);
    }

    #[test]
    fn test_null_data_is_kept() {
        let (db, record) = setup();
        db.append_result(&record.file_id, &StageResult::new("CV", serde_json::Value::Null, 0.1))
            .unwrap();
        let results = db.get_results(&record.file_id).unwrap();
        assert!(results[0].data.is_null());
    }

    #[test]
    fn test_append_to_missing_document() {
        let (db, _) = setup();
        let err = db
            .append_result("missing", &StageResult::new("OCR", json!(""), 0.0))
            .unwrap_err();
        assert!(err.is_not_found());
    }
}
