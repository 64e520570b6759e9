//! Failure ledger: retry counts and dead-lettering per (document, stage).

use super::documents::parse_timestamp;
use crate::database::Database;
use crate::error::{DbError, DbResult};
use chrono::Utc;
use rusqlite::params;
use tracing::warn;
use vitae_core::{sortable_timestamp, FailureRecord};

const FAILURE_COLUMNS: &str = "file_id, stage, attempts, last_error, dead_lettered, updated_at";

impl Database {
    /// Count one failed attempt. The entry is dead-lettered when the failure is
    /// permanent or the attempt count reaches `max_attempts`.
    pub fn record_failure(
        &self,
        file_id: &str,
        stage: &str,
        error: &str,
        permanent: bool,
        max_attempts: i32,
    ) -> DbResult<FailureRecord> {
        let conn = self.conn()?;
        let sql = format!(
            r#"
            INSERT INTO stage_failures ({cols})
            VALUES (?1, ?2, 1, ?3, CASE WHEN ?4 OR 1 >= ?5 THEN 1 ELSE 0 END, ?6)
            ON CONFLICT(file_id, stage) DO UPDATE SET
                attempts = stage_failures.attempts + 1,
                last_error = excluded.last_error,
                dead_lettered = CASE
                    WHEN ?4 OR stage_failures.attempts + 1 >= ?5 THEN 1 ELSE 0 END,
                updated_at = excluded.updated_at
            RETURNING {cols}
            "#,
            cols = FAILURE_COLUMNS
        );

        let record = conn.query_row(
            &sql,
            params![
                file_id,
                stage,
                error,
                permanent,
                max_attempts,
                sortable_timestamp(&Utc::now())
            ],
            row_to_failure,
        )?;

        if record.dead_lettered {
            warn!(
                "{} dead-lettered for {} after {} attempt(s): {}",
                file_id, stage, record.attempts, record.last_error
            );
        }

        Ok(record)
    }

    /// Forget failures after a successful run.
    pub fn clear_failures(&self, file_id: &str, stage: &str) -> DbResult<()> {
        let conn = self.conn()?;
        conn.execute(
            "DELETE FROM stage_failures WHERE file_id = ?1 AND stage = ?2",
            params![file_id, stage],
        )?;
        Ok(())
    }

    /// Put a failing or dead-lettered document back into the queue.
    pub fn requeue(&self, file_id: &str, stage: &str) -> DbResult<()> {
        let conn = self.conn()?;
        let rows = conn.execute(
            "DELETE FROM stage_failures WHERE file_id = ?1 AND stage = ?2",
            params![file_id, stage],
        )?;

        if rows == 0 {
            return Err(DbError::NotFound(format!(
                "No failure recorded for {} at {}",
                file_id, stage
            )));
        }

        Ok(())
    }

    pub fn get_failure(&self, file_id: &str, stage: &str) -> DbResult<Option<FailureRecord>> {
        use rusqlite::OptionalExtension;

        let conn = self.conn()?;
        let sql = format!(
            "SELECT {} FROM stage_failures WHERE file_id = ?1 AND stage = ?2",
            FAILURE_COLUMNS
        );
        let record = conn
            .query_row(&sql, params![file_id, stage], row_to_failure)
            .optional()?;
        Ok(record)
    }

    /// Ledger entries, most recently updated first.
    pub fn list_failures(
        &self,
        stage: Option<&str>,
        dead_only: bool,
    ) -> DbResult<Vec<FailureRecord>> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {} FROM stage_failures
             WHERE (?1 IS NULL OR stage = ?1) AND (?2 = 0 OR dead_lettered = 1)
             ORDER BY updated_at DESC",
            FAILURE_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![stage, dead_only], row_to_failure)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}

fn row_to_failure(row: &rusqlite::Row) -> rusqlite::Result<FailureRecord> {
    let updated_at: String = row.get(5)?;
    Ok(FailureRecord {
        file_id: row.get(0)?,
        stage: row.get(1)?,
        attempts: row.get(2)?,
        last_error: row.get(3)?,
        dead_lettered: row.get(4)?,
        updated_at: parse_timestamp(5, &updated_at)?,
    })
}
